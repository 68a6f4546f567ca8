//! Error conversion helpers for the file boundary
//!
//! Extension traits that attach the offending path to I/O and document
//! parsing failures.

use std::fmt::Display;
use std::io;
use std::path::Path;

use crate::application::{ApplicationError, ApplicationResult};

/// Extension trait for converting `io::Result` to `ApplicationResult` with context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    ///
    /// # Example
    /// ```ignore
    /// fs.read_to_string(&path)
    ///     .with_path_context("read topology", &path)?;
    /// ```
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::OperationFailed {
            context: format!("{}: {}", action, path.display()),
            source: Box::new(e),
        })
    }
}

/// Extension trait turning parse failures into `InvalidDocument` errors.
pub trait DocumentResultExt<T> {
    fn invalid_document(self, path: Option<&Path>) -> ApplicationResult<T>;
}

impl<T, E: Display> DocumentResultExt<T> for Result<T, E> {
    fn invalid_document(self, path: Option<&Path>) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::InvalidDocument {
            message: match path {
                Some(path) => format!("{}: {}", path.display(), e),
                None => e.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_io_error_when_adding_context_then_path_in_message() {
        let result: io::Result<()> = Err(io::Error::new(io::ErrorKind::NotFound, "gone"));

        let err = result
            .with_path_context("read topology", Path::new("/tmp/optics.toml"))
            .unwrap_err();

        assert_eq!(err.to_string(), "operation failed: read topology: /tmp/optics.toml");
    }

    #[test]
    fn given_parse_error_with_path_when_converting_then_prefixed() {
        let result: Result<(), String> = Err("expected value".into());

        let err = result.invalid_document(Some(Path::new("a.toml"))).unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::InvalidDocument { message } if message == "a.toml: expected value"
        ));
    }
}
