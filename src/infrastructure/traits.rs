//! I/O boundary traits for testability
//!
//! These traits abstract the structured-data reader/writer and the
//! filesystem, so loaders and services can be tested against in-memory
//! implementations.

use std::io;
use std::path::Path;

use thiserror::Error;

/// An attribute value that does not parse as the requested type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("attribute {name}={value:?} is not a valid {expected}")]
pub struct AttributeError {
    pub name: String,
    pub value: String,
    pub expected: &'static str,
}

/// Hierarchical structured-data node: named attributes plus tagged children.
pub trait DataAdaptor: Sized {
    /// Tag of this element.
    fn name(&self) -> &str;

    fn has_attribute(&self, name: &str) -> bool;

    fn string_value(&self, name: &str) -> Option<&str>;

    /// Attribute parsed as a float; `Ok(None)` if absent.
    fn double_value(&self, name: &str) -> Result<Option<f64>, AttributeError> {
        self.string_value(name)
            .map(|raw| {
                raw.trim().parse::<f64>().map_err(|_| AttributeError {
                    name: name.to_string(),
                    value: raw.to_string(),
                    expected: "number",
                })
            })
            .transpose()
    }

    /// Attribute parsed as a boolean; `Ok(None)` if absent.
    fn boolean_value(&self, name: &str) -> Result<Option<bool>, AttributeError> {
        self.string_value(name)
            .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(AttributeError {
                    name: name.to_string(),
                    value: raw.to_string(),
                    expected: "boolean",
                }),
            })
            .transpose()
    }

    /// Children with the given tag, in document order.
    fn child_adaptors(&self, tag: &str) -> Vec<&Self>;

    fn child_adaptor(&self, tag: &str) -> Option<&Self> {
        self.child_adaptors(tag).into_iter().next()
    }

    /// Append a new child element and return it for writing.
    fn create_child(&mut self, tag: &str) -> &mut Self;

    fn set_value(&mut self, name: &str, value: impl ToString);
}

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
