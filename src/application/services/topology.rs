//! Topology document service
//!
//! Reads optics documents from disk into accelerators and writes them back.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::application::error_ext::DocumentResultExt;
use crate::application::loader::ROOT_TAG;
use crate::application::writer::write_accelerator;
use crate::application::{ApplicationResult, IoResultExt, TopologyLoader};
use crate::domain::Accelerator;
use crate::infrastructure::traits::FileSystem;
use crate::infrastructure::DataTree;

/// Service for loading and saving accelerator topologies.
pub struct TopologyService {
    fs: Arc<dyn FileSystem>,
    loader: TopologyLoader,
}

impl TopologyService {
    /// Create a new topology service.
    pub fn new(fs: Arc<dyn FileSystem>, loader: TopologyLoader) -> Self {
        Self { fs, loader }
    }

    pub fn loader(&self) -> &TopologyLoader {
        &self.loader
    }

    /// Parse a document from TOML text.
    pub fn read_document(&self, content: &str) -> ApplicationResult<DataTree> {
        DataTree::from_toml_str(content).invalid_document(None)
    }

    /// Build an accelerator from TOML text.
    pub fn load_str(&self, content: &str) -> ApplicationResult<Accelerator> {
        let document = self.read_document(content)?;
        self.loader.load(&document)
    }

    /// Build an accelerator from a single document file.
    pub fn load_file(&self, path: &Path) -> ApplicationResult<Accelerator> {
        self.load_files::<&Path>(path, &[])
    }

    /// Build an accelerator from a base document followed by delta documents.
    ///
    /// Deltas are applied in order before the snapshot is built.
    pub fn load_files<P: AsRef<Path>>(&self, base: &Path, deltas: &[P]) -> ApplicationResult<Accelerator> {
        debug!("load_files: base={}", base.display());
        let document = self.read_file(base)?;
        let mut builder = self.loader.builder_from(&document)?;

        for delta in deltas {
            let delta = delta.as_ref();
            debug!("load_files: delta={}", delta.display());
            let document = self.read_file(delta)?;
            self.loader.update(&mut builder, &document)?;
        }

        let accelerator = builder.build()?;
        info!(
            "loaded {} with {} sequences and {} combos",
            accelerator.system_id(),
            accelerator.sequences().len(),
            accelerator.combo_sequences().len()
        );
        Ok(accelerator)
    }

    /// Serialize an accelerator to TOML text.
    pub fn to_toml(&self, accelerator: &Accelerator) -> ApplicationResult<String> {
        let mut document = DataTree::new(ROOT_TAG);
        write_accelerator(accelerator, &mut document);
        document.to_toml_string().invalid_document(None)
    }

    /// Write an accelerator to `path`, creating parent directories.
    pub fn save_file(&self, accelerator: &Accelerator, path: &Path) -> ApplicationResult<()> {
        let content = self.to_toml(accelerator)?;
        self.fs
            .ensure_parent(path)
            .with_path_context("create parent directory", path)?;
        self.fs
            .write(path, &content)
            .with_path_context("write topology", path)?;
        debug!("save_file: wrote {}", path.display());
        Ok(())
    }

    fn read_file(&self, path: &Path) -> ApplicationResult<DataTree> {
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read topology", path)?;
        DataTree::from_toml_str(&content).invalid_document(Some(path))
    }
}
