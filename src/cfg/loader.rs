use log::debug;
use std::fs;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

use super::spec::Manifest;
use crate::error::{AliResult, ErrorContext};
use crate::tree::Tree;

/// Reads and writes the YAML manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loader {}

pub fn fingerprint(content: &str) -> String {
    format!("{:016x}", xxh3_64(content.as_bytes()))
}

impl Loader {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Load the command tree from a manifest file
    ///
    /// # Errors
    ///
    /// Will return `Err` if `filename` cannot be read, is not valid YAML, or
    /// describes an invalid tree (bad names, duplicate aliases).
    pub fn load(&self, filename: &Path) -> AliResult<Tree> {
        let content = fs::read_to_string(filename).map_err(|e| {
            ErrorContext::new("reading manifest")
                .with_file(filename)
                .to_file_operation_error(e)
        })?;
        self.parse(&content, filename)
    }

    /// Like [`Loader::load`], but a missing file yields an empty tree
    pub fn load_or_default(&self, filename: &Path) -> AliResult<Tree> {
        if filename.exists() {
            self.load(filename)
        } else {
            debug!("manifest {:?} does not exist yet, starting empty", filename);
            Ok(Tree::default())
        }
    }

    pub fn parse(&self, content: &str, filename: &Path) -> AliResult<Tree> {
        let manifest: Manifest = if content.trim().is_empty() {
            Manifest::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                ErrorContext::new("parsing manifest")
                    .with_file(filename)
                    .with_context("manifest YAML")
                    .to_config_parse_error(e)
            })?
        };
        let tree = manifest.into_tree()?;
        debug!(
            "loaded {:?} ({} nodes, fingerprint {})",
            filename,
            tree.len(),
            fingerprint(content)
        );
        Ok(tree)
    }

    pub fn render(&self, tree: &Tree, filename: &Path) -> AliResult<String> {
        serde_yaml::to_string(&Manifest::from_tree(tree)).map_err(|e| {
            ErrorContext::new("serializing manifest")
                .with_file(filename)
                .to_file_operation_error(e)
        })
    }

    /// Write the tree back, replacing the file atomically
    pub fn save(&self, tree: &Tree, filename: &Path) -> AliResult<()> {
        let content = self.render(tree, filename)?;
        let io_error = |operation: &str, e: std::io::Error| {
            ErrorContext::new(operation)
                .with_file(filename)
                .to_file_operation_error(e)
        };

        if let Some(parent) = filename.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error("creating manifest directory", e))?;
        }

        // Write to temporary file first, then rename (atomic operation)
        let temp_path = filename.with_extension("tmp");
        fs::write(&temp_path, &content).map_err(|e| io_error("writing manifest", e))?;
        fs::rename(&temp_path, filename).map_err(|e| io_error("replacing manifest", e))?;

        debug!("saved {:?} (fingerprint {})", filename, fingerprint(&content));
        Ok(())
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
