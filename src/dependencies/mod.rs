//! Logical dependency name to local artifact path

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("Dependency not found: {name}")]
    NotFound { name: String },

    #[error("Dependency {name} points to missing file {path}")]
    MissingArtifact { name: String, path: String },
}

impl DependencyError {
    /// Whether the caller may fall back to a remote package install
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DependencyError::NotFound { .. } | DependencyError::MissingArtifact { .. }
        )
    }
}

pub trait DependencyResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<PathBuf, DependencyError>;
}

/// Dependency table taken from the run configuration
#[derive(Debug, Clone, Default)]
pub struct DependencyTable {
    entries: HashMap<String, PathBuf>,
}

impl DependencyTable {
    pub fn new(entries: HashMap<String, PathBuf>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, name: impl Into<String>, path: impl AsRef<Path>) {
        self.entries.insert(name.into(), path.as_ref().to_path_buf());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DependencyResolver for DependencyTable {
    fn resolve(&self, name: &str) -> Result<PathBuf, DependencyError> {
        let path = self
            .entries
            .get(name)
            .ok_or_else(|| DependencyError::NotFound {
                name: name.to_string(),
            })?;

        if !path.exists() {
            return Err(DependencyError::MissingArtifact {
                name: name.to_string(),
                path: path.display().to_string(),
            });
        }

        Ok(path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_existing_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let artifact = temp_dir.path().join("tool.deb");
        std::fs::write(&artifact, b"pkg").unwrap();

        let mut table = DependencyTable::default();
        table.insert("tool", &artifact);

        assert_eq!(table.resolve("tool").unwrap(), artifact);
    }

    #[test]
    fn test_unknown_and_missing_are_not_found() {
        let mut table = DependencyTable::default();
        table.insert("gone", "/nonexistent/gone.rpm");

        let unknown = table.resolve("other").unwrap_err();
        let missing = table.resolve("gone").unwrap_err();
        assert!(unknown.is_not_found());
        assert!(missing.is_not_found());
        assert!(matches!(missing, DependencyError::MissingArtifact { .. }));
    }
}
