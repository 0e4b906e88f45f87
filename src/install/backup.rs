//! Backup of host state before it is overwritten or removed

use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use super::error::BackupError;
use crate::visitor::copy_tree;

/// Copies targets into the run's backup directory, mirroring their location
/// under the target root. A repeated backup overwrites the earlier copy file
/// by file; entries already in the snapshot are never removed, so a file
/// backed up before its parent directory keeps its original content.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
    target_root: PathBuf,
}

impl BackupManager {
    pub fn new(backup_dir: impl Into<PathBuf>, target_root: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            target_root: target_root.into(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Where the backup of `path` goes
    pub fn destination_of(&self, path: &Path) -> PathBuf {
        let relative = path.strip_prefix(&self.target_root).unwrap_or(path);
        let mut destination = self.backup_dir.clone();
        for component in relative.components() {
            if let Component::Normal(segment) = component {
                destination.push(segment);
            }
        }
        destination
    }

    /// Copy `path` into the backup directory. Returns the backup location, or
    /// `None` when there was nothing to back up.
    pub async fn backup(&self, path: &Path) -> Result<Option<PathBuf>, BackupError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Nothing to back up at {}", path.display());
                return Ok(None);
            }
            Err(source) => return Err(copy_error(path, path, source)),
        };

        let destination = self.destination_of(path);
        self.check_earlier_snapshot(path, &destination, metadata.is_dir())
            .await?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| copy_error(path, &destination, source))?;
        }

        if metadata.is_dir() {
            copy_tree(path, &destination, "*")
                .await
                .map_err(|source| BackupError::Tree {
                    path: path.display().to_string(),
                    source,
                })?;
        } else {
            tokio::fs::copy(path, &destination)
                .await
                .map_err(|source| copy_error(path, &destination, source))?;
        }

        info!("Backed up {} to {}", path.display(), destination.display());
        Ok(Some(destination))
    }

    /// An earlier snapshot entry of the other kind is never replaced
    async fn check_earlier_snapshot(
        &self,
        path: &Path,
        destination: &Path,
        is_dir: bool,
    ) -> Result<(), BackupError> {
        match tokio::fs::symlink_metadata(destination).await {
            Ok(previous) if previous.is_dir() != is_dir => Err(BackupError::SnapshotConflict {
                path: path.display().to_string(),
                destination: destination.display().to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn copy_error(path: &Path, destination: &Path, source: std::io::Error) -> BackupError {
    BackupError::Copy {
        path: path.display().to_string(),
        destination: destination.display().to_string(),
        source,
    }
}
