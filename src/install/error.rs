use thiserror::Error;

use crate::hooks::HookError;
use crate::template::RenderError;
use crate::visitor::VisitError;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("{path} is not inside module {root}")]
    OutsideModule { path: String, root: String },

    #[error("Unresolved path variable @{name}@ in {path}")]
    UnresolvedVariable { name: String, path: String },

    #[error("Path segment '{segment}' of {path} is not a plain file name after substitution")]
    InvalidSegment { segment: String, path: String },

    #[error("{path} does not end with {suffix}")]
    MissingSuffix { path: String, suffix: String },
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Failed to back up {path} to {destination}: {source}")]
    Copy {
        path: String,
        destination: String,
        source: std::io::Error,
    },

    #[error("Failed to back up directory {path}: {source}")]
    Tree { path: String, source: VisitError },

    #[error("Cannot back up {path}: {destination} already holds an earlier backup of another kind")]
    SnapshotConflict { path: String, destination: String },
}

/// Fatal installation failure, with the module or entry it happened on
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Installation cancelled by the hook of {path}")]
    Cancelled { path: String },

    #[error("Target {target} is a {found}, but {source_path} installs a {expected}")]
    TargetKindMismatch {
        target: String,
        source_path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unknown template engine: {name}")]
    UnknownEngine { name: String },

    #[error("Hook failed for {path}: {source}")]
    Hook { path: String, source: HookError },

    #[error("Failed to render {path}: {source}")]
    Render { path: String, source: RenderError },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Visit(#[from] VisitError),
}

impl InstallError {
    pub fn io(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> InstallError + '_ {
        move |source| InstallError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn hook(path: &std::path::Path) -> impl FnOnce(HookError) -> InstallError + '_ {
        move |source| InstallError::Hook {
            path: path.display().to_string(),
            source,
        }
    }
}
