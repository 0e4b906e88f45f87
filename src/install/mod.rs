//! Module installation engine
//!
//! Walks a module tree twice: first removing the targets of `.del` markers,
//! then copying plain files and rendering `.tmpl` templates onto the target
//! root. Every entry runs inside its own file hook and the whole run inside
//! the module hook. Anything about to be overwritten or removed is backed up
//! first.

pub mod backup;
pub mod entry;
pub mod error;
pub mod installer;
pub mod paths;

pub use backup::BackupManager;
pub use entry::{EntryKind, DELETE_SUFFIX, HOOK_SUFFIX, TEMPLATE_SUFFIX};
pub use error::{BackupError, InstallError, PathError};
pub use installer::{InstallReport, ModuleInstaller};
pub use paths::PathResolver;
