//! Suffix-driven classification of module entries

use std::path::Path;

pub use crate::hooks::HOOK_SUFFIX;
pub const DELETE_SUFFIX: &str = ".del";
pub const TEMPLATE_SUFFIX: &str = ".tmpl";

/// What a module entry asks for, decided by its file name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Evaluated around another entry, never installed
    Hook,
    /// The target without the suffix must be removed
    DeleteMarker,
    /// Rendered before it is written; the target drops the suffix
    Template,
    Plain,
}

impl EntryKind {
    /// Suffixes are checked in priority order: hook, delete, template
    pub fn classify(path: &Path) -> Self {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return EntryKind::Plain,
        };

        if name.ends_with(HOOK_SUFFIX) {
            EntryKind::Hook
        } else if name.ends_with(DELETE_SUFFIX) {
            EntryKind::DeleteMarker
        } else if name.ends_with(TEMPLATE_SUFFIX) {
            EntryKind::Template
        } else {
            EntryKind::Plain
        }
    }

    /// Marker suffix carried by entries of this kind
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            EntryKind::Hook => Some(HOOK_SUFFIX),
            EntryKind::DeleteMarker => Some(DELETE_SUFFIX),
            EntryKind::Template => Some(TEMPLATE_SUFFIX),
            EntryKind::Plain => None,
        }
    }
}
