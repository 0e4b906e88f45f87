use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a hook's pre phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Continue,
    Cancel,
    /// Omit this entry only; not allowed for module hooks
    Skip,
}

impl Action {
    pub fn is_allowed_in(self, scope: HookScope) -> bool {
        !(self == Action::Skip && scope == HookScope::Module)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Continue => "continue",
            Action::Cancel => "cancel",
            Action::Skip => "skip",
        };
        f.write_str(name)
    }
}

/// What a hook wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookScope {
    Module,
    File,
}

impl HookScope {
    pub fn as_str(self) -> &'static str {
        match self {
            HookScope::Module => "module",
            HookScope::File => "file",
        }
    }
}

impl fmt::Display for HookScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
