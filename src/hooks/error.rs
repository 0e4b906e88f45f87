use thiserror::Error;

use super::action::{Action, HookScope};
use crate::command::CommandError;
use crate::config::PropertyError;
use crate::dependencies::DependencyError;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("Failed to read hook {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid hook script {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Hook {path} returned {action}, which is not allowed for a {scope} hook")]
    InvalidAction {
        path: String,
        action: Action,
        scope: HookScope,
    },

    #[error("Hook {path} declares an action in its post phase")]
    ActionInPost { path: String },

    #[error("Hook {path}: cannot {operation} while {state}")]
    InvalidState {
        path: String,
        operation: &'static str,
        state: String,
    },

    #[error("Invalid condition on {variable}: {reason}")]
    InvalidCondition { variable: String, reason: String },

    #[error("Hook step '{step}' failed: {source}")]
    Command {
        step: String,
        source: CommandError,
    },

    #[error("Hook step '{step}' failed on {path}: {source}")]
    Io {
        step: String,
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error(transparent)]
    Dependency(#[from] DependencyError),
}
