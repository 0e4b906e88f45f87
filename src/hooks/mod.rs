//! Pre/post/finish hooks around module and file installation
//!
//! A hook script sits next to what it wraps: `etc/app.conf.tmpl.hook` for the
//! entry `etc/app.conf.tmpl`, `web.hook` for the module directory `web`.

pub mod action;
pub mod conditions;
pub mod error;
pub mod hook;
pub mod script;

pub use action::{Action, HookScope};
pub use conditions::{Condition, ConditionEvaluator, ConditionOperator};
pub use error::HookError;
pub use hook::{hook_path_for, Hook, HookContext, HookState};
pub use script::{HookOp, HookScript, HookStep};

pub const HOOK_SUFFIX: &str = ".hook";
