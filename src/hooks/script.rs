//! Declarative hook script format
//!
//! ```yaml
//! pre:
//!   - when:
//!       - { variable: environment, operator: equals, value: production }
//!     action: skip
//!   - set_temp: { service.name: nginx }
//! post:
//!   - service: { name: "${service.name}", state: restarted }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::action::Action;
use super::conditions::Condition;
use super::error::HookError;
use crate::command::ServiceAction;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HookScript {
    #[serde(default)]
    pub pre: Vec<HookStep>,
    #[serde(default)]
    pub post: Vec<HookStep>,
}

impl HookScript {
    pub async fn load(path: &Path) -> Result<Self, HookError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| HookError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::parse(&content, path)
    }

    /// Parse a script. An empty document is a script with no steps.
    pub fn parse(content: &str, path: &Path) -> Result<Self, HookError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let script: HookScript =
            serde_yaml::from_str(content).map_err(|source| HookError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        if script
            .post
            .iter()
            .any(|step| matches!(step.op, HookOp::Action(_)))
        {
            return Err(HookError::ActionInPost {
                path: path.display().to_string(),
            });
        }
        Ok(script)
    }
}

/// One operation, run only when every `when` condition holds
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HookStep {
    #[serde(default)]
    pub when: Vec<Condition>,
    #[serde(flatten)]
    pub op: HookOp,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookOp {
    /// Ends the pre phase with this outcome
    Action(Action),
    Set(BTreeMap<String, String>),
    /// Undone when the hook finishes
    SetTemp(BTreeMap<String, String>),
    Unset(Vec<String>),
    Log(String),
    Run(RunStep),
    Service(ServiceStep),
    Package(PackageStep),
    User(UserStep),
    Group(GroupStep),
    Chmod(ChmodStep),
    Chown(ChownStep),
    Symlink(SymlinkStep),
    Remove(RemovePath),
}

impl HookOp {
    pub fn name(&self) -> &'static str {
        match self {
            HookOp::Action(_) => "action",
            HookOp::Set(_) => "set",
            HookOp::SetTemp(_) => "set_temp",
            HookOp::Unset(_) => "unset",
            HookOp::Log(_) => "log",
            HookOp::Run(_) => "run",
            HookOp::Service(_) => "service",
            HookOp::Package(_) => "package",
            HookOp::User(_) => "user",
            HookOp::Group(_) => "group",
            HookOp::Chmod(_) => "chmod",
            HookOp::Chown(_) => "chown",
            HookOp::Symlink(_) => "symlink",
            HookOp::Remove(_) => "remove",
        }
    }
}

/// Generic process execution. `command` may hold a whole command line;
/// `args` are appended to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStep {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub stdin: Vec<String>,
    #[serde(default)]
    pub success_codes: Vec<i32>,
    #[serde(default)]
    pub capture_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStep {
    pub name: String,
    pub state: ServiceAction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageState {
    #[default]
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageStep {
    pub name: String,
    #[serde(default)]
    pub state: PackageState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStep {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStep {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChmodStep {
    pub path: String,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChownStep {
    pub path: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymlinkStep {
    pub source: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovePath {
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::conditions::ConditionOperator;

    #[test]
    fn test_parse_full_script() {
        let yaml = r#"
pre:
  - when:
      - { variable: environment, operator: equals, value: production }
    action: skip
  - set_temp: { service.name: nginx }
  - run: { command: "nginx -t", success_codes: [0, 1] }
post:
  - service: { name: "${service.name}", state: restarted }
  - package: { name: nginx }
  - log: "installed ${hook.target}"
"#;
        let script = HookScript::parse(yaml, Path::new("test.hook")).unwrap();

        assert_eq!(script.pre.len(), 3);
        assert_eq!(script.pre[0].op, HookOp::Action(Action::Skip));
        assert_eq!(script.pre[0].when[0].operator, ConditionOperator::Equals);
        match &script.pre[2].op {
            HookOp::Run(run) => {
                assert_eq!(run.command, "nginx -t");
                assert_eq!(run.success_codes, vec![0, 1]);
            }
            other => panic!("unexpected op {other:?}"),
        }

        assert_eq!(script.post.len(), 3);
        match &script.post[1].op {
            HookOp::Package(package) => assert_eq!(package.state, PackageState::Present),
            other => panic!("unexpected op {other:?}"),
        }
        assert_eq!(script.post[2].op.name(), "log");
    }

    #[test]
    fn test_empty_script() {
        let script = HookScript::parse("  \n", Path::new("empty.hook")).unwrap();
        assert!(script.pre.is_empty());
        assert!(script.post.is_empty());
    }

    #[test]
    fn test_action_in_post_rejected() {
        let yaml = "post:\n  - action: cancel\n";
        let err = HookScript::parse(yaml, Path::new("bad.hook")).unwrap_err();
        assert!(matches!(err, HookError::ActionInPost { .. }));
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let yaml = "pre:\n  - reboot: now\n";
        let err = HookScript::parse(yaml, Path::new("bad.hook")).unwrap_err();
        assert!(matches!(err, HookError::Parse { .. }));
    }
}
