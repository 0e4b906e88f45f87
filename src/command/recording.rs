//! Command implementation that records instead of executing

use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use super::{CommandError, CommandOutput, CommandSpec, ServiceAction, SystemCommand};

/// Logs every call and reports success without touching the host. Used for
/// dry runs and as a test double.
#[derive(Debug, Default)]
pub struct RecordingCommand {
    calls: Mutex<Vec<String>>,
}

impl RecordingCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls seen so far, one line per call
    pub fn calls(&self) -> Vec<String> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, call: String) {
        info!("Skipped command: {}", call);
        match self.calls.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }
}

#[async_trait]
impl SystemCommand for RecordingCommand {
    async fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.record(format!("execute {spec}"));
        Ok(CommandOutput::success())
    }

    async fn service(&self, name: &str, action: ServiceAction) -> Result<CommandOutput, CommandError> {
        self.record(format!("service {name} {action}"));
        Ok(CommandOutput::success())
    }

    async fn install_package(&self, name: &str) -> Result<CommandOutput, CommandError> {
        self.record(format!("install_package {name}"));
        Ok(CommandOutput::success())
    }

    async fn install_local_package(&self, path: &Path) -> Result<CommandOutput, CommandError> {
        self.record(format!("install_local_package {}", path.display()));
        Ok(CommandOutput::success())
    }

    async fn remove_package(&self, name: &str) -> Result<CommandOutput, CommandError> {
        self.record(format!("remove_package {name}"));
        Ok(CommandOutput::success())
    }

    async fn create_user(&self, name: &str, groups: &[String]) -> Result<(), CommandError> {
        self.record(format!("create_user {name} [{}]", groups.join(",")));
        Ok(())
    }

    async fn create_group(&self, name: &str) -> Result<(), CommandError> {
        self.record(format!("create_group {name}"));
        Ok(())
    }

    async fn chmod(&self, path: &Path, mode: &str) -> Result<(), CommandError> {
        self.record(format!("chmod {mode} {}", path.display()));
        Ok(())
    }

    async fn chown(&self, path: &Path, owner: Option<&str>, group: Option<&str>) -> Result<(), CommandError> {
        self.record(format!(
            "chown {}:{} {}",
            owner.unwrap_or(""),
            group.unwrap_or(""),
            path.display()
        ));
        Ok(())
    }

    async fn symlink(&self, source: &Path, link: &Path) -> Result<(), CommandError> {
        self.record(format!("symlink {} {}", source.display(), link.display()));
        Ok(())
    }
}
