//! Operating-system commands used by hooks
//!
//! Everything OS specific lives behind [`SystemCommand`]. One implementation
//! is chosen at startup and passed to the installer; nothing else branches on
//! the platform.

pub mod permissions;
pub mod process;
pub mod recording;
pub mod unix;

pub use process::ProcessRunner;
pub use recording::RecordingCommand;
pub use unix::{PackageTool, ServiceTool, UnixCommand};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with status {code:?}: {output}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid permissions format: {mode}")]
    InvalidPermissions { mode: String },

    #[error("Unknown user: {name}")]
    UnknownUser { name: String },

    #[error("Unknown group: {name}")]
    UnknownGroup { name: String },

    #[error("No {kind} manager available on this host")]
    ManagerNotAvailable { kind: String },

    #[error("Invalid command line '{line}': {reason}")]
    InvalidCommandLine { line: String, reason: String },

    #[error("Operation not supported on this platform: {operation}")]
    Unsupported { operation: String },
}

impl CommandError {
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> CommandError + '_ {
        move |source| CommandError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// A process to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Lines written to the child's stdin, each followed by a newline
    pub stdin: Vec<String>,
    /// Exit codes treated as success; `[0]` when empty
    pub success_codes: Vec<i32>,
    /// Maximum number of output lines kept; the rest is drained and dropped
    pub capture_limit: Option<usize>,
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: Vec::new(),
            success_codes: Vec::new(),
            capture_limit: None,
            working_dir: None,
        }
    }

    /// Split a shell-style command line into program and arguments
    pub fn from_line(line: &str) -> Result<Self, CommandError> {
        let mut words = shell_words::split(line).map_err(|e| CommandError::InvalidCommandLine {
            line: line.to_string(),
            reason: e.to_string(),
        })?;
        if words.is_empty() {
            return Err(CommandError::InvalidCommandLine {
                line: line.to_string(),
                reason: "empty command".to_string(),
            });
        }
        let program = words.remove(0);
        Ok(Self::new(program).args(words))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stdin.extend(lines.into_iter().map(Into::into));
        self
    }

    pub fn success_codes(mut self, codes: impl Into<Vec<i32>>) -> Self {
        self.success_codes = codes.into();
        self
    }

    pub fn capture_limit(mut self, limit: usize) -> Self {
        self.capture_limit = Some(limit);
        self
    }

    pub fn is_success(&self, code: Option<i32>) -> bool {
        match code {
            Some(code) if self.success_codes.is_empty() => code == 0,
            Some(code) => self.success_codes.contains(&code),
            None => false,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = vec![self.program.clone()];
        words.extend(self.args.iter().cloned());
        f.write_str(&shell_words::join(words))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// Captured output of a finished process, stdout and stderr interleaved in
/// arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub lines: Vec<OutputLine>,
    pub dropped_lines: usize,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Default::default()
        }
    }

    pub fn stdout(&self) -> String {
        self.stream_text(OutputStream::Stdout)
    }

    pub fn stderr(&self) -> String {
        self.stream_text(OutputStream::Stderr)
    }

    pub fn combined(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn stream_text(&self, stream: OutputStream) -> String {
        self.lines
            .iter()
            .filter(|l| l.stream == stream)
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Started,
    Stopped,
    Restarted,
    Status,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            ServiceAction::Started => "start",
            ServiceAction::Stopped => "stop",
            ServiceAction::Restarted => "restart",
            ServiceAction::Status => "status",
        };
        f.write_str(verb)
    }
}

#[async_trait]
pub trait SystemCommand: Send + Sync {
    /// Generic process execution
    async fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;

    async fn service(&self, name: &str, action: ServiceAction) -> Result<CommandOutput, CommandError>;

    /// Install from the configured package repositories
    async fn install_package(&self, name: &str) -> Result<CommandOutput, CommandError>;

    /// Install a package file already present on the host
    async fn install_local_package(&self, path: &Path) -> Result<CommandOutput, CommandError>;

    async fn remove_package(&self, name: &str) -> Result<CommandOutput, CommandError>;

    async fn create_user(&self, name: &str, groups: &[String]) -> Result<(), CommandError>;

    async fn create_group(&self, name: &str) -> Result<(), CommandError>;

    async fn chmod(&self, path: &Path, mode: &str) -> Result<(), CommandError>;

    async fn chown(&self, path: &Path, owner: Option<&str>, group: Option<&str>) -> Result<(), CommandError>;

    async fn symlink(&self, source: &Path, link: &Path) -> Result<(), CommandError>;
}
