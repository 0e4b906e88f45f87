//! Rustle Provision - module-driven host provisioning
//!
//! A module is a directory tree describing the desired state of a host's
//! filesystem. Installing it removes what `.del` markers name, copies plain
//! files, renders `.tmpl` templates and runs `.hook` scripts around each step,
//! backing up everything it is about to overwrite or remove.

pub mod command;
pub mod config;
pub mod dependencies;
pub mod hooks;
pub mod install;
pub mod template;
pub mod visitor;

pub use command::{RecordingCommand, SystemCommand, UnixCommand};
pub use config::{ConfigLoader, Configuration};
pub use install::{InstallError, InstallReport, ModuleInstaller};
