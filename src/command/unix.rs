//! Unix implementation of [`SystemCommand`]

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use super::permissions;
use super::process::ProcessRunner;
use super::{CommandError, CommandOutput, CommandSpec, ServiceAction, SystemCommand};

/// Package manager found on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageTool {
    Apt,
    Dnf,
    Yum,
    Brew,
    Unavailable,
}

impl PackageTool {
    /// First manager found on `PATH`, in order of preference
    pub fn detect() -> Self {
        Self::detect_with(|program| which::which(program).is_ok())
    }

    pub fn detect_with(available: impl Fn(&str) -> bool) -> Self {
        if available("apt-get") {
            PackageTool::Apt
        } else if available("dnf") {
            PackageTool::Dnf
        } else if available("yum") {
            PackageTool::Yum
        } else if available("brew") {
            PackageTool::Brew
        } else {
            PackageTool::Unavailable
        }
    }

    fn install(self, name: &str) -> Result<CommandSpec, CommandError> {
        let spec = match self {
            PackageTool::Apt => CommandSpec::new("apt-get").args(["install", "-y", name]),
            PackageTool::Dnf => CommandSpec::new("dnf").args(["install", "-y", name]),
            PackageTool::Yum => CommandSpec::new("yum").args(["install", "-y", name]),
            PackageTool::Brew => CommandSpec::new("brew").args(["install", name]),
            PackageTool::Unavailable => return Err(unavailable("package")),
        };
        Ok(spec)
    }

    /// Package managers take a bare relative name for a repository package,
    /// so the file is always passed as an absolute path
    fn install_local(self, path: &Path) -> Result<CommandSpec, CommandError> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(CommandError::io(path))?
                .join(path)
        };
        let file = absolute.display().to_string();
        let spec = match self {
            PackageTool::Apt => CommandSpec::new("apt-get").args(["install", "-y", file.as_str()]),
            PackageTool::Dnf => CommandSpec::new("dnf").args(["install", "-y", file.as_str()]),
            PackageTool::Yum => CommandSpec::new("yum").args(["localinstall", "-y", file.as_str()]),
            PackageTool::Brew => CommandSpec::new("brew").args(["install", file.as_str()]),
            PackageTool::Unavailable => return Err(unavailable("package")),
        };
        Ok(spec)
    }

    fn remove(self, name: &str) -> Result<CommandSpec, CommandError> {
        let spec = match self {
            PackageTool::Apt => CommandSpec::new("apt-get").args(["remove", "-y", name]),
            PackageTool::Dnf => CommandSpec::new("dnf").args(["remove", "-y", name]),
            PackageTool::Yum => CommandSpec::new("yum").args(["remove", "-y", name]),
            PackageTool::Brew => CommandSpec::new("brew").args(["uninstall", name]),
            PackageTool::Unavailable => return Err(unavailable("package")),
        };
        Ok(spec)
    }
}

/// Service manager found on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceTool {
    Systemd,
    SysvInit,
    Unavailable,
}

impl ServiceTool {
    pub fn detect() -> Self {
        Self::detect_with(|program| which::which(program).is_ok())
    }

    pub fn detect_with(available: impl Fn(&str) -> bool) -> Self {
        if available("systemctl") {
            ServiceTool::Systemd
        } else if available("service") {
            ServiceTool::SysvInit
        } else {
            ServiceTool::Unavailable
        }
    }

    fn command(self, name: &str, action: ServiceAction) -> Result<CommandSpec, CommandError> {
        let verb = action.to_string();
        let spec = match self {
            ServiceTool::Systemd => CommandSpec::new("systemctl").args([verb.as_str(), name]),
            ServiceTool::SysvInit => CommandSpec::new("service").args([name, verb.as_str()]),
            ServiceTool::Unavailable => return Err(unavailable("service")),
        };
        // status of a stopped service exits 3 under both managers
        Ok(match action {
            ServiceAction::Status => spec.success_codes(vec![0, 3]),
            _ => spec,
        })
    }
}

fn unavailable(kind: &str) -> CommandError {
    CommandError::ManagerNotAvailable {
        kind: kind.to_string(),
    }
}

/// Commands for Linux and macOS hosts. The package and service managers are
/// chosen once at construction.
#[derive(Debug, Clone)]
pub struct UnixCommand {
    runner: ProcessRunner,
    packages: PackageTool,
    services: ServiceTool,
}

impl UnixCommand {
    pub fn detect() -> Self {
        Self::with_tools(PackageTool::detect(), ServiceTool::detect())
    }

    pub fn with_tools(packages: PackageTool, services: ServiceTool) -> Self {
        info!("Using package manager {:?}, service manager {:?}", packages, services);
        Self {
            runner: ProcessRunner::new(),
            packages,
            services,
        }
    }

    pub fn package_tool(&self) -> PackageTool {
        self.packages
    }

    pub fn service_tool(&self) -> ServiceTool {
        self.services
    }
}

#[async_trait]
impl SystemCommand for UnixCommand {
    async fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.runner.run(spec).await
    }

    async fn service(&self, name: &str, action: ServiceAction) -> Result<CommandOutput, CommandError> {
        let spec = self.services.command(name, action)?;
        self.runner.run(&spec).await
    }

    async fn install_package(&self, name: &str) -> Result<CommandOutput, CommandError> {
        let spec = self.packages.install(name)?;
        self.runner.run(&spec).await
    }

    async fn install_local_package(&self, path: &Path) -> Result<CommandOutput, CommandError> {
        let spec = self.packages.install_local(path)?;
        self.runner.run(&spec).await
    }

    async fn remove_package(&self, name: &str) -> Result<CommandOutput, CommandError> {
        let spec = self.packages.remove(name)?;
        self.runner.run(&spec).await
    }

    async fn create_user(&self, name: &str, groups: &[String]) -> Result<(), CommandError> {
        if user_exists(name) {
            debug!("User {} already exists", name);
            return Ok(());
        }

        let mut spec = CommandSpec::new("useradd");
        if !groups.is_empty() {
            spec = spec.arg("-G").arg(groups.join(","));
        }
        self.runner.run(&spec.arg(name)).await?;
        Ok(())
    }

    async fn create_group(&self, name: &str) -> Result<(), CommandError> {
        if group_exists(name) {
            debug!("Group {} already exists", name);
            return Ok(());
        }
        self.runner.run(&CommandSpec::new("groupadd").arg(name)).await?;
        Ok(())
    }

    async fn chmod(&self, path: &Path, mode: &str) -> Result<(), CommandError> {
        info!("chmod {} {}", mode, path.display());
        permissions::set_permissions(path, mode).await
    }

    async fn chown(&self, path: &Path, owner: Option<&str>, group: Option<&str>) -> Result<(), CommandError> {
        info!(
            "chown {}:{} {}",
            owner.unwrap_or(""),
            group.unwrap_or(""),
            path.display()
        );
        permissions::set_ownership(path, owner, group).await
    }

    async fn symlink(&self, source: &Path, link: &Path) -> Result<(), CommandError> {
        #[cfg(unix)]
        {
            if tokio::fs::symlink_metadata(link).await.is_ok() {
                tokio::fs::remove_file(link)
                    .await
                    .map_err(CommandError::io(link))?;
            }
            info!("Linking {} -> {}", link.display(), source.display());
            tokio::fs::symlink(source, link)
                .await
                .map_err(CommandError::io(link))
        }

        #[cfg(not(unix))]
        {
            let _ = (source, link);
            Err(CommandError::Unsupported {
                operation: "symlink".to_string(),
            })
        }
    }
}

#[cfg(unix)]
fn user_exists(name: &str) -> bool {
    permissions::user_exists(name)
}

#[cfg(not(unix))]
fn user_exists(_name: &str) -> bool {
    false
}

#[cfg(unix)]
fn group_exists(name: &str) -> bool {
    permissions::group_exists(name)
}

#[cfg(not(unix))]
fn group_exists(_name: &str) -> bool {
    false
}
