//! Builds a [`Configuration`] from the config file and command-line overrides

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::environment::{host_addresses, Environment};
use super::error::ConfigError;
use super::file::ConfigFile;
use super::layout::RunLayout;
use super::properties::PropertyStore;
use super::secrets::SecretResolver;
use super::{builtin_properties, Configuration};
use crate::dependencies::DependencyTable;
use crate::template::{is_known_engine, DEFAULT_ENGINE};

pub struct ConfigLoader {
    config_file: PathBuf,
    module_root: PathBuf,
    workspace: PathBuf,
    target_root: Option<PathBuf>,
    overrides: HashMap<String, String>,
    host_addresses: Option<Vec<IpAddr>>,
    now: DateTime<Local>,
}

impl ConfigLoader {
    pub fn new(config_file: impl Into<PathBuf>, module_root: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
            module_root: module_root.into(),
            workspace: RunLayout::default_workspace(),
            target_root: None,
            overrides: HashMap::new(),
            host_addresses: None,
            now: Local::now(),
        }
    }

    pub fn workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Takes precedence over `target_root` in the config file
    pub fn target_root(mut self, target_root: impl Into<PathBuf>) -> Self {
        self.target_root = Some(target_root.into());
        self
    }

    pub fn override_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Parse `key=value` pairs as given to `--set`
    pub fn overrides_from_args<I, S>(mut self, args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            let (key, value) = parse_override(arg.as_ref())?;
            self.overrides.insert(key, value);
        }
        Ok(self)
    }

    /// Use fixed addresses instead of probing the host
    pub fn host_addresses(mut self, addresses: Vec<IpAddr>) -> Self {
        self.host_addresses = Some(addresses);
        self
    }

    pub fn now(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    pub fn layout(&self) -> RunLayout {
        RunLayout::new(&self.workspace, &self.module_root, &self.config_file, self.now)
    }

    pub async fn load(self, secrets: &mut SecretResolver) -> Result<Configuration, ConfigError> {
        if !self.module_root.is_dir() {
            return Err(ConfigError::ModuleNotFound {
                path: self.module_root.display().to_string(),
            });
        }

        let file = ConfigFile::read(&self.config_file).await?;
        info!("Loaded configuration from {}", self.config_file.display());

        let engine = file
            .template_engine
            .clone()
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string());
        if !is_known_engine(&engine) {
            return Err(ConfigError::UnknownTemplateEngine { name: engine });
        }

        let addresses = self.host_addresses.clone().unwrap_or_else(host_addresses);
        let environment = Environment::classify(&file.environments, &addresses);
        info!("Host classified as {}", environment);

        let layout = self.layout();
        let builtins = builtin_properties(&self.module_root, &layout, environment);
        let properties = PropertyStore::load(
            builtins,
            file.string_properties(),
            self.overrides.clone(),
            secrets,
        )
        .await?;
        debug!("Resolved {} properties", properties.len());

        let target_root = self
            .target_root
            .clone()
            .or(file.target_root.clone())
            .unwrap_or_else(filesystem_root);

        Ok(Configuration::new(&self.module_root, target_root, layout)
            .with_properties(properties)
            .with_dependencies(DependencyTable::new(file.dependencies))
            .with_environment(environment)
            .with_template_engine(engine))
    }
}

pub fn parse_override(arg: &str) -> Result<(String, String), ConfigError> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::InvalidOverride {
            value: arg.to_string(),
        }),
    }
}

fn filesystem_root() -> PathBuf {
    Path::new(std::path::MAIN_SEPARATOR_STR).to_path_buf()
}
