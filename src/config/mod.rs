//! Run configuration: properties, dependencies, environment and locations

pub mod environment;
pub mod error;
pub mod file;
pub mod layout;
pub mod loader;
pub mod properties;
pub mod resolver;
pub mod secrets;

pub use environment::Environment;
pub use error::{ConfigError, PropertyError};
pub use file::ConfigFile;
pub use layout::RunLayout;
pub use loader::ConfigLoader;
pub use properties::{PropertyStore, TemporaryEntry};
pub use resolver::{MissingPolicy, PropertyResolver};
pub use secrets::{KeyPrompt, OpensslDecryptor, SecretDecryptor, SecretResolver, TerminalKeyPrompt};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dependencies::DependencyTable;
use crate::template::DEFAULT_ENGINE;

/// Everything one installation run needs to know, built once up front.
///
/// Only the property store changes during a run (hook assignments).
#[derive(Debug, Clone)]
pub struct Configuration {
    pub properties: PropertyStore,
    pub dependencies: DependencyTable,
    pub environment: Environment,
    pub module_root: PathBuf,
    pub target_root: PathBuf,
    pub layout: RunLayout,
    pub template_engine: String,
}

impl Configuration {
    pub fn new(module_root: impl Into<PathBuf>, target_root: impl Into<PathBuf>, layout: RunLayout) -> Self {
        let mut config = Self {
            properties: PropertyStore::new(),
            dependencies: DependencyTable::default(),
            environment: Environment::default(),
            module_root: module_root.into(),
            target_root: target_root.into(),
            layout,
            template_engine: DEFAULT_ENGINE.to_string(),
        };
        config.apply_builtin_properties();
        config
    }

    pub fn with_properties(mut self, properties: PropertyStore) -> Self {
        self.properties = properties;
        self.apply_builtin_properties();
        self
    }

    pub fn with_dependencies(mut self, dependencies: DependencyTable) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self.apply_builtin_properties();
        self
    }

    pub fn with_template_engine(mut self, name: impl Into<String>) -> Self {
        self.template_engine = name.into();
        self
    }

    pub fn module_name(&self) -> String {
        module_name_of(&self.module_root)
    }

    fn apply_builtin_properties(&mut self) {
        let builtins = builtin_properties(&self.module_root, &self.layout, self.environment);
        for (key, value) in builtins {
            self.properties.set_builtin(key, value);
        }
    }
}

/// Properties the engine defines for every run. Configured values of the same
/// name shadow them.
pub fn builtin_properties(
    module_root: &Path,
    layout: &RunLayout,
    environment: Environment,
) -> HashMap<String, String> {
    HashMap::from([
        ("environment".to_string(), environment.as_str().to_string()),
        ("module.name".to_string(), module_name_of(module_root)),
        ("module.root".to_string(), module_root.display().to_string()),
        ("run.timestamp".to_string(), layout.timestamp.clone()),
    ])
}

fn module_name_of(module_root: &Path) -> String {
    module_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
