//! On-disk configuration file format

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::environment::Environment;
use super::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub properties: HashMap<String, serde_yaml::Value>,
    pub dependencies: HashMap<String, PathBuf>,
    pub environments: HashMap<Environment, Vec<String>>,
    pub template_engine: Option<String>,
    pub target_root: Option<PathBuf>,
}

impl ConfigFile {
    pub async fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Properties flattened to strings; YAML scalars keep their textual form
    pub fn string_properties(&self) -> HashMap<String, String> {
        self.properties
            .iter()
            .map(|(key, value)| (key.clone(), scalar_to_string(value)))
            .collect()
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
