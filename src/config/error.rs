use thiserror::Error;

/// Errors raised while resolving or decrypting property values
#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("Undefined property: {name}")]
    Undefined { name: String },

    #[error("Circular property reference: {}", chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    #[error("Failed to decrypt property value after {attempts} attempt(s): {reason}")]
    DecryptionFailed { attempts: u32, reason: String },

    #[error("Unable to obtain decryption key: {reason}")]
    KeyUnavailable { reason: String },
}

/// Errors raised while building the run configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid configuration file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Invalid property override '{value}': expected key=value")]
    InvalidOverride { value: String },

    #[error("Module directory does not exist: {path}")]
    ModuleNotFound { path: String },

    #[error("Unknown template engine: {name}")]
    UnknownTemplateEngine { name: String },

    #[error("Property error: {0}")]
    Property(#[from] PropertyError),
}
