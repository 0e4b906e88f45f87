//! Interchangeable template engines selected by name

pub mod handlebars;
pub mod properties;

pub use self::handlebars::HandlebarsRenderer;
pub use self::properties::PropertiesRenderer;

use std::collections::BTreeMap;
use thiserror::Error;

pub const DEFAULT_ENGINE: &str = "handlebars";
pub const ENGINE_NAMES: &[&str] = &["handlebars", "properties"];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template references undefined variable: {name}")]
    MissingVariable { name: String },

    #[error("Template rendering failed: {message}")]
    Failed { message: String },
}

impl RenderError {
    pub fn is_missing_variable(&self) -> bool {
        matches!(self, RenderError::MissingVariable { .. })
    }
}

/// Flat name/value bindings handed to every engine
pub type Bindings = BTreeMap<String, String>;

pub trait TemplateRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    fn render(&self, template: &str, bindings: &Bindings) -> Result<String, RenderError>;
}

pub fn is_known_engine(name: &str) -> bool {
    ENGINE_NAMES.contains(&name)
}

/// Construct the engine registered under `name`
pub fn engine_by_name(name: &str) -> Option<Box<dyn TemplateRenderer>> {
    match name {
        "handlebars" => Some(Box::new(HandlebarsRenderer::new())),
        "properties" => Some(Box::new(PropertiesRenderer::new())),
        _ => None,
    }
}
