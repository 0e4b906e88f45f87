//! Plain `${name}` substitution engine

use super::{Bindings, RenderError, TemplateRenderer};
use crate::config::error::PropertyError;
use crate::config::resolver::PropertyResolver;

pub struct PropertiesRenderer {
    resolver: PropertyResolver,
}

impl PropertiesRenderer {
    pub fn new() -> Self {
        Self {
            resolver: PropertyResolver::strict(),
        }
    }
}

impl Default for PropertiesRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for PropertiesRenderer {
    fn name(&self) -> &'static str {
        "properties"
    }

    fn render(&self, template: &str, bindings: &Bindings) -> Result<String, RenderError> {
        self.resolver
            .resolve(template, |name| bindings.get(name).cloned())
            .map_err(|e| match e {
                PropertyError::Undefined { name } => RenderError::MissingVariable { name },
                other => RenderError::Failed {
                    message: other.to_string(),
                },
            })
    }
}
