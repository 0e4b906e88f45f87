//! Handlebars engine in strict mode

use handlebars::{Handlebars, RenderErrorReason};
use serde_json::{Map, Value};
use tracing::debug;

use super::{Bindings, RenderError, TemplateRenderer};

/// Template processor with Handlebars.
///
/// Dotted property names are exposed both verbatim (`{{[app.port]}}`) and as
/// nested objects (`{{app.port}}`).
pub struct HandlebarsRenderer {
    handlebars: Handlebars<'static>,
}

impl HandlebarsRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn name(&self) -> &'static str {
        "handlebars"
    }

    fn render(&self, template: &str, bindings: &Bindings) -> Result<String, RenderError> {
        let data = bindings_to_json(bindings);
        self.handlebars
            .render_template(template, &data)
            .map_err(|e| match e.reason() {
                RenderErrorReason::MissingVariable(name) => RenderError::MissingVariable {
                    name: name.clone().unwrap_or_else(|| "<unknown>".to_string()),
                },
                _ => RenderError::Failed {
                    message: e.to_string(),
                },
            })
    }
}

fn bindings_to_json(bindings: &Bindings) -> Value {
    let mut root = Map::new();

    for (key, value) in bindings {
        root.insert(key.clone(), Value::String(value.clone()));
    }

    for (key, value) in bindings {
        if !key.contains('.') {
            continue;
        }
        if !insert_nested(&mut root, key, value) {
            debug!("Property {} shadowed by a scalar, only available as [{}]", key, key);
        }
    }

    Value::Object(root)
}

fn insert_nested(root: &mut Map<String, Value>, key: &str, value: &str) -> bool {
    let segments: Vec<&str> = key.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = root;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(map) => current = map,
            _ => return false,
        }
    }

    match current.get(*last) {
        Some(Value::Object(_)) => false,
        _ => {
            current.insert(last.to_string(), Value::String(value.to_string()));
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_flat_and_dotted() {
        let renderer = HandlebarsRenderer::new();
        let vars = bindings(&[("name", "web"), ("app.port", "8080")]);

        let out = renderer
            .render("{{name}} listens on {{app.port}} / {{[app.port]}}", &vars)
            .unwrap();
        assert_eq!(out, "web listens on 8080 / 8080");
    }

    #[test]
    fn test_no_html_escaping() {
        let renderer = HandlebarsRenderer::new();
        let vars = bindings(&[("url", "http://a/?x=1&y=<2>")]);
        assert_eq!(renderer.render("{{url}}", &vars).unwrap(), "http://a/?x=1&y=<2>");
    }

    #[test]
    fn test_missing_variable() {
        let renderer = HandlebarsRenderer::new();
        let err = renderer.render("{{nope}}", &Bindings::new()).unwrap_err();
        assert!(err.is_missing_variable());
    }

    #[test]
    fn test_syntax_error_is_generic_failure() {
        let renderer = HandlebarsRenderer::new();
        let err = renderer.render("{{#if}}", &Bindings::new()).unwrap_err();
        assert!(matches!(err, RenderError::Failed { .. }));
    }

    #[test]
    fn test_scalar_parent_shadows_nested() {
        let vars = bindings(&[("app", "plain"), ("app.port", "1")]);
        let json = bindings_to_json(&vars);
        assert_eq!(json["app"], Value::String("plain".to_string()));
        assert_eq!(json["app.port"], Value::String("1".to_string()));
    }
}
