//! `${name}` substitution over a flat key/value lookup

use super::error::PropertyError;

pub const VARIABLE_START: &str = "${";
pub const VARIABLE_END: &str = "}";

/// What to do with a `${name}` whose name the lookup does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPolicy {
    /// Leave the reference in the output untouched
    #[default]
    Keep,
    /// Fail with [`PropertyError::Undefined`]
    Fail,
}

/// Recursive variable resolver.
///
/// Values that themselves contain references are expanded depth-first before
/// being substituted. The chain of names currently being expanded is tracked so
/// that a self-referential pair fails with [`PropertyError::CircularReference`]
/// instead of recursing forever.
#[derive(Debug, Clone, Default)]
pub struct PropertyResolver {
    missing: MissingPolicy,
}

impl PropertyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self {
            missing: MissingPolicy::Fail,
        }
    }

    pub fn with_missing_policy(missing: MissingPolicy) -> Self {
        Self { missing }
    }

    pub fn resolve<F>(&self, raw: &str, lookup: F) -> Result<String, PropertyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut chain = Vec::new();
        self.expand(raw, &lookup, &mut chain)
    }

    fn expand<F>(
        &self,
        raw: &str,
        lookup: &F,
        chain: &mut Vec<String>,
    ) -> Result<String, PropertyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut output = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(start) = rest.find(VARIABLE_START) {
            let after_start = &rest[start + VARIABLE_START.len()..];
            let Some(end) = after_start.find(VARIABLE_END) else {
                break;
            };

            output.push_str(&rest[..start]);
            let name = &after_start[..end];

            match lookup(name) {
                Some(value) => {
                    if chain.iter().any(|seen| seen == name) {
                        let mut cycle = chain.clone();
                        cycle.push(name.to_string());
                        return Err(PropertyError::CircularReference { chain: cycle });
                    }
                    chain.push(name.to_string());
                    let expanded = self.expand(&value, lookup, chain)?;
                    chain.pop();
                    output.push_str(&expanded);
                }
                None => match self.missing {
                    MissingPolicy::Keep => {
                        output.push_str(VARIABLE_START);
                        output.push_str(name);
                        output.push_str(VARIABLE_END);
                    }
                    MissingPolicy::Fail => {
                        return Err(PropertyError::Undefined {
                            name: name.to_string(),
                        })
                    }
                },
            }

            rest = &after_start[end + VARIABLE_END.len()..];
        }

        output.push_str(rest);
        Ok(output)
    }
}

/// Whether `value` still contains at least one complete `${name}` reference
pub fn has_references(value: &str) -> bool {
    value
        .find(VARIABLE_START)
        .map(|start| value[start..].contains(VARIABLE_END))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_simple_substitution() {
        let map = HashMap::from([("host", "db.local"), ("port", "5432")]);
        let resolved = PropertyResolver::new()
            .resolve("postgres://${host}:${port}/app", lookup(&map))
            .unwrap();
        assert_eq!(resolved, "postgres://db.local:5432/app");
    }

    #[test]
    fn test_nested_values_resolved_depth_first() {
        let map = HashMap::from([
            ("base", "/opt/${app}"),
            ("app", "billing"),
            ("logs", "${base}/logs"),
        ]);
        let resolved = PropertyResolver::new()
            .resolve("${logs}", lookup(&map))
            .unwrap();
        assert_eq!(resolved, "/opt/billing/logs");
    }

    #[test]
    fn test_missing_kept_by_default() {
        let map = HashMap::new();
        let resolved = PropertyResolver::new()
            .resolve("a ${missing} b", lookup(&map))
            .unwrap();
        assert_eq!(resolved, "a ${missing} b");
    }

    #[test]
    fn test_missing_fails_in_strict_mode() {
        let map = HashMap::new();
        let err = PropertyResolver::strict()
            .resolve("${missing}", lookup(&map))
            .unwrap_err();
        assert!(matches!(err, PropertyError::Undefined { name } if name == "missing"));
    }

    #[test]
    fn test_cycle_detected() {
        let map = HashMap::from([("a", "${b}"), ("b", "${a}")]);
        let err = PropertyResolver::new()
            .resolve("${a}", lookup(&map))
            .unwrap_err();
        match err {
            PropertyError::CircularReference { chain } => {
                assert_eq!(chain, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_variable_twice_is_not_a_cycle() {
        let map = HashMap::from([("x", "1")]);
        let resolved = PropertyResolver::new()
            .resolve("${x}${x}", lookup(&map))
            .unwrap();
        assert_eq!(resolved, "11");
    }

    #[test]
    fn test_unterminated_reference_left_alone() {
        let map = HashMap::from([("x", "1")]);
        let resolved = PropertyResolver::new()
            .resolve("${x} and ${x", lookup(&map))
            .unwrap();
        assert_eq!(resolved, "1 and ${x");
    }

    #[test]
    fn test_has_references() {
        assert!(has_references("${a}"));
        assert!(!has_references("plain"));
        assert!(!has_references("${open"));
    }
}
