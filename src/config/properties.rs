//! Flat property store with process-wide overrides

use std::collections::{BTreeMap, HashMap};

use super::error::PropertyError;
use super::resolver::PropertyResolver;
use super::secrets::SecretResolver;

/// Previous state of a key overwritten by a temporary assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryEntry {
    pub key: String,
    pub previous: Option<String>,
}

/// Key/value store for one run.
///
/// Lookups consult the process-wide overrides, then the file-sourced and
/// hook-assigned values, then the built-ins. Keys are case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    overrides: HashMap<String, String>,
    values: HashMap<String, String>,
    builtins: HashMap<String, String>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge file-sourced values under process-wide overrides, with the
    /// built-ins underneath both.
    ///
    /// Every value is decrypted if marked, then resolved exactly once against
    /// the merged view. Nothing is re-resolved afterwards.
    pub async fn load(
        builtins: HashMap<String, String>,
        file_values: HashMap<String, String>,
        overrides: HashMap<String, String>,
        secrets: &mut SecretResolver,
    ) -> Result<Self, PropertyError> {
        let mut raw = Self {
            builtins,
            ..Self::default()
        };
        for (key, value) in file_values {
            let value = secrets.reveal(&value).await?;
            raw.values.insert(key, value);
        }
        for (key, value) in overrides {
            let value = secrets.reveal(&value).await?;
            raw.overrides.insert(key, value);
        }

        let resolver = PropertyResolver::new();
        let mut store = Self {
            builtins: raw.builtins.clone(),
            ..Self::default()
        };
        for (key, value) in &raw.values {
            let resolved = resolver.resolve(value, |name| raw.get(name).map(str::to_string))?;
            store.values.insert(key.clone(), resolved);
        }
        for (key, value) in &raw.overrides {
            let resolved = resolver.resolve(value, |name| raw.get(name).map(str::to_string))?;
            store.overrides.insert(key.clone(), resolved);
        }

        Ok(store)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.overrides
            .get(key)
            .or_else(|| self.values.get(key))
            .or_else(|| self.builtins.get(key))
            .map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Permanent assignment, kept for the rest of the run
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Value supplied by the engine itself, shadowed by any configured value
    pub fn set_builtin(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.builtins.insert(key.into(), value.into());
    }

    pub fn set_override(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Assignment that the caller must later undo with [`PropertyStore::restore`]
    pub fn set_temporary(&mut self, key: impl Into<String>, value: impl Into<String>) -> TemporaryEntry {
        let key = key.into();
        let previous = self.values.insert(key.clone(), value.into());
        TemporaryEntry { key, previous }
    }

    pub fn restore(&mut self, entry: TemporaryEntry) {
        match entry.previous {
            Some(previous) => {
                self.values.insert(entry.key, previous);
            }
            None => {
                self.values.remove(&entry.key);
            }
        }
    }

    /// Resolve `${name}` references in `raw`, leaving unknown names in place
    pub fn resolve(&self, raw: &str) -> Result<String, PropertyError> {
        PropertyResolver::new().resolve(raw, |name| self.get(name).map(str::to_string))
    }

    /// Effective view with overrides applied, sorted by key
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let mut merged: BTreeMap<String, String> = self
            .builtins
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in self.values.iter().chain(&self.overrides) {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && self.values.is_empty() && self.builtins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secrets::{KeyPrompt, SecretDecryptor};

    struct NoDecrypt;

    #[async_trait::async_trait]
    impl SecretDecryptor for NoDecrypt {
        async fn decrypt(&self, _ciphertext: &str, _key: &str) -> Result<String, String> {
            Err("not available".to_string())
        }
    }

    struct NoPrompt;

    impl KeyPrompt for NoPrompt {
        fn prompt_key(&mut self, _attempt: u32) -> Result<String, PropertyError> {
            Err(PropertyError::KeyUnavailable {
                reason: "test".to_string(),
            })
        }
    }

    fn secrets() -> SecretResolver {
        SecretResolver::new(Box::new(NoDecrypt), Box::new(NoPrompt))
    }

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_overrides_beat_file_values() {
        let store = PropertyStore::load(
            HashMap::new(),
            map(&[("port", "80"), ("url", "http://host:${port}")]),
            map(&[("port", "8080")]),
            &mut secrets(),
        )
        .await
        .unwrap();

        assert_eq!(store.get("port"), Some("8080"));
        assert_eq!(store.get("url"), Some("http://host:8080"));
    }

    #[test]
    fn test_temporary_assignment_restores_previous_value() {
        let mut store = PropertyStore::new();
        store.set("mode", "permanent");

        let replaced = store.set_temporary("mode", "temp");
        let added = store.set_temporary("scratch", "x");
        assert_eq!(store.get("mode"), Some("temp"));
        assert_eq!(store.get("scratch"), Some("x"));

        store.restore(added);
        store.restore(replaced);
        assert_eq!(store.get("mode"), Some("permanent"));
        assert!(!store.contains("scratch"));
    }

    #[tokio::test]
    async fn test_encrypted_value_without_key_fails_load() {
        let err = PropertyStore::load(
            HashMap::new(),
            map(&[("secret", "ENC:abc")]),
            HashMap::new(),
            &mut secrets(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PropertyError::KeyUnavailable { .. }));
    }

    #[test]
    fn test_snapshot_applies_overrides() {
        let mut store = PropertyStore::new();
        store.set("a", "1");
        store.set_override("a", "2");
        store.set("b", "3");

        let snapshot = store.snapshot();
        assert_eq!(snapshot.get("a").map(String::as_str), Some("2"));
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_builtins_resolve_under_configured_values() {
        let store = PropertyStore::load(
            map(&[("module.name", "web"), ("environment", "staging")]),
            map(&[("log.dir", "/var/log/${module.name}"), ("environment", "lab")]),
            map(&[("env.tag", "${environment}-${module.name}")]),
            &mut secrets(),
        )
        .await
        .unwrap();

        assert_eq!(store.get("log.dir"), Some("/var/log/web"));
        assert_eq!(store.get("environment"), Some("lab"));
        assert_eq!(store.get("env.tag"), Some("lab-web"));
    }

    #[test]
    fn test_builtin_shadowed_then_visible_again() {
        let mut store = PropertyStore::new();
        store.set_builtin("module.name", "web");

        let entry = store.set_temporary("module.name", "scratch");
        assert_eq!(store.get("module.name"), Some("scratch"));
        store.restore(entry);

        assert_eq!(store.get("module.name"), Some("web"));
        assert_eq!(store.snapshot().len(), 1);
    }
}
