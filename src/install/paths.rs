//! Module path to host path mapping

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

use super::error::PathError;
use crate::config::PropertyStore;

/// `@name@` inside a single path segment. A lone `@` is not a placeholder.
static PATH_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9_.\-]+)@").expect("path variable pattern is valid"));

/// Maps entries of a module onto the target root
#[derive(Debug, Clone)]
pub struct PathResolver {
    module_root: PathBuf,
    target_root: PathBuf,
}

impl PathResolver {
    pub fn new(module_root: impl Into<PathBuf>, target_root: impl Into<PathBuf>) -> Self {
        Self {
            module_root: module_root.into(),
            target_root: target_root.into(),
        }
    }

    pub fn module_root(&self) -> &Path {
        &self.module_root
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    /// Host path for a module entry: its module-relative path under the
    /// target root, with `@name@` placeholders substituted per segment
    pub fn target_of(&self, module_path: &Path, properties: &PropertyStore) -> Result<PathBuf, PathError> {
        let relative = module_path
            .strip_prefix(&self.module_root)
            .map_err(|_| PathError::OutsideModule {
                path: module_path.display().to_string(),
                root: self.module_root.display().to_string(),
            })?;

        let mut target = self.target_root.clone();
        for component in relative.components() {
            let Component::Normal(segment) = component else {
                continue;
            };
            match segment.to_str() {
                Some(segment) => {
                    let resolved = substitute_segment(segment, module_path, properties)?;
                    target.push(resolved);
                }
                None => target.push(segment),
            }
        }
        Ok(target)
    }

    /// Drop `suffix` from the file name of `module_path`, then map it with
    /// [`PathResolver::target_of`]
    pub fn strip_suffix(
        &self,
        module_path: &Path,
        suffix: &str,
        properties: &PropertyStore,
    ) -> Result<PathBuf, PathError> {
        let missing = || PathError::MissingSuffix {
            path: module_path.display().to_string(),
            suffix: suffix.to_string(),
        };

        let name = module_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(missing)?;
        let stripped = name.strip_suffix(suffix).ok_or_else(missing)?;
        if stripped.is_empty() {
            return Err(missing());
        }

        self.target_of(&module_path.with_file_name(stripped), properties)
    }
}

fn substitute_segment(segment: &str, path: &Path, properties: &PropertyStore) -> Result<String, PathError> {
    if !segment.contains('@') {
        return Ok(segment.to_string());
    }

    let mut resolved = String::with_capacity(segment.len());
    let mut last = 0;
    for captures in PATH_VARIABLE.captures_iter(segment) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value = properties
            .get(name.as_str())
            .ok_or_else(|| PathError::UnresolvedVariable {
                name: name.as_str().to_string(),
                path: path.display().to_string(),
            })?;
        resolved.push_str(&segment[last..whole.start()]);
        resolved.push_str(value);
        last = whole.end();
    }
    resolved.push_str(&segment[last..]);

    if resolved.is_empty() || resolved == "." || resolved == ".." || resolved.contains(['/', '\\']) {
        return Err(PathError::InvalidSegment {
            segment: resolved,
            path: path.display().to_string(),
        });
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new("/srv/modules/web", "/")
    }

    fn properties() -> PropertyStore {
        let mut properties = PropertyStore::new();
        properties.set("app.name", "shop");
        properties.set("env", "prod");
        properties
    }

    #[test]
    fn test_target_of_plain_path() {
        let target = resolver()
            .target_of(Path::new("/srv/modules/web/etc/nginx/nginx.conf"), &properties())
            .unwrap();
        assert_eq!(target, PathBuf::from("/etc/nginx/nginx.conf"));
    }

    #[test]
    fn test_target_of_substitutes_variables() {
        let target = resolver()
            .target_of(
                Path::new("/srv/modules/web/opt/@app.name@/@app.name@-@env@.conf"),
                &properties(),
            )
            .unwrap();
        assert_eq!(target, PathBuf::from("/opt/shop/shop-prod.conf"));
    }

    #[test]
    fn test_unresolved_variable_is_fatal() {
        let err = resolver()
            .target_of(Path::new("/srv/modules/web/opt/@missing@/x"), &properties())
            .unwrap_err();
        assert!(matches!(err, PathError::UnresolvedVariable { name, .. } if name == "missing"));
    }

    #[test]
    fn test_lone_at_sign_is_literal() {
        let target = resolver()
            .target_of(Path::new("/srv/modules/web/home/user@host"), &properties())
            .unwrap();
        assert_eq!(target, PathBuf::from("/home/user@host"));
    }

    #[test]
    fn test_value_with_separator_rejected() {
        let mut properties = properties();
        properties.set("escape", "../etc");
        let err = resolver()
            .target_of(Path::new("/srv/modules/web/@escape@"), &properties)
            .unwrap_err();
        assert!(matches!(err, PathError::InvalidSegment { .. }));
    }

    #[test]
    fn test_outside_module() {
        let err = resolver()
            .target_of(Path::new("/srv/modules/other/x"), &properties())
            .unwrap_err();
        assert!(matches!(err, PathError::OutsideModule { .. }));
    }

    #[test]
    fn test_strip_suffix() {
        let resolver = PathResolver::new("/m", "/staging");
        let properties = properties();

        assert_eq!(
            resolver
                .strip_suffix(Path::new("/m/dir1/f1.txt.del"), ".del", &properties)
                .unwrap(),
            PathBuf::from("/staging/dir1/f1.txt")
        );
        assert_eq!(
            resolver
                .strip_suffix(Path::new("/m/etc/app.conf.tmpl"), ".tmpl", &properties)
                .unwrap(),
            PathBuf::from("/staging/etc/app.conf")
        );
        assert!(resolver
            .strip_suffix(Path::new("/m/etc/app.conf"), ".tmpl", &properties)
            .is_err());
        assert!(resolver
            .strip_suffix(Path::new("/m/.del"), ".del", &properties)
            .is_err());
    }
}
