//! Depth-first directory walkers with glob-selected actions
//!
//! [`walk_tree`] drives a [`TreeVisitor`] over the children of a root
//! directory in pre-order, calling back again once a directory's subtree is
//! done. The copy, delete and move visitors layer glob selection on top and
//! hand the actual work to a pluggable step.

pub mod copy;
pub mod delete;
pub mod mover;

pub use copy::{copy_tree, CopyStep, CopyVisitor, MirrorStep};
pub use delete::{delete_tree, DeleteStep, DeleteVisitor, RemoveStep};
pub use mover::{move_tree, MoveVisitor};

use async_trait::async_trait;
use futures::future::BoxFuture;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisitError {
    #[error("Invalid glob pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        source: globset::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("{path} is not inside {root}")]
    OutsideRoot { path: String, root: String },
}

impl VisitError {
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> VisitError + '_ {
        move |source| VisitError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descend {
    Continue,
    SkipSubtree,
}

#[async_trait]
pub trait TreeVisitor: Send {
    type Error: From<VisitError> + Send;

    async fn pre_visit_directory(&mut self, dir: &Path, depth: usize) -> Result<Descend, Self::Error>;

    async fn visit_file(&mut self, file: &Path, depth: usize) -> Result<(), Self::Error>;

    /// Only called for directories whose pre-visit returned [`Descend::Continue`]
    async fn post_visit_directory(&mut self, dir: &Path, depth: usize) -> Result<(), Self::Error>;
}

/// Walk everything below `root`. Children of `root` are at depth 1; `root`
/// itself is not visited.
pub async fn walk_tree<V>(root: &Path, visitor: &mut V) -> Result<(), V::Error>
where
    V: TreeVisitor + ?Sized,
{
    walk_children(root, 1, visitor).await
}

fn walk_children<'a, V>(
    dir: &'a Path,
    depth: usize,
    visitor: &'a mut V,
) -> BoxFuture<'a, Result<(), V::Error>>
where
    V: TreeVisitor + ?Sized,
{
    Box::pin(async move {
        for (path, is_dir) in sorted_entries(dir).await? {
            if is_dir {
                if visitor.pre_visit_directory(&path, depth).await? == Descend::Continue {
                    walk_children(&path, depth + 1, visitor).await?;
                    visitor.post_visit_directory(&path, depth).await?;
                }
            } else {
                visitor.visit_file(&path, depth).await?;
            }
        }
        Ok(())
    })
}

/// Directory entries sorted by name. Symlinks count as files.
async fn sorted_entries(dir: &Path) -> Result<Vec<(PathBuf, bool)>, VisitError> {
    let mut reader = tokio::fs::read_dir(dir).await.map_err(VisitError::io(dir))?;
    let mut entries = Vec::new();

    while let Some(entry) = reader.next_entry().await.map_err(VisitError::io(dir))? {
        let file_type = entry.file_type().await.map_err(VisitError::io(dir))?;
        entries.push((entry.path(), file_type.is_dir()));
    }

    entries.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok(entries)
}

/// Glob selection on the file name component, with optional exclusions
#[derive(Debug, Clone)]
pub struct PathMatcher {
    include: GlobSet,
    exclude: GlobSet,
}

impl PathMatcher {
    pub fn new(pattern: &str) -> Result<Self, VisitError> {
        Ok(Self {
            include: build_set(&[pattern])?,
            exclude: GlobSet::empty(),
        })
    }

    /// Everything matches
    pub fn any() -> Result<Self, VisitError> {
        Self::new("*")
    }

    pub fn excluding(mut self, patterns: &[&str]) -> Result<Self, VisitError> {
        self.exclude = build_set(patterns)?;
        Ok(self)
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.exclude.is_match(name))
            .unwrap_or(false)
    }

    pub fn is_match(&self, path: &Path) -> bool {
        match path.file_name() {
            Some(name) => self.include.is_match(name) && !self.exclude.is_match(name),
            None => false,
        }
    }
}

fn build_set(patterns: &[&str]) -> Result<GlobSet, VisitError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| VisitError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| VisitError::Pattern {
        pattern: patterns.join(","),
        source,
    })
}

/// Remembers the depth of the outermost matched directory currently being
/// walked. Everything at or below that depth is selected until the walk
/// leaves the directory again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchWindow {
    level: Option<usize>,
}

impl MatchWindow {
    pub fn open(&mut self, depth: usize) {
        if self.level.is_none() {
            self.level = Some(depth);
        }
    }

    pub fn covers(&self, depth: usize) -> bool {
        self.level.is_some_and(|level| depth >= level)
    }

    pub fn close(&mut self, depth: usize) {
        if self.level == Some(depth) {
            self.level = None;
        }
    }

    pub fn is_open(&self) -> bool {
        self.level.is_some()
    }
}

/// `path` relative to `root`, or an error if it lies elsewhere
pub fn relative_to<'a>(path: &'a Path, root: &Path) -> Result<&'a Path, VisitError> {
    path.strip_prefix(root).map_err(|_| VisitError::OutsideRoot {
        path: path.display().to_string(),
        root: root.display().to_string(),
    })
}

pub async fn ensure_parent(path: &Path) -> Result<(), VisitError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(VisitError::io(parent))?;
        }
    }
    Ok(())
}

/// Byte-for-byte copy, replacing whatever file is at `target`
pub async fn copy_file(source: &Path, target: &Path) -> Result<u64, VisitError> {
    ensure_parent(target).await?;
    tokio::fs::copy(source, target)
        .await
        .map_err(VisitError::io(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    #[async_trait]
    impl TreeVisitor for Recorder {
        type Error = VisitError;

        async fn pre_visit_directory(&mut self, dir: &Path, depth: usize) -> Result<Descend, VisitError> {
            let name = dir.file_name().unwrap().to_string_lossy().to_string();
            self.events.push(format!("pre {name} {depth}"));
            if name == "skipped" {
                return Ok(Descend::SkipSubtree);
            }
            Ok(Descend::Continue)
        }

        async fn visit_file(&mut self, file: &Path, depth: usize) -> Result<(), VisitError> {
            let name = file.file_name().unwrap().to_string_lossy().to_string();
            self.events.push(format!("file {name} {depth}"));
            Ok(())
        }

        async fn post_visit_directory(&mut self, dir: &Path, depth: usize) -> Result<(), VisitError> {
            let name = dir.file_name().unwrap().to_string_lossy().to_string();
            self.events.push(format!("post {name} {depth}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_walk_order_and_depths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("a/b")).unwrap();
        std::fs::create_dir_all(root.join("skipped")).unwrap();
        std::fs::write(root.join("a/b/leaf.txt"), "x").unwrap();
        std::fs::write(root.join("skipped/hidden.txt"), "x").unwrap();
        std::fs::write(root.join("top.txt"), "x").unwrap();

        let mut recorder = Recorder::default();
        walk_tree(root, &mut recorder).await.unwrap();

        assert_eq!(
            recorder.events,
            vec![
                "pre a 1",
                "pre b 2",
                "file leaf.txt 3",
                "post b 2",
                "post a 1",
                "pre skipped 1",
                "file top.txt 1",
            ]
        );
    }

    #[test]
    fn test_matcher_on_file_name() {
        let matcher = PathMatcher::new("*.del").unwrap();
        assert!(matcher.is_match(Path::new("/m/etc/app.conf.del")));
        assert!(!matcher.is_match(Path::new("/m/etc.del/app.conf")));
    }

    #[test]
    fn test_matcher_exclusions() {
        let matcher = PathMatcher::any()
            .unwrap()
            .excluding(&["*.hook", "*.del"])
            .unwrap();
        assert!(matcher.is_match(Path::new("app.conf")));
        assert!(!matcher.is_match(Path::new("app.conf.hook")));
        assert!(matcher.is_excluded(Path::new("old.del")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            PathMatcher::new("[unclosed"),
            Err(VisitError::Pattern { .. })
        ));
    }

    #[test]
    fn test_match_window() {
        let mut window = MatchWindow::default();
        assert!(!window.covers(1));

        window.open(2);
        window.open(3);
        assert!(window.covers(2));
        assert!(window.covers(4));
        assert!(!window.covers(1));

        window.close(3);
        assert!(window.is_open());
        window.close(2);
        assert!(!window.is_open());
    }
}
