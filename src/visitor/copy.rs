//! Glob-selective tree copy

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{
    copy_file, relative_to, walk_tree, Descend, MatchWindow, PathMatcher, TreeVisitor, VisitError,
};

/// Where a copied entry lands and how it is written
#[async_trait]
pub trait CopyStep: Send {
    type Error: From<VisitError> + Send;

    fn target_of(&self, source: &Path) -> Result<PathBuf, Self::Error>;

    /// Prepare the target directory before its contents are visited
    async fn enter_directory(&mut self, source: &Path, target: &Path) -> Result<Descend, Self::Error>;

    fn must_copy(&self, _source: &Path, matched: bool) -> bool {
        matched
    }

    async fn copy_file(&mut self, source: &Path, target: &Path) -> Result<(), Self::Error>;
}

/// Copies a directory tree into another root, keeping relative paths
#[derive(Debug, Clone)]
pub struct MirrorStep {
    source_root: PathBuf,
    target_root: PathBuf,
}

impl MirrorStep {
    pub fn new(source_root: impl Into<PathBuf>, target_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            target_root: target_root.into(),
        }
    }
}

#[async_trait]
impl CopyStep for MirrorStep {
    type Error = VisitError;

    fn target_of(&self, source: &Path) -> Result<PathBuf, VisitError> {
        Ok(self.target_root.join(relative_to(source, &self.source_root)?))
    }

    async fn enter_directory(&mut self, _source: &Path, target: &Path) -> Result<Descend, VisitError> {
        tokio::fs::create_dir_all(target)
            .await
            .map_err(VisitError::io(target))?;
        Ok(Descend::Continue)
    }

    async fn copy_file(&mut self, source: &Path, target: &Path) -> Result<(), VisitError> {
        copy_file(source, target).await?;
        Ok(())
    }
}

/// Copies files selected by the matcher. Every visited directory is handed to
/// [`CopyStep::enter_directory`]; a matched directory selects its whole
/// subtree. Excluded entries are skipped together with their subtrees.
pub struct CopyVisitor<S> {
    matcher: PathMatcher,
    window: MatchWindow,
    step: S,
    copied: usize,
}

impl<S: CopyStep> CopyVisitor<S> {
    pub fn new(matcher: PathMatcher, step: S) -> Self {
        Self {
            matcher,
            window: MatchWindow::default(),
            step,
            copied: 0,
        }
    }

    pub fn copied(&self) -> usize {
        self.copied
    }

    pub fn step(&self) -> &S {
        &self.step
    }

    pub fn into_step(self) -> S {
        self.step
    }
}

#[async_trait]
impl<S: CopyStep> TreeVisitor for CopyVisitor<S> {
    type Error = S::Error;

    async fn pre_visit_directory(&mut self, dir: &Path, depth: usize) -> Result<Descend, S::Error> {
        if self.matcher.is_excluded(dir) {
            debug!("Not descending into excluded {}", dir.display());
            return Ok(Descend::SkipSubtree);
        }

        let target = self.step.target_of(dir)?;
        let descend = self.step.enter_directory(dir, &target).await?;
        if descend == Descend::Continue && self.matcher.is_match(dir) {
            self.window.open(depth);
        }
        Ok(descend)
    }

    async fn visit_file(&mut self, file: &Path, depth: usize) -> Result<(), S::Error> {
        if self.matcher.is_excluded(file) {
            return Ok(());
        }

        let matched = self.window.covers(depth) || self.matcher.is_match(file);
        if !self.step.must_copy(file, matched) {
            debug!("Skipping unmatched {}", file.display());
            return Ok(());
        }

        let target = self.step.target_of(file)?;
        self.step.copy_file(file, &target).await?;
        self.copied += 1;
        Ok(())
    }

    async fn post_visit_directory(&mut self, _dir: &Path, depth: usize) -> Result<(), S::Error> {
        self.window.close(depth);
        Ok(())
    }
}

/// Copy the entries of `source` selected by `pattern` into `target`.
/// Returns the number of files copied.
pub async fn copy_tree(source: &Path, target: &Path, pattern: &str) -> Result<usize, VisitError> {
    tokio::fs::create_dir_all(target)
        .await
        .map_err(VisitError::io(target))?;

    let mut visitor = CopyVisitor::new(PathMatcher::new(pattern)?, MirrorStep::new(source, target));
    walk_tree(source, &mut visitor).await?;
    Ok(visitor.copied())
}
