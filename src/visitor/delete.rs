//! Glob-selective tree delete

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use super::{walk_tree, Descend, MatchWindow, PathMatcher, TreeVisitor, VisitError};

#[async_trait]
pub trait DeleteStep: Send {
    type Error: From<VisitError> + Send;

    /// `matched` is true when the entry's name matches or it lies inside a
    /// matched directory
    fn must_delete(&self, _path: &Path, matched: bool) -> bool {
        matched
    }

    async fn delete(&mut self, path: &Path, is_dir: bool) -> Result<(), Self::Error>;
}

/// Removes the visited entries themselves. Directories are removed after
/// their children, so they are empty by then.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveStep;

#[async_trait]
impl DeleteStep for RemoveStep {
    type Error = VisitError;

    async fn delete(&mut self, path: &Path, is_dir: bool) -> Result<(), VisitError> {
        if is_dir {
            tokio::fs::remove_dir(path).await.map_err(VisitError::io(path))
        } else {
            tokio::fs::remove_file(path).await.map_err(VisitError::io(path))
        }
    }
}

/// Deletes matched entries. Once a directory matches, everything beneath it
/// is selected regardless of its own name. Files are handled as they are
/// visited; directories on the way back up.
pub struct DeleteVisitor<S> {
    matcher: PathMatcher,
    window: MatchWindow,
    pending: Vec<bool>,
    step: S,
    deleted: usize,
}

impl<S: DeleteStep> DeleteVisitor<S> {
    pub fn new(matcher: PathMatcher, step: S) -> Self {
        Self {
            matcher,
            window: MatchWindow::default(),
            pending: Vec::new(),
            step,
            deleted: 0,
        }
    }

    pub fn deleted(&self) -> usize {
        self.deleted
    }

    pub fn step(&self) -> &S {
        &self.step
    }

    pub fn into_step(self) -> S {
        self.step
    }
}

#[async_trait]
impl<S: DeleteStep> TreeVisitor for DeleteVisitor<S> {
    type Error = S::Error;

    async fn pre_visit_directory(&mut self, dir: &Path, depth: usize) -> Result<Descend, S::Error> {
        let name_match = self.matcher.is_match(dir);
        if name_match {
            self.window.open(depth);
        }
        let matched = self.window.covers(depth);
        self.pending.push(self.step.must_delete(dir, matched));
        Ok(Descend::Continue)
    }

    async fn visit_file(&mut self, file: &Path, depth: usize) -> Result<(), S::Error> {
        let matched = self.window.covers(depth) || self.matcher.is_match(file);
        if !self.step.must_delete(file, matched) {
            return Ok(());
        }
        self.step.delete(file, false).await?;
        self.deleted += 1;
        Ok(())
    }

    async fn post_visit_directory(&mut self, dir: &Path, depth: usize) -> Result<(), S::Error> {
        let act = self.pending.pop().unwrap_or(false);
        self.window.close(depth);
        if act {
            debug!("Deleting directory {}", dir.display());
            self.step.delete(dir, true).await?;
            self.deleted += 1;
        }
        Ok(())
    }
}

/// Delete the entries of `root` selected by `pattern`. Returns the number of
/// files and directories removed.
pub async fn delete_tree(root: &Path, pattern: &str) -> Result<usize, VisitError> {
    let mut visitor = DeleteVisitor::new(PathMatcher::new(pattern)?, RemoveStep);
    walk_tree(root, &mut visitor).await?;
    Ok(visitor.deleted())
}
