//! Glob-selective tree move

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{
    copy_file, relative_to, walk_tree, Descend, MatchWindow, PathMatcher, TreeVisitor, VisitError,
};

/// Like [`super::CopyVisitor`] with a mirror step, but each moved file's
/// source is removed afterwards and source directories emptied by the move
/// are removed on the way back up.
pub struct MoveVisitor {
    matcher: PathMatcher,
    window: MatchWindow,
    source_root: PathBuf,
    target_root: PathBuf,
    // one flag per open directory: did anything leave it
    emptied: Vec<bool>,
    moved: usize,
}

impl MoveVisitor {
    pub fn new(matcher: PathMatcher, source_root: impl Into<PathBuf>, target_root: impl Into<PathBuf>) -> Self {
        Self {
            matcher,
            window: MatchWindow::default(),
            source_root: source_root.into(),
            target_root: target_root.into(),
            emptied: Vec::new(),
            moved: 0,
        }
    }

    pub fn moved(&self) -> usize {
        self.moved
    }

    fn target_of(&self, source: &Path) -> Result<PathBuf, VisitError> {
        Ok(self.target_root.join(relative_to(source, &self.source_root)?))
    }

    fn mark_parent(&mut self) {
        if let Some(flag) = self.emptied.last_mut() {
            *flag = true;
        }
    }
}

#[async_trait]
impl TreeVisitor for MoveVisitor {
    type Error = VisitError;

    async fn pre_visit_directory(&mut self, dir: &Path, depth: usize) -> Result<Descend, VisitError> {
        let target = self.target_of(dir)?;
        tokio::fs::create_dir_all(&target)
            .await
            .map_err(VisitError::io(&target))?;

        if self.matcher.is_match(dir) {
            self.window.open(depth);
        }
        self.emptied.push(false);
        Ok(Descend::Continue)
    }

    async fn visit_file(&mut self, file: &Path, depth: usize) -> Result<(), VisitError> {
        let matched = self.window.covers(depth) || self.matcher.is_match(file);
        if !matched {
            return Ok(());
        }

        let target = self.target_of(file)?;
        copy_file(file, &target).await?;
        tokio::fs::remove_file(file)
            .await
            .map_err(VisitError::io(file))?;
        debug!("Moved {} -> {}", file.display(), target.display());

        self.moved += 1;
        self.mark_parent();
        Ok(())
    }

    async fn post_visit_directory(&mut self, dir: &Path, depth: usize) -> Result<(), VisitError> {
        let lost_entries = self.emptied.pop().unwrap_or(false);
        let selected = self.window.covers(depth);
        self.window.close(depth);

        if !(lost_entries || selected) {
            return Ok(());
        }

        let mut reader = tokio::fs::read_dir(dir).await.map_err(VisitError::io(dir))?;
        let is_empty = reader
            .next_entry()
            .await
            .map_err(VisitError::io(dir))?
            .is_none();
        if is_empty {
            tokio::fs::remove_dir(dir).await.map_err(VisitError::io(dir))?;
            self.mark_parent();
        }
        Ok(())
    }
}

/// Move the entries of `source` selected by `pattern` into `target`.
/// Returns the number of files moved.
pub async fn move_tree(source: &Path, target: &Path, pattern: &str) -> Result<usize, VisitError> {
    tokio::fs::create_dir_all(target)
        .await
        .map_err(VisitError::io(target))?;

    let mut visitor = MoveVisitor::new(PathMatcher::new(pattern)?, source, target);
    walk_tree(source, &mut visitor).await?;
    Ok(visitor.moved())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, rel).unwrap();
    }

    #[tokio::test]
    async fn test_move_selected_entries() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("src");
        let target = temp_dir.path().join("dst");
        write(&source, "logs_MOVE/a.log");
        write(&source, "logs_MOVE/nested/b.log");
        write(&source, "stay/c.txt");
        write(&source, "stay/d_MOVE.txt");

        let moved = move_tree(&source, &target, "*MOVE*").await.unwrap();

        assert_eq!(moved, 3);
        assert_eq!(
            std::fs::read_to_string(target.join("logs_MOVE/nested/b.log")).unwrap(),
            "logs_MOVE/nested/b.log"
        );
        assert!(target.join("stay/d_MOVE.txt").exists());
        assert!(!source.join("logs_MOVE").exists());
        assert!(!source.join("stay/d_MOVE.txt").exists());
        assert!(source.join("stay/c.txt").exists());
    }

    #[tokio::test]
    async fn test_untouched_empty_directory_kept() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("src");
        let target = temp_dir.path().join("dst");
        std::fs::create_dir_all(source.join("empty")).unwrap();
        write(&source, "file_MOVE.txt");

        move_tree(&source, &target, "*MOVE*").await.unwrap();

        assert!(source.join("empty").exists());
        assert!(target.join("file_MOVE.txt").exists());
    }
}
