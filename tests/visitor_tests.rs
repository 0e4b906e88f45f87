//! Glob-selective copy, delete and move over real directory trees

mod common;

use common::{assert_absent, assert_file_content, write};
use rustle_provision::visitor::{copy_tree, delete_tree, move_tree};
use tempfile::TempDir;

#[tokio::test]
async fn test_marked_directory_deleted_with_contents() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "dir.del/a.txt", "a");
    write(root, "dir.del/sub/b.txt", "b");
    write(root, "keep/keep.txt", "keep");

    let deleted = delete_tree(root, "*.del").await.unwrap();

    assert_eq!(deleted, 4);
    assert_absent(&root.join("dir.del"));
    assert_file_content(&root.join("keep/keep.txt"), "keep");
}

#[tokio::test]
async fn test_delete_window_closes_after_matched_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "a/x.del/inner.txt", "i");
    write(root, "a/after.txt", "after");
    write(root, "b/stale.del", "s");
    write(root, "b/fresh.txt", "f");

    let deleted = delete_tree(root, "*.del").await.unwrap();

    assert_eq!(deleted, 3);
    assert_absent(&root.join("a/x.del"));
    assert_absent(&root.join("b/stale.del"));
    assert_file_content(&root.join("a/after.txt"), "after");
    assert_file_content(&root.join("b/fresh.txt"), "f");
}

#[tokio::test]
async fn test_copy_selects_matching_entries_only() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("source");
    let target = temp_dir.path().join("target");
    write(&source, "one_TO_COPY.txt", "1");
    write(&source, "two.txt", "2");
    write(&source, "sub_TO_COPY/three.txt", "3");
    write(&source, "other/four.txt", "4");
    write(&source, "other/five_TO_COPY.txt", "5");

    let copied = copy_tree(&source, &target, "*TO_COPY*").await.unwrap();

    assert_eq!(copied, 3);
    assert_file_content(&target.join("one_TO_COPY.txt"), "1");
    assert_file_content(&target.join("sub_TO_COPY/three.txt"), "3");
    assert_file_content(&target.join("other/five_TO_COPY.txt"), "5");
    assert_absent(&target.join("two.txt"));
    assert_absent(&target.join("other/four.txt"));
    assert!(target.join("other").is_dir());
}

#[tokio::test]
async fn test_copy_overwrites_and_creates_intermediate_directories() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("source");
    let target = temp_dir.path().join("target");
    write(&source, "a/b/c/deep.txt", "new");
    write(&target, "a/b/c/deep.txt", "old");

    copy_tree(&source, &target, "*").await.unwrap();

    assert_file_content(&target.join("a/b/c/deep.txt"), "new");
}

#[tokio::test]
async fn test_move_removes_emptied_sources() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("source");
    let target = temp_dir.path().join("target");
    write(&source, "logs_MOVE/a.log", "a");
    write(&source, "logs_MOVE/nested/b.log", "b");
    write(&source, "mixed/c_MOVE.txt", "c");
    write(&source, "mixed/d.txt", "d");

    let moved = move_tree(&source, &target, "*MOVE*").await.unwrap();

    assert_eq!(moved, 3);
    assert_file_content(&target.join("logs_MOVE/nested/b.log"), "b");
    assert_file_content(&target.join("mixed/c_MOVE.txt"), "c");
    assert_absent(&source.join("logs_MOVE"));
    assert_absent(&source.join("mixed/c_MOVE.txt"));
    assert_file_content(&source.join("mixed/d.txt"), "d");
}
