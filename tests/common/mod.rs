//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::{Local, TimeZone};
use rustle_provision::config::{Configuration, RunLayout};
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// Isolated module, target root and workspace under one temporary directory
pub struct TestEnvironment {
    temp_dir: TempDir,
    module: PathBuf,
    target: PathBuf,
    workspace: PathBuf,
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self::with_module_name("web")
    }

    pub fn with_module_name(name: &str) -> Self {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let module = temp_dir.path().join("modules").join(name);
        let target = temp_dir.path().join("root");
        let workspace = temp_dir.path().join("workspace");
        std::fs::create_dir_all(&module).expect("Failed to create module directory");
        std::fs::create_dir_all(&target).expect("Failed to create target root");

        Self {
            temp_dir,
            module,
            target,
            workspace,
        }
    }

    pub fn module(&self) -> &Path {
        &self.module
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a module entry, creating parent directories
    pub fn module_file(&self, rel: &str, content: &str) -> PathBuf {
        write(&self.module, rel, content)
    }

    pub fn module_dir(&self, rel: &str) -> PathBuf {
        let path = self.module.join(rel);
        std::fs::create_dir_all(&path).expect("Failed to create module directory");
        path
    }

    /// Hook script wrapping the whole module
    pub fn module_hook(&self, script: &str) -> PathBuf {
        let path = rustle_provision::hooks::hook_path_for(&self.module);
        std::fs::write(&path, script).expect("Failed to write module hook");
        path
    }

    /// Pre-existing host state
    pub fn target_file(&self, rel: &str, content: &str) -> PathBuf {
        write(&self.target, rel, content)
    }

    pub fn target_path(&self, rel: &str) -> PathBuf {
        self.target.join(rel)
    }

    pub fn read_target(&self, rel: &str) -> String {
        std::fs::read_to_string(self.target.join(rel)).expect("Failed to read target file")
    }

    /// Configuration with a fixed run timestamp
    pub fn config(&self) -> Configuration {
        let now = Local
            .with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
            .single()
            .expect("valid timestamp");
        let layout = RunLayout::new(&self.workspace, &self.module, Path::new("site.yml"), now);
        Configuration::new(&self.module, &self.target, layout)
    }
}

pub fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    std::fs::write(&path, content).expect("Failed to write file");
    path
}

pub fn assert_file_content(path: &Path, expected: &str) {
    let actual = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    assert_eq!(actual, expected, "unexpected content in {}", path.display());
}

pub fn assert_absent(path: &Path) {
    assert!(!path.exists(), "{} should not exist", path.display());
}
