//! Module installation: delete phase, then copy phase, inside the module hook

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::backup::BackupManager;
use super::entry::{EntryKind, DELETE_SUFFIX, HOOK_SUFFIX, TEMPLATE_SUFFIX};
use super::error::InstallError;
use super::paths::PathResolver;
use crate::command::SystemCommand;
use crate::config::Configuration;
use crate::hooks::{hook_path_for, Action, Hook, HookContext, HookScope};
use crate::template::{self, TemplateRenderer};
use crate::visitor::{
    copy_file, ensure_parent, walk_tree, CopyStep, CopyVisitor, DeleteStep, DeleteVisitor,
    Descend, PathMatcher,
};

/// What one run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub deleted: usize,
    pub copied: usize,
    pub rendered: usize,
    pub skipped: usize,
    pub backed_up: usize,
}

impl fmt::Display for InstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} deleted, {} copied, {} rendered, {} skipped, {} backed up",
            self.deleted, self.copied, self.rendered, self.skipped, self.backed_up
        )
    }
}

/// Installs modules through the given command collaborator
pub struct ModuleInstaller<'c> {
    command: &'c dyn SystemCommand,
}

impl<'c> ModuleInstaller<'c> {
    pub fn new(command: &'c dyn SystemCommand) -> Self {
        Self { command }
    }

    /// Full installation of `config.module_root` onto `config.target_root`.
    ///
    /// Every deletion completes before the first copy. Temporary properties
    /// set by the module hook are gone again when this returns, whatever the
    /// outcome.
    pub async fn install(&self, config: &mut Configuration) -> Result<InstallReport, InstallError> {
        info!(
            "Installing module {} onto {}",
            config.module_root.display(),
            config.target_root.display()
        );

        let mut run = InstallRun::new(config, self.command)?;
        let module_root = run.config.module_root.clone();
        let mut hook = Hook::new(
            HookScope::Module,
            hook_path_for(&module_root),
            &module_root,
            &run.config.target_root,
        );

        let result = run.install_module(&mut hook).await;
        hook.finish(&mut run.config.properties);

        let report = result?;
        info!("Module {} installed: {}", module_root.display(), report);
        Ok(report)
    }

    /// Delete phase on its own, without the module hook
    pub async fn delete_phase(&self, config: &mut Configuration) -> Result<InstallReport, InstallError> {
        let mut run = InstallRun::new(config, self.command)?;
        run.delete_phase().await?;
        Ok(run.report)
    }

    /// Copy phase on its own, without the module hook
    pub async fn copy_phase(&self, config: &mut Configuration) -> Result<InstallReport, InstallError> {
        let mut run = InstallRun::new(config, self.command)?;
        run.copy_phase().await?;
        Ok(run.report)
    }
}

/// State of one installation run
struct InstallRun<'a> {
    config: &'a mut Configuration,
    command: &'a dyn SystemCommand,
    renderer: Box<dyn TemplateRenderer>,
    paths: PathResolver,
    backups: BackupManager,
    report: InstallReport,
}

impl<'a> InstallRun<'a> {
    fn new(config: &'a mut Configuration, command: &'a dyn SystemCommand) -> Result<Self, InstallError> {
        let renderer = template::engine_by_name(&config.template_engine).ok_or_else(|| {
            InstallError::UnknownEngine {
                name: config.template_engine.clone(),
            }
        })?;
        let paths = PathResolver::new(&config.module_root, &config.target_root);
        let backups = BackupManager::new(&config.layout.backup_dir, &config.target_root);

        Ok(Self {
            config,
            command,
            renderer,
            paths,
            backups,
            report: InstallReport::default(),
        })
    }

    fn hook_context(&mut self) -> HookContext<'_> {
        HookContext {
            properties: &mut self.config.properties,
            command: self.command,
            dependencies: &self.config.dependencies,
        }
    }

    async fn install_module(&mut self, hook: &mut Hook) -> Result<InstallReport, InstallError> {
        let module_root = self.config.module_root.clone();

        let action = hook
            .pre(&mut self.hook_context())
            .await
            .map_err(InstallError::hook(&module_root))?;
        // pre already rejects skip for a module hook
        if action == Action::Cancel {
            warn!("Module hook cancelled installation of {}", module_root.display());
            return Err(InstallError::Cancelled {
                path: module_root.display().to_string(),
            });
        }

        self.delete_phase().await?;
        self.copy_phase().await?;

        hook.post(&mut self.hook_context())
            .await
            .map_err(InstallError::hook(&module_root))?;
        Ok(self.report)
    }

    async fn delete_phase(&mut self) -> Result<(), InstallError> {
        let root = self.config.module_root.clone();
        debug!("Delete phase over {}", root.display());

        let matcher = PathMatcher::new(&format!("*{DELETE_SUFFIX}"))?;
        let mut visitor = DeleteVisitor::new(matcher, DeletePhase { run: self });
        walk_tree(&root, &mut visitor).await
    }

    async fn copy_phase(&mut self) -> Result<(), InstallError> {
        let root = self.config.module_root.clone();
        debug!("Copy phase over {}", root.display());

        let hooks = format!("*{HOOK_SUFFIX}");
        let markers = format!("*{DELETE_SUFFIX}");
        let matcher = PathMatcher::any()?.excluding(&[hooks.as_str(), markers.as_str()])?;
        let mut visitor = CopyVisitor::new(matcher, CopyPhase { run: self });
        walk_tree(&root, &mut visitor).await
    }

    /// Remove the target named by a delete marker, inside the marker's hook
    async fn delete_entry(&mut self, entry: &Path) -> Result<(), InstallError> {
        let target = self
            .paths
            .strip_suffix(entry, DELETE_SUFFIX, &self.config.properties)?;
        let mut hook = Hook::new(HookScope::File, hook_path_for(entry), entry, &target);

        let result = self.delete_target(&mut hook, entry, &target).await;
        hook.finish(&mut self.config.properties);
        result
    }

    async fn delete_target(&mut self, hook: &mut Hook, entry: &Path, target: &Path) -> Result<(), InstallError> {
        let action = hook
            .pre(&mut self.hook_context())
            .await
            .map_err(InstallError::hook(entry))?;
        if !self.proceed(action, entry)? {
            return Ok(());
        }

        let metadata = match tokio::fs::symlink_metadata(target).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("{} does not exist, nothing to delete", target.display());
                return Ok(());
            }
            Err(e) => return Err(InstallError::io(target)(e)),
        };

        self.backup(target).await?;
        info!("Deleting {}", target.display());
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(target)
                .await
                .map_err(InstallError::io(target))?;
        } else {
            tokio::fs::remove_file(target)
                .await
                .map_err(InstallError::io(target))?;
        }
        self.report.deleted += 1;

        hook.post(&mut self.hook_context())
            .await
            .map_err(InstallError::hook(entry))
    }

    /// Create the target directory for a module directory, inside its hook
    async fn enter_directory(&mut self, source: &Path, target: &Path) -> Result<Descend, InstallError> {
        let mut hook = Hook::new(HookScope::File, hook_path_for(source), source, target);

        let result = self.create_directory(&mut hook, source, target).await;
        hook.finish(&mut self.config.properties);
        result
    }

    async fn create_directory(&mut self, hook: &mut Hook, source: &Path, target: &Path) -> Result<Descend, InstallError> {
        let action = hook
            .pre(&mut self.hook_context())
            .await
            .map_err(InstallError::hook(source))?;
        if !self.proceed(action, source)? {
            return Ok(Descend::SkipSubtree);
        }

        check_kind(source, target, true).await?;
        tokio::fs::create_dir_all(target)
            .await
            .map_err(InstallError::io(target))?;

        hook.post(&mut self.hook_context())
            .await
            .map_err(InstallError::hook(source))?;
        Ok(Descend::Continue)
    }

    /// Copy or render one module file, inside its hook
    async fn install_file(&mut self, source: &Path, target: &Path) -> Result<(), InstallError> {
        let mut hook = Hook::new(HookScope::File, hook_path_for(source), source, target);

        let result = self.write_file(&mut hook, source, target).await;
        hook.finish(&mut self.config.properties);
        result
    }

    async fn write_file(&mut self, hook: &mut Hook, source: &Path, target: &Path) -> Result<(), InstallError> {
        let action = hook
            .pre(&mut self.hook_context())
            .await
            .map_err(InstallError::hook(source))?;
        if !self.proceed(action, source)? {
            return Ok(());
        }

        check_kind(source, target, false).await?;
        self.backup(target).await?;

        if EntryKind::classify(source) == EntryKind::Template {
            let template = tokio::fs::read_to_string(source)
                .await
                .map_err(InstallError::io(source))?;
            let mut bindings = self.config.properties.snapshot();
            bindings.extend(hook.bindings().clone());

            let rendered = self
                .renderer
                .render(&template, &bindings)
                .map_err(|source_err| InstallError::Render {
                    path: source.display().to_string(),
                    source: source_err,
                })?;
            ensure_parent(target).await?;
            tokio::fs::write(target, rendered)
                .await
                .map_err(InstallError::io(target))?;
            info!("Rendered {} -> {}", source.display(), target.display());
            self.report.rendered += 1;
        } else {
            copy_file(source, target).await?;
            info!("Copied {} -> {}", source.display(), target.display());
            self.report.copied += 1;
        }

        hook.post(&mut self.hook_context())
            .await
            .map_err(InstallError::hook(source))
    }

    /// Whether to act on an entry after its hook's pre phase
    fn proceed(&mut self, action: Action, entry: &Path) -> Result<bool, InstallError> {
        match action {
            Action::Continue => Ok(true),
            Action::Skip => {
                info!("Hook skipped {}", entry.display());
                self.report.skipped += 1;
                Ok(false)
            }
            Action::Cancel => {
                warn!("Hook cancelled installation at {}", entry.display());
                Err(InstallError::Cancelled {
                    path: entry.display().to_string(),
                })
            }
        }
    }

    async fn backup(&mut self, target: &Path) -> Result<(), InstallError> {
        if self.backups.backup(target).await?.is_some() {
            self.report.backed_up += 1;
        }
        Ok(())
    }
}

/// Fail when `target` exists but is not the kind of entry `source` installs
async fn check_kind(source: &Path, target: &Path, expect_dir: bool) -> Result<(), InstallError> {
    let metadata = match tokio::fs::metadata(target).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(InstallError::io(target)(e)),
    };

    if metadata.is_dir() == expect_dir {
        return Ok(());
    }
    let kind = |is_dir: bool| if is_dir { "directory" } else { "file" };
    Err(InstallError::TargetKindMismatch {
        target: target.display().to_string(),
        source_path: source.display().to_string(),
        expected: kind(expect_dir),
        found: kind(metadata.is_dir()),
    })
}

struct DeletePhase<'r, 'a> {
    run: &'r mut InstallRun<'a>,
}

#[async_trait]
impl<'r, 'a> DeleteStep for DeletePhase<'r, 'a> {
    type Error = InstallError;

    /// Only delete markers themselves; the contents of a marked directory
    /// go with its target
    fn must_delete(&self, path: &Path, matched: bool) -> bool {
        matched && EntryKind::classify(path) == EntryKind::DeleteMarker
    }

    async fn delete(&mut self, path: &Path, _is_dir: bool) -> Result<(), InstallError> {
        self.run.delete_entry(path).await
    }
}

struct CopyPhase<'r, 'a> {
    run: &'r mut InstallRun<'a>,
}

#[async_trait]
impl<'r, 'a> CopyStep for CopyPhase<'r, 'a> {
    type Error = InstallError;

    fn target_of(&self, source: &Path) -> Result<PathBuf, InstallError> {
        let properties = &self.run.config.properties;
        let target = match EntryKind::classify(source) {
            EntryKind::Template => self.run.paths.strip_suffix(source, TEMPLATE_SUFFIX, properties)?,
            _ => self.run.paths.target_of(source, properties)?,
        };
        Ok(target)
    }

    async fn enter_directory(&mut self, source: &Path, target: &Path) -> Result<Descend, InstallError> {
        self.run.enter_directory(source, target).await
    }

    async fn copy_file(&mut self, source: &Path, target: &Path) -> Result<(), InstallError> {
        self.run.install_file(source, target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RecordingCommand;
    use crate::config::RunLayout;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    struct Fixture {
        temp_dir: TempDir,
        module: PathBuf,
        target: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let module = temp_dir.path().join("modules/web");
            let target = temp_dir.path().join("root");
            std::fs::create_dir_all(&module).unwrap();
            std::fs::create_dir_all(&target).unwrap();
            Self {
                temp_dir,
                module,
                target,
            }
        }

        fn module_file(&self, rel: &str, content: &str) {
            write(&self.module, rel, content);
        }

        fn target_file(&self, rel: &str, content: &str) {
            write(&self.target, rel, content);
        }

        fn config(&self) -> Configuration {
            let now = Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
            let layout = RunLayout::new(
                &self.temp_dir.path().join("workspace"),
                &self.module,
                Path::new("site.yml"),
                now,
            );
            Configuration::new(&self.module, &self.target, layout)
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_delete_then_copy() {
        let fixture = Fixture::new();
        fixture.module_file("f.txt", "fresh");
        fixture.module_file("dir1/f1.txt.del", "");
        fixture.target_file("dir1/f1.txt", "stale");

        let command = RecordingCommand::new();
        let mut config = fixture.config();
        let report = ModuleInstaller::new(&command)
            .install(&mut config)
            .await
            .unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.copied, 1);
        assert_eq!(report.backed_up, 1);
        assert!(!fixture.target.join("dir1/f1.txt").exists());
        assert!(fixture.target.join("dir1").is_dir());
        assert_eq!(
            std::fs::read_to_string(fixture.target.join("f.txt")).unwrap(),
            "fresh"
        );
        assert_eq!(
            std::fs::read_to_string(config.layout.backup_dir.join("dir1/f1.txt")).unwrap(),
            "stale"
        );
    }

    #[tokio::test]
    async fn test_template_rendered_with_properties() {
        let fixture = Fixture::new();
        fixture.module_file("etc/app.conf.tmpl", "port={{app.port}} env={{environment}}");

        let command = RecordingCommand::new();
        let mut config = fixture.config();
        config.properties.set("app.port", "8080");
        let report = ModuleInstaller::new(&command)
            .install(&mut config)
            .await
            .unwrap();

        assert_eq!(report.rendered, 1);
        assert_eq!(
            std::fs::read_to_string(fixture.target.join("etc/app.conf")).unwrap(),
            "port=8080 env=development"
        );
        assert!(!fixture.target.join("etc/app.conf.tmpl").exists());
    }

    #[tokio::test]
    async fn test_hook_files_never_installed() {
        let fixture = Fixture::new();
        fixture.module_file("a.txt", "a");
        fixture.module_file("a.txt.hook", "pre:\n  - log: installing a\n");

        let command = RecordingCommand::new();
        let mut config = fixture.config();
        ModuleInstaller::new(&command)
            .install(&mut config)
            .await
            .unwrap();

        assert!(fixture.target.join("a.txt").exists());
        assert!(!fixture.target.join("a.txt.hook").exists());
    }

    #[tokio::test]
    async fn test_file_hook_skip() {
        let fixture = Fixture::new();
        fixture.module_file("a.txt", "new");
        fixture.module_file("a.txt.hook", "pre:\n  - action: skip\n");
        fixture.target_file("a.txt", "old");

        let command = RecordingCommand::new();
        let mut config = fixture.config();
        let report = ModuleInstaller::new(&command)
            .install(&mut config)
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.backed_up, 0);
        assert_eq!(
            std::fs::read_to_string(fixture.target.join("a.txt")).unwrap(),
            "old"
        );
    }

    #[tokio::test]
    async fn test_module_hook_cancel_aborts() {
        let fixture = Fixture::new();
        fixture.module_file("a.txt", "new");
        std::fs::write(
            fixture.temp_dir.path().join("modules/web.hook"),
            "pre:\n  - set_temp: { x: y }\n  - action: cancel\n",
        )
        .unwrap();

        let command = RecordingCommand::new();
        let mut config = fixture.config();
        let err = ModuleInstaller::new(&command)
            .install(&mut config)
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Cancelled { .. }));
        assert!(!fixture.target.join("a.txt").exists());
        assert!(!config.properties.contains("x"));
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_fatal() {
        let fixture = Fixture::new();
        fixture.module_file("conf/app.conf", "x");
        fixture.target_file("conf", "a file where a directory belongs");

        let command = RecordingCommand::new();
        let mut config = fixture.config();
        let err = ModuleInstaller::new(&command)
            .install(&mut config)
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::TargetKindMismatch { .. }));
    }

    #[tokio::test]
    async fn test_unknown_engine() {
        let fixture = Fixture::new();
        let command = RecordingCommand::new();
        let mut config = fixture.config().with_template_engine("jinja");

        let err = ModuleInstaller::new(&command)
            .install(&mut config)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::UnknownEngine { .. }));
    }
}
