//! Hook lifecycle: pre, post, finish

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::action::{Action, HookScope};
use super::conditions::ConditionEvaluator;
use super::error::HookError;
use super::script::{HookOp, HookScript, HookStep, PackageState};
use crate::command::{CommandError, CommandSpec, SystemCommand};
use crate::config::{PropertyResolver, PropertyStore, TemporaryEntry};
use crate::dependencies::DependencyResolver;
use crate::template::Bindings;

pub const BINDING_SOURCE: &str = "hook.source";
pub const BINDING_TARGET: &str = "hook.target";
pub const BINDING_SCOPE: &str = "hook.scope";

/// Collaborators a hook acts through. The property store is the only state a
/// hook changes.
pub struct HookContext<'a> {
    pub properties: &'a mut PropertyStore,
    pub command: &'a dyn SystemCommand,
    pub dependencies: &'a dyn DependencyResolver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    NotEvaluated,
    PreEvaluated(Action),
    PostEvaluated,
    Finished,
}

impl HookState {
    fn describe(self) -> String {
        match self {
            HookState::NotEvaluated => "not evaluated".to_string(),
            HookState::PreEvaluated(action) => format!("pre-evaluated ({action})"),
            HookState::PostEvaluated => "post-evaluated".to_string(),
            HookState::Finished => "finished".to_string(),
        }
    }
}

/// One hook evaluation. Build a fresh instance for every module and entry;
/// an instance runs through its states exactly once.
#[derive(Debug)]
pub struct Hook {
    scope: HookScope,
    script_path: PathBuf,
    script: Option<HookScript>,
    bindings: Bindings,
    state: HookState,
    temporaries: Vec<TemporaryEntry>,
}

impl Hook {
    /// `script_path` need not exist; a missing script means "continue"
    pub fn new(scope: HookScope, script_path: impl Into<PathBuf>, source: &Path, target: &Path) -> Self {
        let mut bindings = Bindings::new();
        bindings.insert(BINDING_SOURCE.to_string(), source.display().to_string());
        bindings.insert(BINDING_TARGET.to_string(), target.display().to_string());
        bindings.insert(BINDING_SCOPE.to_string(), scope.as_str().to_string());

        Self {
            scope,
            script_path: script_path.into(),
            script: None,
            bindings,
            state: HookState::NotEvaluated,
            temporaries: Vec::new(),
        }
    }

    pub fn scope(&self) -> HookScope {
        self.scope
    }

    pub fn state(&self) -> HookState {
        self.state
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Load the script and run its pre steps. Steps run in order until one
    /// declares an action; with no action the result is [`Action::Continue`].
    pub async fn pre(&mut self, ctx: &mut HookContext<'_>) -> Result<Action, HookError> {
        if self.state != HookState::NotEvaluated {
            return Err(self.invalid_state("run pre"));
        }
        // anything set from here on is undone by finish, even on error
        self.state = HookState::PreEvaluated(Action::Continue);

        let exists = tokio::fs::try_exists(&self.script_path)
            .await
            .map_err(|source| HookError::Read {
                path: self.script_path.display().to_string(),
                source,
            })?;
        if !exists {
            debug!("No {} hook at {}", self.scope, self.script_path.display());
            return Ok(Action::Continue);
        }

        let script = HookScript::load(&self.script_path).await?;
        info!("Evaluating {} hook {}", self.scope, self.script_path.display());

        let mut action = Action::Continue;
        for step in &script.pre {
            if !self.applies(step, ctx.properties)? {
                continue;
            }
            if let HookOp::Action(declared) = step.op {
                action = declared;
                break;
            }
            self.run_step(&step.op, ctx).await?;
        }
        self.script = Some(script);

        if !action.is_allowed_in(self.scope) {
            return Err(HookError::InvalidAction {
                path: self.script_path.display().to_string(),
                action,
                scope: self.scope,
            });
        }

        debug!("Hook {} returned {}", self.script_path.display(), action);
        self.state = HookState::PreEvaluated(action);
        Ok(action)
    }

    /// Run the post steps. Only valid after pre returned continue.
    pub async fn post(&mut self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        if self.state != HookState::PreEvaluated(Action::Continue) {
            return Err(self.invalid_state("run post"));
        }
        self.state = HookState::PostEvaluated;

        let Some(script) = self.script.take() else {
            return Ok(());
        };

        let result = self.run_steps(&script.post, ctx).await;
        self.script = Some(script);
        result
    }

    /// Undo every temporary property set since pre began, newest first.
    /// Safe to call in any state; later calls do nothing.
    pub fn finish(&mut self, properties: &mut PropertyStore) {
        if self.state == HookState::Finished {
            return;
        }
        while let Some(entry) = self.temporaries.pop() {
            debug!("Clearing temporary property {}", entry.key);
            properties.restore(entry);
        }
        self.state = HookState::Finished;
    }

    async fn run_steps(&mut self, steps: &[HookStep], ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        for step in steps {
            if self.applies(step, ctx.properties)? {
                self.run_step(&step.op, ctx).await?;
            }
        }
        Ok(())
    }

    fn applies(&self, step: &HookStep, properties: &PropertyStore) -> Result<bool, HookError> {
        if step.when.is_empty() {
            return Ok(true);
        }

        let mut conditions = step.when.clone();
        for condition in &mut conditions {
            if let Some(value) = &condition.value {
                condition.value = Some(self.expand(value, properties)?);
            }
        }
        ConditionEvaluator::evaluate_conditions(&conditions, |name| self.lookup(name, properties))
    }

    fn lookup(&self, name: &str, properties: &PropertyStore) -> Option<String> {
        self.bindings
            .get(name)
            .cloned()
            .or_else(|| properties.get(name).map(str::to_string))
    }

    /// Resolve `${name}` against the bindings and properties. Unknown names are
    /// an error: a half-expanded command line must never run.
    fn expand(&self, raw: &str, properties: &PropertyStore) -> Result<String, HookError> {
        Ok(PropertyResolver::strict().resolve(raw, |name| self.lookup(name, properties))?)
    }

    fn expand_path(&self, raw: &str, properties: &PropertyStore) -> Result<PathBuf, HookError> {
        self.expand(raw, properties).map(PathBuf::from)
    }

    async fn run_step(&mut self, op: &HookOp, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        let step = op.name();
        let command_failed = |source: CommandError| HookError::Command {
            step: step.to_string(),
            source,
        };

        match op {
            HookOp::Action(_) => {}
            HookOp::Set(values) => {
                for (key, value) in values {
                    let value = self.expand(value, ctx.properties)?;
                    ctx.properties.set(key.clone(), value);
                }
            }
            HookOp::SetTemp(values) => {
                for (key, value) in values {
                    let value = self.expand(value, ctx.properties)?;
                    let entry = ctx.properties.set_temporary(key.clone(), value);
                    self.temporaries.push(entry);
                }
            }
            HookOp::Unset(keys) => {
                for key in keys {
                    ctx.properties.remove(key);
                }
            }
            HookOp::Log(message) => {
                info!("{}", self.expand(message, ctx.properties)?);
            }
            HookOp::Run(run) => {
                let line = self.expand(&run.command, ctx.properties)?;
                let mut spec = CommandSpec::from_line(&line).map_err(command_failed)?;
                for arg in &run.args {
                    spec = spec.arg(self.expand(arg, ctx.properties)?);
                }
                let mut stdin = Vec::with_capacity(run.stdin.len());
                for line in &run.stdin {
                    stdin.push(self.expand(line, ctx.properties)?);
                }
                spec = spec.stdin_lines(stdin).success_codes(run.success_codes.clone());
                if let Some(limit) = run.capture_limit {
                    spec = spec.capture_limit(limit);
                }
                ctx.command.execute(&spec).await.map_err(command_failed)?;
            }
            HookOp::Service(service) => {
                let name = self.expand(&service.name, ctx.properties)?;
                ctx.command
                    .service(&name, service.state)
                    .await
                    .map_err(command_failed)?;
            }
            HookOp::Package(package) => {
                let name = self.expand(&package.name, ctx.properties)?;
                match package.state {
                    PackageState::Present => self.install_package(&name, ctx).await?,
                    PackageState::Absent => {
                        ctx.command
                            .remove_package(&name)
                            .await
                            .map_err(command_failed)?;
                    }
                }
            }
            HookOp::User(user) => {
                let name = self.expand(&user.name, ctx.properties)?;
                let mut groups = Vec::with_capacity(user.groups.len());
                for group in &user.groups {
                    groups.push(self.expand(group, ctx.properties)?);
                }
                ctx.command
                    .create_user(&name, &groups)
                    .await
                    .map_err(command_failed)?;
            }
            HookOp::Group(group) => {
                let name = self.expand(&group.name, ctx.properties)?;
                ctx.command.create_group(&name).await.map_err(command_failed)?;
            }
            HookOp::Chmod(chmod) => {
                let path = self.expand_path(&chmod.path, ctx.properties)?;
                let mode = self.expand(&chmod.mode, ctx.properties)?;
                ctx.command.chmod(&path, &mode).await.map_err(command_failed)?;
            }
            HookOp::Chown(chown) => {
                let path = self.expand_path(&chown.path, ctx.properties)?;
                let owner = chown
                    .owner
                    .as_deref()
                    .map(|o| self.expand(o, ctx.properties))
                    .transpose()?;
                let group = chown
                    .group
                    .as_deref()
                    .map(|g| self.expand(g, ctx.properties))
                    .transpose()?;
                ctx.command
                    .chown(&path, owner.as_deref(), group.as_deref())
                    .await
                    .map_err(command_failed)?;
            }
            HookOp::Symlink(symlink) => {
                let source = self.expand_path(&symlink.source, ctx.properties)?;
                let link = self.expand_path(&symlink.link, ctx.properties)?;
                ctx.command
                    .symlink(&source, &link)
                    .await
                    .map_err(command_failed)?;
            }
            HookOp::Remove(remove) => {
                let path = self.expand_path(&remove.path, ctx.properties)?;
                remove_path(&path).await.map_err(|source| HookError::Io {
                    step: step.to_string(),
                    path: path.display().to_string(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Install from the dependency table when it knows the package, from the
    /// package repositories otherwise
    async fn install_package(&self, name: &str, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        let command_failed = |source| HookError::Command {
            step: "package".to_string(),
            source,
        };

        match ctx.dependencies.resolve(name) {
            Ok(path) => {
                ctx.command
                    .install_local_package(&path)
                    .await
                    .map_err(command_failed)?;
            }
            Err(e) if e.is_not_found() => {
                info!("{}; installing {} from package repositories", e, name);
                ctx.command
                    .install_package(name)
                    .await
                    .map_err(command_failed)?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn invalid_state(&self, operation: &'static str) -> HookError {
        HookError::InvalidState {
            path: self.script_path.display().to_string(),
            operation,
            state: self.state.describe(),
        }
    }
}

impl Drop for Hook {
    fn drop(&mut self) {
        if !self.temporaries.is_empty() {
            warn!(
                "Hook {} dropped without finish; {} temporary properties left set",
                self.script_path.display(),
                self.temporaries.len()
            );
        }
    }
}

async fn remove_path(path: &Path) -> Result<(), std::io::Error> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    info!("Removing {}", path.display());
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

/// Location of the hook script for `path`: the sibling `<name>.hook`
pub fn hook_path_for(path: &Path) -> PathBuf {
    let normalized: PathBuf = path.components().collect();
    let mut name = normalized.into_os_string();
    name.push(super::HOOK_SUFFIX);
    PathBuf::from(name)
}
