use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rustle_provision::command::{RecordingCommand, SystemCommand, UnixCommand};
use rustle_provision::config::secrets::KEY_ENV_VAR;
use rustle_provision::config::{ConfigLoader, OpensslDecryptor, SecretResolver, TerminalKeyPrompt};
use rustle_provision::install::ModuleInstaller;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[derive(Parser)]
#[command(name = "rustle-provision")]
#[command(about = "Install configuration modules onto this host")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct RustleProvisionCli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Install a module directory onto the target root
    Install(InstallArgs),
}

#[derive(Args)]
struct InstallArgs {
    /// Module directory to install
    module: PathBuf,

    /// YAML configuration with properties, dependencies and environments
    #[arg(short, long)]
    config: PathBuf,

    /// Directory receiving backups and run logs
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Install under this directory instead of /
    #[arg(long)]
    target_root: Option<PathBuf>,

    /// Property override, repeatable
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// File holding the key for ENC: property values
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Log hook commands instead of running them
    #[arg(long)]
    skip_commands: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = RustleProvisionCli::parse();

    match cli.command {
        Command::Install(args) => run_install(args, cli.verbose).await,
    }
}

async fn run_install(args: InstallArgs, verbose: bool) -> Result<()> {
    let module = tokio::fs::canonicalize(&args.module)
        .await
        .with_context(|| format!("Module directory {} not found", args.module.display()))?;

    let mut loader = ConfigLoader::new(&args.config, &module).overrides_from_args(&args.overrides)?;
    if let Some(workspace) = &args.workspace {
        loader = loader.workspace(workspace);
    }
    if let Some(target_root) = &args.target_root {
        loader = loader.target_root(target_root);
    }

    let layout = loader.layout();
    init_logging(&layout.log_file, verbose)?;
    info!("Starting rustle-provision v{}", env!("CARGO_PKG_VERSION"));
    info!("Run log: {}", layout.log_file.display());

    let mut secrets = SecretResolver::new(
        Box::new(OpensslDecryptor::new()),
        Box::new(TerminalKeyPrompt),
    );
    if let Some(key) = read_key(args.key_file.as_deref()).await? {
        secrets = secrets.with_key(key);
    }

    let mut config = loader
        .load(&mut secrets)
        .await
        .with_context(|| format!("Failed to load configuration {}", args.config.display()))?;

    let command: Box<dyn SystemCommand> = if args.skip_commands {
        info!("Hook commands will be logged, not executed");
        Box::new(RecordingCommand::new())
    } else {
        Box::new(UnixCommand::detect())
    };

    let installer = ModuleInstaller::new(command.as_ref());
    match installer.install(&mut config).await {
        Ok(report) => {
            info!("Backups in {}", config.layout.backup_dir.display());
            println!("Installed {}: {}", module.display(), report);
            Ok(())
        }
        Err(e) => {
            error!("Installation failed: {}", e);
            Err(e).with_context(|| format!("Failed to install module {}", module.display()))
        }
    }
}

/// Log to stderr and to the run's log file
fn init_logging(log_file: &Path, verbose: bool) -> Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = File::create(log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(std::io::stderr.and(Arc::new(file)))
        .init();
    Ok(())
}

/// Key from `--key-file`, else from the environment
async fn read_key(key_file: Option<&Path>) -> Result<Option<String>> {
    if let Some(path) = key_file {
        let key = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read key file {}", path.display()))?;
        return Ok(Some(key.trim_end().to_string()));
    }
    Ok(std::env::var(KEY_ENV_VAR).ok().filter(|key| !key.is_empty()))
}
