//! Command definitions and dispatch

mod completions;
mod exists;
mod get;
mod info;
mod ls;
mod put;
mod put_dir;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use wagon_core::{Config, ConfigManager, Error, Transport};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};
use crate::progress::ProgressListener;
use crate::registry;

/// Artifact repository transports for S3 and Google Cloud Storage
#[derive(Parser, Debug)]
#[command(name = "wagon", version, about, long_about = None)]
pub struct Cli {
    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Configuration directory (default: platform config dir + /wagon)
    #[arg(long, global = true, env = "WAGON_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a resource from a repository
    Get(get::GetArgs),

    /// Upload a local file to a repository
    Put(put::PutArgs),

    /// Upload a local directory tree (copy-tool repositories only)
    #[command(name = "put-dir")]
    PutDir(put_dir::PutDirArgs),

    /// Check whether a resource exists
    Exists(exists::ExistsArgs),

    /// List the entries of a repository directory
    Ls(ls::LsArgs),

    /// Show how a repository URL resolves
    Info(info::InfoArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// State shared by the repository commands
pub struct Context {
    pub config: Config,
    pub formatter: Formatter,
}

impl Context {
    /// Transport for `repository`, reporting failures through the formatter
    pub fn transport(&self, repository: &str) -> Result<Box<dyn Transport>, ExitCode> {
        registry::transport(repository, &self.config).map_err(|e| self.fail(&e))
    }

    /// Progress listener matching the output mode
    pub fn progress(&self) -> Arc<ProgressListener> {
        if self.formatter.is_json() || self.formatter.is_quiet() {
            Arc::new(ProgressListener::hidden())
        } else {
            Arc::new(ProgressListener::new())
        }
    }

    /// Report an operation error and map it to an exit code
    pub fn fail(&self, error: &Error) -> ExitCode {
        self.formatter
            .error_with_kind(&describe_error(error), Some(error_kind(error)));
        ExitCode::from_error(error)
    }
}

/// The error message followed by its causes
pub fn describe_error(error: &Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn error_kind(error: &Error) -> &'static str {
    match error {
        Error::Config(_) => "config",
        Error::Auth { .. } => "auth",
        Error::NotFound(_) => "not_found",
        Error::Transfer { .. } => "transfer",
        Error::Unsupported(_) => "unsupported",
    }
}

fn load_config(dir: Option<&Path>) -> anyhow::Result<Config> {
    let manager = match dir {
        Some(dir) => ConfigManager::with_dir(dir),
        None => ConfigManager::new()?,
    };
    manager
        .load()
        .with_context(|| format!("Failed to load {}", manager.config_path().display()))
}

/// Execute the parsed command line
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        quiet: cli.quiet,
    };
    let formatter = Formatter::new(output_config);

    if let Commands::Completions(args) = cli.command {
        return completions::execute(args);
    }

    let config = match load_config(cli.config_dir.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::UsageError;
        }
    };
    let ctx = Context { config, formatter };

    match cli.command {
        Commands::Get(args) => get::execute(args, &ctx).await,
        Commands::Put(args) => put::execute(args, &ctx).await,
        Commands::PutDir(args) => put_dir::execute(args, &ctx).await,
        Commands::Exists(args) => exists::execute(args, &ctx).await,
        Commands::Ls(args) => ls::execute(args, &ctx).await,
        Commands::Info(args) => info::execute(args, &ctx).await,
        Commands::Completions(args) => completions::execute(args),
    }
}
