mod commands;
mod render;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use calmirror_core::{EventTransport, MirrorConfig};
use calmirror_provider_google::GoogleCalendar;
use clap::{ArgAction, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const TOKEN_ENV: &str = "CALMIRROR_GOOGLE_TOKEN";
const CONFIG_ENV: &str = "CALMIRROR_CONFIG";

#[derive(Parser)]
#[command(name = "calmirror")]
#[command(about = "Mirror events from source calendars into a target calendar")]
struct Cli {
    /// Config file (defaults to ~/.config/calmirror/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile targets with their sources and exclusions
    Mirror {
        /// Only run this mirror scope
        #[arg(short, long)]
        scope: Option<String>,

        /// Show the changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Maximum concurrent writes (overrides the config file)
        #[arg(long)]
        concurrency: Option<NonZeroUsize>,
    },
    /// Apply source changes made since the last follow run
    Follow {
        /// Only run this follow scope
        #[arg(short, long)]
        scope: Option<String>,

        /// Maximum concurrent writes (overrides the config file)
        #[arg(long)]
        concurrency: Option<NonZeroUsize>,

        /// Watermark file (overrides the config file)
        #[arg(long)]
        status_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let transport = connect()?;
    let cancel = cancel_on_ctrl_c();

    match cli.command {
        Commands::Mirror {
            scope,
            dry_run,
            concurrency,
        } => {
            let scopes = match scope {
                Some(id) => vec![config.mirror(&id)?.clone()],
                None => config.mirrors.clone(),
            };
            let concurrency = concurrency.map_or(config.concurrency, NonZeroUsize::get);
            let range = config.date_range()?;

            commands::mirror::run(transport, scopes, range, concurrency, dry_run, cancel).await
        }
        Commands::Follow {
            scope,
            concurrency,
            status_file,
        } => {
            let scopes = match scope {
                Some(id) => vec![config.follow(&id)?.clone()],
                None => config.follows.clone(),
            };
            let concurrency = concurrency.map_or(config.concurrency, NonZeroUsize::get);
            let status_path = match status_file {
                Some(path) => path,
                None => config.status_path()?,
            };

            commands::follow::run(transport, scopes, &status_path, concurrency, cancel).await
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<MirrorConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => MirrorConfig::config_path()?,
    };
    let inline_json = std::env::var(CONFIG_ENV).ok().filter(|s| !s.trim().is_empty());

    MirrorConfig::load(&path, inline_json.as_deref())
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

fn connect() -> Result<Arc<dyn EventTransport>> {
    let token = std::env::var(TOKEN_ENV)
        .with_context(|| format!("{TOKEN_ENV} must hold a Google OAuth access token"))?;

    Ok(Arc::new(GoogleCalendar::new(&token)))
}

/// Cancel outstanding work on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, waiting for in-flight writes to be handed off");
            trigger.cancel();
        }
    });

    cancel
}
