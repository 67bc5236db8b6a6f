use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use hollywool_core::config::{HollywoolConfig, SessionStoreKind};
use hollywool_core::session::SessionKind;
use hollywool_infrastructure::{ConfigService, HollywoolPaths};

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "hollywool")]
#[command(about = "HollyWool CLI - track generation jobs and their sessions", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/hollywool/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding config and HOLLYWOOL_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Keep every session list in local files
    #[arg(long, global = true)]
    local: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow live jobs and bind completed ones into their sessions
    Watch {
        /// Print one refresh and exit
        #[arg(long)]
        once: bool,
    },
    /// Manage sessions of one kind
    Sessions {
        #[arg(value_enum)]
        kind: KindArg,
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Show active and recently finished jobs across every kind
    Activity {
        #[arg(long)]
        json: bool,
    },
    /// Submit a generation job into the current session
    Submit {
        #[command(subcommand)]
        job: commands::submit::SubmitJob,
        /// Keep polling until the job finishes and is bound
        #[arg(long)]
        wait: bool,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List sessions, marking the current one
    List,
    /// Create a session and make it current
    Create { name: Option<String> },
    /// Rename a session (disables auto-naming for it)
    Rename { id: String, name: String },
    /// Delete a session
    Delete { id: String },
    /// Make a session current
    Switch { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Image,
    Video,
    Bulk,
}

impl From<KindArg> for SessionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Image => SessionKind::Image,
            KindArg::Video => SessionKind::Video,
            KindArg::Bulk => SessionKind::Bulk,
        }
    }
}

fn load_config(cli: &Cli) -> Result<HollywoolConfig> {
    let service = match &cli.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new(),
    };
    let mut config = service.get_config().context("Failed to load configuration")?;
    if let Some(api_url) = &cli.api_url {
        config.api_base_url = api_url.clone();
    }
    if cli.local {
        config.session_store = SessionStoreKind::Local;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let paths = HollywoolPaths::new(config.data_dir.clone());
    let _log_guard = logging::init(&config, &paths)?;

    match cli.command {
        Commands::Watch { once } => commands::watch::run(&config, &paths, once).await?,
        Commands::Sessions { kind, action } => {
            let kind = SessionKind::from(kind);
            match action {
                SessionAction::List => commands::sessions::list(&config, &paths, kind).await?,
                SessionAction::Create { name } => commands::sessions::create(&config, &paths, kind, name).await?,
                SessionAction::Rename { id, name } => {
                    commands::sessions::rename(&config, &paths, kind, &id, &name).await?
                }
                SessionAction::Delete { id } => commands::sessions::delete(&config, &paths, kind, &id).await?,
                SessionAction::Switch { id } => commands::sessions::switch(&config, &paths, kind, &id).await?,
            }
        }
        Commands::Activity { json } => commands::activity::run(&config, &paths, json).await?,
        Commands::Submit { job, wait } => commands::submit::run(&config, &paths, job, wait).await?,
    }

    Ok(())
}
