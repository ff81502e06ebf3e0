use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "continuum")]
#[command(about = "Continuum - session continuity and conversation import for AI chat clients", long_about = None)]
struct Cli {
    /// Store artifacts here instead of the configured data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize an export without importing anything
    Scan {
        /// Export directory or path to its conversations.json
        path: PathBuf,
    },
    /// Import the conversations of an export
    Import {
        /// Export directory or path to its conversations.json
        path: PathBuf,
        /// Leave imported sessions visible in default listings
        #[arg(long)]
        keep_unarchived: bool,
    },
    /// List local sessions
    Sessions {
        /// Include archived sessions
        #[arg(long)]
        all: bool,
    },
    /// Print one session
    Show {
        /// Session id
        id: String,
    },
    /// Inspect or initialize the configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration and directories
    Show,
    /// Write the default configuration file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_service = commands::utils::config_service()?;
    let mut config = config_service.get_config()?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = Some(data_dir);
    }
    commands::utils::init_logging(&config);

    match cli.command {
        Commands::Scan { path } => commands::scan::run(&config, &path).await?,
        Commands::Import {
            path,
            keep_unarchived,
        } => {
            if keep_unarchived {
                config.archive_imported = false;
            }
            commands::import::run(&config, &path).await?
        }
        Commands::Sessions { all } => commands::sessions::list(&config, all).await?,
        Commands::Show { id } => commands::sessions::show(&config, &id).await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config::show(&config_service, &config)?,
            ConfigAction::Init => commands::config::init(&config_service)?,
        },
    }

    Ok(())
}
