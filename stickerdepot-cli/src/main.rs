//! stickerdepot CLI - Command-line interface
//!
//! Installs, fetches and maintains sticker packs using the stickerdepot
//! library.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use stickerdepot::config::config_directory;
use stickerdepot::logging::{default_log_dir, default_log_file, init_logging, LoggingGuard};

use commands::common::{build_manager, load_config};
use commands::config::ConfigCommands;
use commands::packs::FetchArgs;
use commands::{config, maintenance, packs};
use error::CliError;

#[derive(Parser)]
#[command(name = "stickerdepot")]
#[command(version = stickerdepot::VERSION)]
#[command(about = "Download, install and manage encrypted sticker packs", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.stickerdepot/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a pack from its share link
    Install {
        /// Share link of the pack
        link: String,
    },

    /// Uninstall a pack
    Uninstall {
        /// Share link of the pack
        link: String,
    },

    /// List installed packs
    List {
        /// Also list saved packs that are not installed
        #[arg(long)]
        all: bool,
    },

    /// Fetch a single sticker and print its file path
    Fetch(FetchArgs),

    /// Queue a pack download that survives restarts
    Enqueue {
        /// Share link of the pack
        link: String,
    },

    /// Process queued pack downloads
    Resume,

    /// Save default packs and complete missing sticker downloads
    Refresh,

    /// Remove orphaned packs, stickers and scratch files
    Cleanup {
        /// Only report whether orphaned data exists
        #[arg(long)]
        dry_run: bool,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    if let Commands::Config(command) = cli.command {
        return config::run(command, config_path);
    }

    let settings = load_config(config_path)?;
    let _logging = start_logging(&config_directory())?;
    let manager = build_manager(&settings)?;

    match cli.command {
        Commands::Install { link } => packs::run_install(&manager, &link).await,
        Commands::Uninstall { link } => packs::run_uninstall(&manager, &link),
        Commands::List { all } => packs::run_list(&manager, all),
        Commands::Fetch(args) => packs::run_fetch(&manager, args).await,
        Commands::Enqueue { link } => maintenance::run_enqueue(manager, &link),
        Commands::Resume => maintenance::run_resume(manager).await,
        Commands::Refresh => maintenance::run_refresh(&manager).await,
        Commands::Cleanup { dry_run } => maintenance::run_cleanup(&manager, dry_run).await,
        Commands::Config(_) => Ok(()),
    }
}

fn start_logging(base: &Path) -> Result<LoggingGuard, CliError> {
    init_logging(&base.join(default_log_dir()), default_log_file())
        .map_err(|e| CliError::LoggingInit(e.to_string()))
}
