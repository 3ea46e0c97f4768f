//! bodylog CLI
//!
//! Log daily body metrics and keep prescription photos from the command line.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use bodylog_client::BodyLog;
use bodylog_core::Session;

use crate::config::BodyLogConfig;

/// bodylog CLI: track body metrics and prescription photos.
#[derive(Parser, Debug)]
#[command(name = "bodylog", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        long,
        env = "BODYLOG_CONFIG",
        default_value = "bodylog.toml",
        global = true
    )]
    config: PathBuf,

    /// User id the records belong to.
    #[arg(long, env = "BODYLOG_USER", global = true)]
    user: String,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Answer yes to every confirmation prompt.
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage daily body entries.
    Entries(commands::entries::EntriesArgs),
    /// Manage prescription and supplement photos.
    Photos(commands::photos::PhotosArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = BodyLogConfig::load(&cli.config)?;

    let app = BodyLog::new(config.record_store().await?, config.object_storage().await?);
    let session = Session::new(cli.user.as_str());

    match cli.command {
        Command::Entries(args) => {
            commands::entries::run(&app, &session, &args, &cli.format, cli.yes).await
        }
        Command::Photos(args) => {
            commands::photos::run(&app, &session, &args, &cli.format, cli.yes).await
        }
    }
}
