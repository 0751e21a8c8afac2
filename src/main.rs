use anyhow::Result;
use clap::Parser;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod cli;
mod config;
mod core;
mod db;
mod http_client;
mod tui;

use cli::{Cli, Commands};
use config::Config;
use db::Database;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialize tracing.
///
/// The TUI owns the terminal, so in that mode logs go to `painter.log`
/// in the data directory instead of stderr.
fn init_tracing(tui: bool) -> Result<()> {
    if tui {
        let dir = Config::project_dirs()?.data_dir().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("painter.log"))?;

        tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.command.is_none())?;

    // Load or create config
    let mut config = Config::load_or_create()?;

    // Initialize database
    let db = Database::open()?;

    match cli.command {
        Some(Commands::Generate(args)) => {
            cli::commands::generate::run(args, &config, &db).await?;
        }
        Some(Commands::History(args)) => {
            cli::commands::history::run(args, &config, &db).await?;
        }
        Some(Commands::Config(args)) => {
            cli::commands::config::run(args, &mut config)?;
        }
        None => {
            // Launch TUI
            tui::run(&mut config, &db).await?;
        }
    }

    Ok(())
}
