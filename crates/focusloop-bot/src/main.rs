//! Entry point for the focusloop bot binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use focusloop_core::{Config, Database};

mod daemon;
mod handlers;
mod keyboards;
mod router;
mod telegram;
mod texts;

#[derive(Parser)]
#[command(
    name = "focusloop-bot",
    version,
    about = "Telegram accountability bot for one small focus habit"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot daemon
    Run {
        /// Path to the config file (defaults to ~/.config/focusloop/config.toml)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Path to the database file (defaults to ~/.config/focusloop/focusloop.db)
        #[arg(long, value_name = "PATH")]
        db: Option<PathBuf>,
    },
    /// Load the configuration, resolve the bot token, and exit
    CheckConfig {
        /// Path to the config file
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "focusloop_bot=info,focusloop_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { config, db } => run(config, db).await,
        Commands::CheckConfig { config } => check_config(config),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(
    config_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let db = match db_path {
        Some(path) => Database::open_at(&path)?,
        None => Database::open()?,
    };
    daemon::run(config, db).await
}

fn check_config(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let token = config.bot_token()?;
    println!("config ok");
    println!("  api base:     {}", config.telegram.api_base);
    println!("  poll timeout: {}s", config.telegram.poll_timeout_secs);
    println!("  tick:         {}s", config.reminders.tick_secs);
    println!("  token:        set ({} chars)", token.len());
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config, focusloop_core::CoreError> {
    match path {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    }
}
