mod bracket;
mod config;
mod logger;
mod store;
mod teams;
mod tournaments;

use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::mysql::MySqlPool;
use sqlx::pool::PoolOptions;
use store::Store;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Path to the config file. Only the environment is used if the file doesn't exist.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Creates all tables.
    Init,
    Teams {
        #[command(subcommand)]
        command: teams::Command,
    },
    Tournaments {
        #[command(subcommand)]
        command: tournaments::Command,
    },
    #[command(flatten)]
    Bracket(bracket::Command),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Store(#[from] sqlx::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Bracket(#[from] knockout_core::Error),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} already exists")]
    AlreadyExists(&'static str),
    #[error("corrupted data: {0}")]
    Corrupted(String),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args.config).await {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load config: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = logger::init(config.loglevel) {
        eprintln!("Failed to install logger: {}", err);
        process::exit(1);
    }

    log::debug!(
        "Using database {} on {}:{}",
        config.database.database,
        config.database.host,
        config.database.port
    );

    let pool: MySqlPool = match PoolOptions::new()
        .max_connections(4)
        .idle_timeout(Duration::new(60, 0))
        .connect_lazy(&config.database.connect_string())
    {
        Ok(pool) => pool,
        Err(err) => {
            log::error!("Failed to create database pool: {}", err);
            process::exit(1);
        }
    };

    let store = Store {
        pool,
        table_prefix: config.database.prefix.clone(),
    };

    let mut rng = match config.seed {
        Some(seed) => {
            log::info!("Using fixed seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let res = match args.command {
        Command::Init => store.init().await,
        Command::Teams { command } => command.run(&store).await,
        Command::Tournaments { command } => command.run(&store).await,
        Command::Bracket(command) => command.run(&store, &mut rng).await,
    };

    if let Err(err) = res {
        log::error!("{}", err);
        process::exit(1);
    }
}

/// Loads the config file at `path` and applies the environment on top. Falls back to
/// [`Config::from_environment`] if the file doesn't exist.
async fn load_config(path: &Path) -> Result<Config, ConfigError> {
    match Config::from_file(path).await {
        Ok(config) => Ok(config.with_environment()),
        Err(ConfigError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
            Config::from_environment()
        }
        Err(err) => Err(err),
    }
}
