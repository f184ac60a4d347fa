//! filecache command-line entry point.
//!
//! Operates on a single cache file. Payloads go to stdout untouched; logs go
//! to stderr so they never mix with cached bytes.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use filecache_core::config::LogFormat;
use filecache_core::{CacheConfig, DistributedCache, EntryOptions, FileCache};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Persistent expiring key-value cache backed by SQLite.
#[derive(Debug, Parser)]
#[command(name = "filecache", version, about, long_about = None)]
struct Cli {
    /// Cache file (overrides FILECACHE_DB_PATH and the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the payload stored under KEY; exits 1 on a miss
    Get { key: String },

    /// Store a payload under KEY, from VALUE or stdin
    Set {
        key: String,

        /// Payload; read from stdin when omitted
        value: Option<String>,

        /// Absolute deadline (RFC 3339)
        #[arg(long, value_parser = parse_rfc3339)]
        expires_at: Option<DateTime<Utc>>,

        /// Absolute deadline in seconds from now
        #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(i64).range(1..))]
        expires_in: Option<i64>,

        /// Sliding inactivity window in seconds
        #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(i64).range(1..))]
        sliding: Option<i64>,
    },

    /// Restart the sliding window of KEY
    Refresh { key: String },

    /// Delete KEY
    Remove { key: String },

    /// Delete every expired entry and print how many were removed
    Purge,
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw).map(|at| at.with_timezone(&Utc)).map_err(|e| e.to_string())
}

fn entry_options(
    expires_at: Option<DateTime<Utc>>, expires_in: Option<i64>, sliding: Option<i64>,
) -> EntryOptions {
    EntryOptions {
        absolute_expiration: expires_at,
        absolute_expiration_relative_to_now: expires_in.map(Duration::seconds),
        sliding_expiration: sliding.map(Duration::seconds),
    }
}

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    std::io::stdin().read_to_end(&mut buf).context("reading value from stdin")?;
    Ok(buf)
}

async fn run(cli: Cli, cache: &FileCache, cancel: &CancellationToken) -> Result<ExitCode> {
    match cli.command {
        Command::Get { key } => match cache.get_async(&key, cancel).await? {
            Some(value) => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&value)?;
                stdout.flush()?;
                Ok(ExitCode::SUCCESS)
            }
            None => {
                tracing::info!(key = %key, "cache miss");
                Ok(ExitCode::FAILURE)
            }
        },
        Command::Set { key, value, expires_at, expires_in, sliding } => {
            let payload = match value {
                Some(value) => value.into_bytes(),
                None => read_stdin()?,
            };
            let options = entry_options(expires_at, expires_in, sliding);
            cache.set_async(&key, &payload, &options, cancel).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Refresh { key } => {
            cache.refresh_async(&key, cancel).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Remove { key } => {
            cache.remove_async(&key, cancel).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Purge => {
            let deleted = cache.purge_expired_async(cancel).await?;
            println!("{deleted}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = CacheConfig::load()?;
    if let Some(db) = cli.db.clone() {
        config.db_path = db;
        config.validate()?;
    }

    init_tracing(config.log_format);

    let cache = FileCache::from_config(&config)
        .with_context(|| format!("opening cache at {}", config.db_path.display()))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    run(cli, &cache, &cancel).await
}
