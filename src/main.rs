//! tvcache - Inspect and manage the TOU.TV catalog cache
//!
//! Reports the freshness of each cached resource, clears the cache, or prints
//! where the cache file lives.

use chrono::Utc;
use clap::Parser;
use std::process::ExitCode;

use tvcache::cache::{CacheKey, KeyState, KeyStatus};
use tvcache::cli::{format_status, Cli, Command};
use tvcache::logging::init_logging;
use tvcache::store::PersistentStore;
use tvcache::{Cache, PersistentCache, StoreError};

fn missing_statuses() -> Vec<KeyStatus> {
    CacheKey::ALL
        .iter()
        .map(|&key| KeyStatus {
            key,
            state: KeyState::Missing,
        })
        .collect()
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.resolve_config()?;

    match cli.command {
        Command::Path => {
            println!("{}", config.path.display());
        }
        Command::Status => {
            // Reporting must not create the store or its directories
            let statuses = if config.path.exists() {
                let cache = PersistentCache::with_ttl(&config.path, config.ttl)?;
                let statuses = cache.status();
                cache.close()?;
                statuses
            } else {
                missing_statuses()
            };
            let now = Utc::now();
            println!("{}", config.path.display());
            for status in &statuses {
                println!("  {}", format_status(status, now));
            }
        }
        Command::Invalidate => match PersistentCache::with_ttl(&config.path, config.ttl) {
            Ok(cache) => {
                cache.invalidate()?;
                cache.close()?;
                println!("Cache invalidated: {}", config.path.display());
            }
            Err(e @ (StoreError::Corrupt { .. } | StoreError::UnsupportedVersion { .. })) => {
                tracing::warn!(error = %e, "replacing unreadable cache store");
                PersistentStore::reset(&config.path)?;
                println!("Cache reset: {}", config.path.display());
            }
            Err(e) => return Err(e.into()),
        },
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
