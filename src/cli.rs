//! Command-line interface for inspecting and clearing a cache file
//!
//! This module handles argument parsing with clap and the formatting of the
//! `status` report, so both can be tested without running the binary.

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cache::{KeyState, KeyStatus};
use crate::config::{CacheConfig, ConfigError};

/// tvcache - Inspect and manage the TOU.TV catalog cache
#[derive(Parser, Debug)]
#[command(name = "tvcache")]
#[command(about = "Inspect and manage the TOU.TV catalog cache")]
#[command(version)]
pub struct Cli {
    /// Cache file to operate on (defaults to the XDG cache directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub cache_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Show the freshness of each cached resource
    Status,
    /// Remove every cached resource
    Invalidate,
    /// Print the resolved cache file path
    Path,
}

impl Cli {
    /// Resolves the effective configuration: defaults, then `TVCACHE_*`
    /// environment variables, then `--cache-path`
    pub fn resolve_config(&self) -> Result<CacheConfig, ConfigError> {
        Ok(CacheConfig::from_env()?.with_overrides(self.cache_path.clone(), None))
    }
}

/// Formats one line of the `status` report
pub fn format_status(status: &KeyStatus, now: DateTime<Utc>) -> String {
    let key = status.key.as_str();
    match &status.state {
        KeyState::Missing => format!("{key:<16} missing"),
        KeyState::Corrupt => format!("{key:<16} corrupt"),
        KeyState::Live {
            cached_at,
            expires_at,
        } => format!(
            "{key:<16} live     cached {} expires in {}",
            cached_at.format("%Y-%m-%d %H:%M:%S UTC"),
            format_duration(*expires_at - now)
        ),
        KeyState::Expired {
            cached_at,
            expires_at,
        } => format!(
            "{key:<16} expired  cached {} expired {} ago",
            cached_at.format("%Y-%m-%d %H:%M:%S UTC"),
            format_duration(now - *expires_at)
        ),
    }
}

/// Formats a duration as `1h 05m`, `12m 30s` or `45s`
fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
