//! Cache configuration and construction
//!
//! [`CacheConfig`] decides where the cache file lives, how long entries stay
//! fresh, and whether caching is on at all. [`open_cache`] turns a config into
//! a ready-to-use [`Cache`], degrading to [`NullCache`] when the store cannot
//! be opened.

use chrono::Duration;
use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

use crate::cache::{Cache, NullCache, PersistentCache, DEFAULT_TTL};
use crate::error::StoreError;
use crate::store::PersistentStore;

/// File name of the store inside the cache directory
pub const CACHE_FILE_NAME: &str = "cache.json";

/// Overrides the cache file location
pub const ENV_PATH: &str = "TVCACHE_PATH";
/// Overrides the TTL, in whole minutes
pub const ENV_TTL_MINUTES: &str = "TVCACHE_TTL_MINUTES";
/// Disables caching when set to `1`, `true` or `yes`
pub const ENV_DISABLED: &str = "TVCACHE_DISABLED";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid TTL '{0}': expected a whole number of minutes")]
    InvalidTtl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Location of the store file
    pub path: PathBuf,
    /// Time-to-live applied to every write
    pub ttl: Duration,
    /// When false, [`open_cache`] always returns a [`NullCache`]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path().unwrap_or_else(|| PathBuf::from(CACHE_FILE_NAME)),
            ttl: DEFAULT_TTL,
            enabled: true,
        }
    }
}

/// XDG-compliant location of the store file (`~/.cache/tvcache/cache.json` on Linux)
///
/// Returns `None` if no home directory can be determined.
pub fn default_cache_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "tvcache")?;
    Some(project_dirs.cache_dir().join(CACHE_FILE_NAME))
}

impl CacheConfig {
    /// Builds a config from the defaults plus `TVCACHE_*` environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from the defaults plus overrides returned by `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_PATH).filter(|p| !p.is_empty()) {
            config.path = PathBuf::from(path);
        }
        if let Some(minutes) = lookup(ENV_TTL_MINUTES) {
            config.ttl = parse_ttl_minutes(&minutes)?;
        }
        if let Some(disabled) = lookup(ENV_DISABLED) {
            config.enabled = !matches!(
                disabled.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }

        Ok(config)
    }

    /// Applies command-line overrides on top of this config
    pub fn with_overrides(mut self, path: Option<PathBuf>, ttl_minutes: Option<u32>) -> Self {
        if let Some(path) = path {
            self.path = path;
        }
        if let Some(minutes) = ttl_minutes {
            self.ttl = Duration::minutes(i64::from(minutes));
        }
        self
    }
}

fn parse_ttl_minutes(value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map(|m| Duration::minutes(i64::from(m)))
        .map_err(|_| ConfigError::InvalidTtl(value.to_string()))
}

/// Opens the cache described by `config`
///
/// Never fails: a disabled config or an unavailable store yields a
/// [`NullCache`] so callers can carry on without caching.
pub fn open_cache(config: &CacheConfig) -> Box<dyn Cache> {
    if !config.enabled {
        tracing::info!("caching disabled");
        return Box::new(NullCache);
    }

    let opened = match PersistentCache::with_ttl(&config.path, config.ttl) {
        Err(e @ (StoreError::Corrupt { .. } | StoreError::UnsupportedVersion { .. })) => {
            // Contents are disposable; start over rather than run uncached forever
            tracing::warn!(error = %e, "discarding unreadable cache store");
            PersistentStore::reset(&config.path)
                .and_then(|()| PersistentCache::with_ttl(&config.path, config.ttl))
        }
        other => other,
    };

    match opened {
        Ok(cache) => {
            tracing::debug!(path = %config.path.display(), "opened persistent cache");
            Box::new(cache)
        }
        Err(e) => {
            tracing::warn!(error = %e, "cache store unavailable, continuing without cache");
            Box::new(NullCache)
        }
    }
}
