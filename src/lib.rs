//! tvcache - Expiring on-disk cache for TOU.TV catalog lookups
//!
//! Shields the show list, per-show episode lists and the repertoire page
//! behind a file-backed cache whose entries expire after a fixed TTL.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;

pub use cache::{Cache, CacheKey, NullCache, PersistentCache};
pub use config::{open_cache, CacheConfig};
pub use error::{CacheError, StoreError};
pub use model::{Episode, RepertoirePage, Show};
