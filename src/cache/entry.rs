//! Timestamped wrapper stored for every cached value

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A cached value together with its expiry window
///
/// Entries never leave the cache; callers only ever see `value`. Timestamps
/// are stored as epoch milliseconds so the far-future expiry of an unbounded
/// TTL stays representable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Entry<T> {
    /// When the value was written
    #[serde(with = "ts_milliseconds")]
    pub cached_at: DateTime<Utc>,
    /// First instant at which the value is stale
    #[serde(with = "ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    pub value: T,
}

impl<T> Entry<T> {
    /// Wraps `value`, expiring `ttl` after `now`
    ///
    /// A TTL that runs past the end of representable time saturates to
    /// `DateTime::<Utc>::MAX_UTC`.
    pub fn new(value: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            cached_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            value,
        }
    }

    /// An entry is live strictly before `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Entry header decoded without the value, used for status reporting
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EntryHeader {
    #[serde(with = "ts_milliseconds")]
    pub cached_at: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}
