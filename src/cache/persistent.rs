//! TTL-aware cache backed by the on-disk store
//!
//! Every value is wrapped in an [`Entry`] carrying its expiry time and encoded
//! as JSON before being handed to the [`PersistentStore`]. Expiry is checked
//! on read; stale or undecodable entries are deleted as soon as they are seen.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::clock::{Clock, SystemClock};
use super::entry::{Entry, EntryHeader};
use super::{Cache, CacheKey};
use crate::error::{CacheError, StoreError};
use crate::model::{Episode, RepertoirePage, Show};
use crate::store::PersistentStore;

/// Default time-to-live for every cached resource
pub const DEFAULT_TTL: Duration = Duration::hours(2);

/// Episodes keyed by show id, stored as a single aggregate entry
type EpisodeMap = BTreeMap<String, Vec<Episode>>;

/// Freshness of a single logical key, as reported by [`PersistentCache::status`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyState {
    Missing,
    Live {
        cached_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    Expired {
        cached_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    /// The stored bytes are not a readable entry
    Corrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStatus {
    pub key: CacheKey,
    pub state: KeyState,
}

/// A [`Cache`] that persists entries to disk with an expiry window
///
/// All operations go through one lock, so the read-modify-write done by
/// [`set_show_episodes`](Cache::set_show_episodes) is atomic with respect to
/// other callers of the same instance.
pub struct PersistentCache {
    store: Mutex<PersistentStore>,
    ttl: Duration,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for PersistentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCache")
            .field("store", &self.store)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl PersistentCache {
    /// Opens a cache at `path` with the default two hour TTL
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_ttl(path, DEFAULT_TTL)
    }

    /// Opens a cache at `path` whose writes expire after `ttl`
    pub fn with_ttl(path: impl AsRef<Path>, ttl: Duration) -> Result<Self, StoreError> {
        Self::with_clock(path, ttl, SystemClock)
    }

    /// Opens a cache at `path` that reads the current time from `clock`
    pub fn with_clock(
        path: impl AsRef<Path>,
        ttl: Duration,
        clock: impl Clock + 'static,
    ) -> Result<Self, StoreError> {
        let store = PersistentStore::open(path)?;
        Ok(Self {
            store: Mutex::new(store),
            ttl,
            clock: Box::new(clock),
        })
    }

    /// TTL applied by the `set_*` operations
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn path(&self) -> PathBuf {
        self.lock().path().to_path_buf()
    }

    /// Reads the live value stored under `key`
    pub fn get<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        let mut store = self.lock();
        self.get_locked(&mut store, key)
    }

    /// Writes `value` under `key`, expiring after `ttl` instead of the cache default
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut store = self.lock();
        self.set_locked(&mut store, key, value, ttl)
    }

    /// Reports the state of each logical key without modifying anything
    pub fn status(&self) -> Vec<KeyStatus> {
        let store = self.lock();
        let now = self.clock.now();

        CacheKey::ALL
            .iter()
            .map(|&key| {
                let state = if !store.contains(key.as_str()) {
                    KeyState::Missing
                } else {
                    match store
                        .read(key.as_str())
                        .ok()
                        .and_then(|bytes| serde_json::from_slice::<EntryHeader>(&bytes).ok())
                    {
                        None => KeyState::Corrupt,
                        Some(header) if now >= header.expires_at => KeyState::Expired {
                            cached_at: header.cached_at,
                            expires_at: header.expires_at,
                        },
                        Some(header) => KeyState::Live {
                            cached_at: header.cached_at,
                            expires_at: header.expires_at,
                        },
                    }
                };
                KeyStatus { key, state }
            })
            .collect()
    }

    /// Syncs and releases the backing store
    ///
    /// Idempotent. Afterwards every read misses and every write fails with
    /// `CacheError::Closed`. Dropping the cache closes it as well.
    pub fn close(&self) -> Result<(), CacheError> {
        self.lock().close()?;
        Ok(())
    }

    /// Each operation leaves the store consistent, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, PersistentStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get_locked<T: DeserializeOwned>(
        &self,
        store: &mut PersistentStore,
        key: CacheKey,
    ) -> Option<T> {
        if !store.contains(key.as_str()) {
            tracing::debug!(%key, "cache miss");
            return None;
        }

        let bytes = match store.read(key.as_str()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%key, error = %e, "store read failed after contains check");
                return None;
            }
        };

        let entry: Entry<T> = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(%key, error = %e, "discarding undecodable cache entry");
                discard(store, key);
                return None;
            }
        };

        if entry.is_expired(self.clock.now()) {
            tracing::debug!(%key, expires_at = %entry.expires_at, "cache entry expired");
            discard(store, key);
            return None;
        }

        tracing::debug!(%key, "cache hit");
        Some(entry.value)
    }

    fn set_locked<T: Serialize + ?Sized>(
        &self,
        store: &mut PersistentStore,
        key: CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if store.is_closed() {
            return Err(CacheError::Closed);
        }
        let entry = Entry::new(value, self.clock.now(), ttl);
        let bytes = serde_json::to_vec(&entry).map_err(CacheError::Encode)?;
        store.write(key.as_str(), bytes)?;
        tracing::debug!(%key, expires_at = %entry.expires_at, "cache entry written");
        Ok(())
    }
}

/// Drops a stale entry; failure only means it will be retried on the next read
fn discard(store: &mut PersistentStore, key: CacheKey) {
    if let Err(e) = store.delete(key.as_str()) {
        tracing::warn!(%key, error = %e, "failed to delete stale cache entry");
    }
}

impl Cache for PersistentCache {
    fn get_shows(&self) -> Option<Vec<Show>> {
        self.get(CacheKey::Shows)
    }

    fn get_show_episodes(&self, show_id: &str) -> Option<Vec<Episode>> {
        let mut episodes: EpisodeMap = self.get(CacheKey::ShowEpisodes)?;
        episodes.remove(show_id)
    }

    fn get_page_repertoire(&self) -> Option<RepertoirePage> {
        self.get(CacheKey::PageRepertoire)
    }

    fn set_shows(&self, shows: &[Show]) -> Result<(), CacheError> {
        self.set(CacheKey::Shows, shows, self.ttl)
    }

    /// An expired aggregate is replaced rather than extended: stale episode
    /// lists of other shows are dropped, never revived with a fresh TTL.
    fn set_show_episodes(&self, show_id: &str, episodes: &[Episode]) -> Result<(), CacheError> {
        let mut store = self.lock();
        let mut aggregate: EpisodeMap = self
            .get_locked(&mut store, CacheKey::ShowEpisodes)
            .unwrap_or_default();
        aggregate.insert(show_id.to_string(), episodes.to_vec());
        self.set_locked(&mut store, CacheKey::ShowEpisodes, &aggregate, self.ttl)
    }

    fn set_page_repertoire(&self, page: &RepertoirePage) -> Result<(), CacheError> {
        self.set(CacheKey::PageRepertoire, page, self.ttl)
    }

    fn invalidate(&self) -> Result<(), CacheError> {
        let mut store = self.lock();
        if store.is_closed() {
            return Err(CacheError::Closed);
        }
        for key in CacheKey::ALL {
            store.delete(key.as_str())?;
        }
        tracing::debug!("cache invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap()
    }

    fn create_test_cache() -> (PersistentCache, Arc<ManualClock>, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let clock = Arc::new(ManualClock::new(t0()));
        let cache = PersistentCache::with_clock(
            temp_dir.path().join("cache.json"),
            DEFAULT_TTL,
            Arc::clone(&clock),
        )
        .expect("Cache should open");
        (cache, clock, temp_dir)
    }

    fn episodes(ids: &[&str]) -> Vec<Episode> {
        ids.iter().map(|id| Episode::new(*id, format!("Episode {id}"))).collect()
    }

    #[test]
    fn test_default_ttl_is_two_hours() {
        let temp_dir = TempDir::new().unwrap();
        let cache = PersistentCache::new(temp_dir.path().join("cache.json")).unwrap();
        assert_eq!(cache.ttl(), Duration::hours(2));
    }

    #[test]
    fn test_set_shows_round_trip() {
        let (cache, _clock, _temp_dir) = create_test_cache();
        let shows = vec![Show::new("1", "Un"), Show::new("2", "Deux")];

        cache.set_shows(&shows).unwrap();

        assert_eq!(cache.get_shows(), Some(shows));
    }

    #[test]
    fn test_never_set_keys_miss() {
        let (cache, _clock, _temp_dir) = create_test_cache();

        assert!(cache.get_shows().is_none());
        assert!(cache.get_show_episodes("42").is_none());
        assert!(cache.get_page_repertoire().is_none());
    }

    #[test]
    fn test_shows_expire_after_ttl() {
        let (cache, clock, _temp_dir) = create_test_cache();
        cache.set_shows(&[Show::new("1", "Un")]).unwrap();

        clock.advance(Duration::minutes(119));
        assert_eq!(cache.get_shows().map(|s| s.len()), Some(1));

        clock.advance(Duration::minutes(2));
        assert!(cache.get_shows().is_none());
    }

    #[test]
    fn test_entry_expires_exactly_at_ttl() {
        let (cache, clock, _temp_dir) = create_test_cache();
        cache.set(CacheKey::Shows, &vec![Show::new("1", "Un")], Duration::minutes(10)).unwrap();

        clock.advance(Duration::minutes(10));

        assert!(cache.get_shows().is_none());
    }

    #[test]
    fn test_unbounded_ttl_write_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let cache = PersistentCache::with_ttl(temp_dir.path().join("cache.json"), Duration::MAX)
            .unwrap();

        cache.set_shows(&[Show::new("1", "Un")]).expect("Unbounded TTL should not fail");
        cache
            .set(CacheKey::PageRepertoire, &RepertoirePage::default(), Duration::days(365 * 300_000))
            .unwrap();

        assert_eq!(cache.get_shows(), Some(vec![Show::new("1", "Un")]));
        assert_eq!(cache.get_page_repertoire(), Some(RepertoirePage::default()));
        assert!(matches!(cache.status()[0].state, KeyState::Live { .. }));
    }

    #[test]
    fn test_expired_entry_is_deleted_on_read() {
        let (cache, clock, _temp_dir) = create_test_cache();
        cache.set_page_repertoire(&RepertoirePage::default()).unwrap();
        clock.advance(Duration::hours(3));

        assert!(cache.get_page_repertoire().is_none());

        assert!(!cache.lock().contains("page_repertoire"));
    }

    #[test]
    fn test_set_overwrites_and_refreshes_expiry() {
        let (cache, clock, _temp_dir) = create_test_cache();
        cache.set_shows(&[Show::new("1", "Un")]).unwrap();
        clock.advance(Duration::hours(1));
        cache.set_shows(&[Show::new("2", "Deux")]).unwrap();
        clock.advance(Duration::minutes(90));

        let shows = cache.get_shows().expect("Second write should still be live");
        assert_eq!(shows, vec![Show::new("2", "Deux")]);
    }

    #[test]
    fn test_show_episodes_preserves_siblings() {
        let (cache, _clock, _temp_dir) = create_test_cache();

        cache.set_show_episodes("42", &episodes(&["a"])).unwrap();
        cache.set_show_episodes("43", &episodes(&["b"])).unwrap();

        assert_eq!(cache.get_show_episodes("42"), Some(episodes(&["a"])));
        assert_eq!(cache.get_show_episodes("43"), Some(episodes(&["b"])));
        assert!(cache.get_show_episodes("44").is_none());
    }

    #[test]
    fn test_show_episodes_write_extends_whole_aggregate() {
        let (cache, clock, _temp_dir) = create_test_cache();
        cache.set_show_episodes("42", &episodes(&["a"])).unwrap();
        clock.advance(Duration::minutes(90));
        cache.set_show_episodes("43", &episodes(&["b"])).unwrap();
        clock.advance(Duration::minutes(90));

        assert_eq!(cache.get_show_episodes("42"), Some(episodes(&["a"])));
    }

    #[test]
    fn test_show_episodes_expired_aggregate_is_reset() {
        let (cache, clock, _temp_dir) = create_test_cache();
        cache.set_show_episodes("42", &episodes(&["a"])).unwrap();
        clock.advance(Duration::hours(2));

        cache.set_show_episodes("43", &episodes(&["b"])).unwrap();

        assert!(cache.get_show_episodes("42").is_none());
        assert_eq!(cache.get_show_episodes("43"), Some(episodes(&["b"])));
    }

    #[test]
    fn test_invalidate_clears_everything_and_is_idempotent() {
        let (cache, _clock, _temp_dir) = create_test_cache();
        cache.set_shows(&[Show::new("1", "Un")]).unwrap();
        cache.set_show_episodes("1", &episodes(&["a"])).unwrap();
        cache.set_page_repertoire(&RepertoirePage::default()).unwrap();

        cache.invalidate().unwrap();
        cache.invalidate().unwrap();

        assert!(cache.get_shows().is_none());
        assert!(cache.get_show_episodes("1").is_none());
        assert!(cache.get_page_repertoire().is_none());
        assert!(cache.lock().keys().is_empty());
    }

    #[test]
    fn test_invalidate_on_empty_cache_succeeds() {
        let (cache, _clock, _temp_dir) = create_test_cache();
        assert!(cache.invalidate().is_ok());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss_and_removed() {
        let (cache, _clock, _temp_dir) = create_test_cache();
        cache.lock().write("shows", b"not an entry".to_vec()).unwrap();

        assert!(cache.get_shows().is_none());
        assert!(!cache.lock().contains("shows"));
    }

    #[test]
    fn test_wrong_shape_entry_is_a_miss() {
        let (cache, _clock, _temp_dir) = create_test_cache();
        cache.set(CacheKey::Shows, &"just a string", DEFAULT_TTL).unwrap();

        assert!(cache.get_shows().is_none());
    }

    #[test]
    fn test_status_reports_each_key() {
        let (cache, clock, _temp_dir) = create_test_cache();
        cache.set(CacheKey::Shows, &Vec::<Show>::new(), Duration::minutes(30)).unwrap();
        cache.set_page_repertoire(&RepertoirePage::default()).unwrap();
        clock.advance(Duration::hours(1));

        let status = cache.status();

        assert_eq!(status.len(), 3);
        assert_eq!(
            status[0],
            KeyStatus {
                key: CacheKey::Shows,
                state: KeyState::Expired {
                    cached_at: t0(),
                    expires_at: t0() + Duration::minutes(30),
                },
            }
        );
        assert_eq!(status[1].state, KeyState::Missing);
        assert!(matches!(status[2].state, KeyState::Live { .. }));
        assert!(cache.lock().contains("shows"), "status must not delete entries");
    }

    #[test]
    fn test_status_flags_corrupt_entries() {
        let (cache, _clock, _temp_dir) = create_test_cache();
        cache.lock().write("show_episodes", vec![0xff, 0x00]).unwrap();

        let status = cache.status();

        assert_eq!(status[1].state, KeyState::Corrupt);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache.json");

        {
            let cache = PersistentCache::new(&path).unwrap();
            cache.set_show_episodes("42", &episodes(&["a", "b"])).unwrap();
            cache.close().unwrap();
        }

        let cache = PersistentCache::new(&path).unwrap();
        assert_eq!(cache.get_show_episodes("42"), Some(episodes(&["a", "b"])));
    }

    #[test]
    fn test_closed_cache_misses_and_rejects_writes() {
        let (cache, _clock, _temp_dir) = create_test_cache();
        cache.set_shows(&[Show::new("1", "Un")]).unwrap();

        cache.close().unwrap();
        cache.close().unwrap();

        assert!(cache.get_shows().is_none());
        assert!(matches!(cache.set_shows(&[]), Err(CacheError::Closed)));
        assert!(matches!(cache.set_show_episodes("1", &[]), Err(CacheError::Closed)));
        assert!(matches!(cache.invalidate(), Err(CacheError::Closed)));
    }

    #[test]
    fn test_concurrent_episode_writes_are_all_kept() {
        let (cache, _clock, _temp_dir) = create_test_cache();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let cache = &cache;
                scope.spawn(move || {
                    let id = i.to_string();
                    cache
                        .set_show_episodes(&id, &episodes(&[id.as_str()]))
                        .expect("Write should succeed");
                });
            }
        });

        for i in 0..8 {
            let id = i.to_string();
            assert_eq!(cache.get_show_episodes(&id), Some(episodes(&[id.as_str()])));
        }
    }
}
