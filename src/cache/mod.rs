//! Cache layer for catalog lookups
//!
//! [`Cache`] is the contract the catalog client talks to. Two variants exist:
//! [`PersistentCache`], which keeps entries in an on-disk store with an expiry
//! window, and [`NullCache`], which always misses and is used when caching is
//! disabled or the store cannot be opened.

mod clock;
mod entry;
mod null;
mod persistent;

pub use clock::{Clock, ManualClock, SystemClock};
pub use null::NullCache;
pub use persistent::{KeyState, KeyStatus, PersistentCache, DEFAULT_TTL};

use crate::error::CacheError;
use crate::model::{Episode, RepertoirePage, Show};

/// Logical resources held by the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The full show list
    Shows,
    /// Aggregate map of show id to episode list
    ShowEpisodes,
    /// The repertoire listing page
    PageRepertoire,
}

impl CacheKey {
    pub const ALL: [CacheKey; 3] = [
        CacheKey::Shows,
        CacheKey::ShowEpisodes,
        CacheKey::PageRepertoire,
    ];

    /// Key under which the resource is written to the store
    pub fn as_str(self) -> &'static str {
        match self {
            CacheKey::Shows => "shows",
            CacheKey::ShowEpisodes => "show_episodes",
            CacheKey::PageRepertoire => "page_repertoire",
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read/write/invalidate operations over the cached catalog resources
///
/// Getters return `None` for any miss: a key that was never set, an expired
/// entry, or an entry that could not be decoded. Writers replace the whole
/// value for their key with a fresh expiry window.
pub trait Cache: Send + Sync {
    fn get_shows(&self) -> Option<Vec<Show>>;

    /// Episodes cached for `show_id`, or `None` if the aggregate is missing,
    /// expired, or has no entry for that show
    fn get_show_episodes(&self, show_id: &str) -> Option<Vec<Episode>>;

    fn get_page_repertoire(&self) -> Option<RepertoirePage>;

    fn set_shows(&self, shows: &[Show]) -> Result<(), CacheError>;

    /// Stores `episodes` for `show_id`, keeping other shows' episodes that are
    /// still live
    fn set_show_episodes(&self, show_id: &str, episodes: &[Episode]) -> Result<(), CacheError>;

    fn set_page_repertoire(&self, page: &RepertoirePage) -> Result<(), CacheError>;

    /// Removes every logical resource regardless of expiry
    fn invalidate(&self) -> Result<(), CacheError>;
}

impl<C: Cache + ?Sized> Cache for Box<C> {
    fn get_shows(&self) -> Option<Vec<Show>> {
        (**self).get_shows()
    }

    fn get_show_episodes(&self, show_id: &str) -> Option<Vec<Episode>> {
        (**self).get_show_episodes(show_id)
    }

    fn get_page_repertoire(&self) -> Option<RepertoirePage> {
        (**self).get_page_repertoire()
    }

    fn set_shows(&self, shows: &[Show]) -> Result<(), CacheError> {
        (**self).set_shows(shows)
    }

    fn set_show_episodes(&self, show_id: &str, episodes: &[Episode]) -> Result<(), CacheError> {
        (**self).set_show_episodes(show_id, episodes)
    }

    fn set_page_repertoire(&self, page: &RepertoirePage) -> Result<(), CacheError> {
        (**self).set_page_repertoire(page)
    }

    fn invalidate(&self) -> Result<(), CacheError> {
        (**self).invalidate()
    }
}
