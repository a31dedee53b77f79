use super::Cache;
use crate::error::CacheError;
use crate::model::{Episode, RepertoirePage, Show};

/// A cache that never holds anything
///
/// Used when caching is turned off or the persistent store cannot be opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl Cache for NullCache {
    fn get_shows(&self) -> Option<Vec<Show>> {
        None
    }

    fn get_show_episodes(&self, _show_id: &str) -> Option<Vec<Episode>> {
        None
    }

    fn get_page_repertoire(&self) -> Option<RepertoirePage> {
        None
    }

    fn set_shows(&self, _shows: &[Show]) -> Result<(), CacheError> {
        Ok(())
    }

    fn set_show_episodes(&self, _show_id: &str, _episodes: &[Episode]) -> Result<(), CacheError> {
        Ok(())
    }

    fn set_page_repertoire(&self, _page: &RepertoirePage) -> Result<(), CacheError> {
        Ok(())
    }

    fn invalidate(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
