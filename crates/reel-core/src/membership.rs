use std::sync::{Arc, RwLock};

use mini_moka::sync::Cache;
use tracing::debug;

use crate::lookup::LibraryLookup;

type MembershipKey = (String, String);

/// Memoized library presence, keyed on the exact (title, external id) pair
///
/// Entries never expire on their own: acquisition changes library truth, so
/// dispatched and newly attached titles are invalidated, `clear` resets all.
///
/// mini-moka admits by TinyLFU frequency, not plain LRU: near capacity a new
/// key can be refused, and its next call goes back to the library. Size
/// `cache_capacity` above the number of distinct titles in play.
pub struct MembershipCache {
    lookup: Arc<LibraryLookup>,
    capacity: u64,
    cache: RwLock<Cache<MembershipKey, bool>>,
}

impl MembershipCache {
    pub fn new(lookup: Arc<LibraryLookup>, capacity: u64) -> Self {
        Self {
            lookup,
            capacity,
            cache: RwLock::new(build_cache(capacity)),
        }
    }

    fn cache(&self) -> Cache<MembershipKey, bool> {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub async fn is_present(&self, title: &str, external_id: Option<&str>) -> bool {
        let Some(external_id) = external_id.filter(|id| !id.is_empty()) else {
            return false;
        };

        let key = (title.to_string(), external_id.to_string());
        let cache = self.cache();
        if let Some(present) = cache.get(&key) {
            debug!(title = title, present = present, "Membership cache hit");
            return present;
        }

        let present = self.lookup.is_present(title, external_id).await;
        cache.insert(key, present);
        present
    }

    pub fn invalidate(&self, title: &str, external_id: &str) {
        self.cache()
            .invalidate(&(title.to_string(), external_id.to_string()));
    }

    pub fn clear(&self) {
        *self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = build_cache(self.capacity);
        debug!("Membership cache cleared");
    }
}

fn build_cache(capacity: u64) -> Cache<MembershipKey, bool> {
    Cache::builder().max_capacity(capacity).build()
}
