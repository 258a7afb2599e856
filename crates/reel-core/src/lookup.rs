use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reel_models::{strip_parentheticals, LibraryEntry};
use reel_sources::LibraryService;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// External-id index built from one full library enumeration
struct FallbackIndex {
    built_at: Instant,
    by_external_id: HashMap<String, LibraryEntry>,
}

impl FallbackIndex {
    fn build(entries: Vec<LibraryEntry>) -> Self {
        let mut by_external_id = HashMap::new();
        for entry in entries {
            for guid in &entry.external_ids {
                let id = guid.strip_prefix("imdb://").unwrap_or(guid);
                by_external_id
                    .entry(id.to_string())
                    .or_insert_with(|| entry.clone());
            }
        }
        Self {
            built_at: Instant::now(),
            by_external_id,
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.built_at.elapsed() < ttl
    }
}

/// Uncached library presence checks
///
/// A title search is tried first; when no hit carries the wanted external id
/// the whole library is enumerated. The resulting index is reused for `ttl`
/// so a batch of misses costs one enumeration, not one per title.
pub struct LibraryLookup {
    library: Arc<dyn LibraryService>,
    ttl: Duration,
    fallback: RwLock<Option<FallbackIndex>>,
}

impl LibraryLookup {
    pub fn new(library: Arc<dyn LibraryService>, ttl: Duration) -> Self {
        Self {
            library,
            ttl,
            fallback: RwLock::new(None),
        }
    }

    /// Library entry carrying `external_id`, searched by `title` first
    pub async fn find_entry(&self, title: &str, external_id: &str) -> Option<LibraryEntry> {
        if external_id.is_empty() {
            return None;
        }

        let cleaned = strip_parentheticals(title);
        match self.library.search(&cleaned, None).await {
            Ok(results) => {
                if let Some(found) = results.into_iter().find(|e| e.has_external_id(external_id)) {
                    debug!(title = title, external_id = external_id, "Found in library by title");
                    return Some(found);
                }
            }
            Err(e) => warn!(title = title, error = %e, "Library search failed"),
        }

        let found = self.find_in_index(external_id).await;
        if found.is_none() {
            debug!(title = title, external_id = external_id, "Not in library");
        }
        found
    }

    pub async fn is_present(&self, title: &str, external_id: &str) -> bool {
        self.find_entry(title, external_id).await.is_some()
    }

    /// External-list matching: same year when one is given, otherwise the
    /// same title ignoring case
    pub async fn find_by_title_year(&self, title: &str, year: Option<u32>) -> Option<LibraryEntry> {
        let cleaned = strip_parentheticals(title);
        let results = match self.library.search(&cleaned, None).await {
            Ok(results) => results,
            Err(e) => {
                warn!(title = title, error = %e, "Library search failed");
                return None;
            }
        };

        results.into_iter().find(|entry| match year {
            Some(year) => entry.year == Some(year),
            None => entry.title.eq_ignore_ascii_case(&cleaned),
        })
    }

    /// Drop the enumeration index so the next miss rebuilds it
    pub async fn invalidate_index(&self) {
        *self.fallback.write().await = None;
    }

    async fn find_in_index(&self, external_id: &str) -> Option<LibraryEntry> {
        {
            let index = self.fallback.read().await;
            if let Some(index) = index.as_ref().filter(|i| i.is_fresh(self.ttl)) {
                return index.by_external_id.get(external_id).cloned();
            }
        }

        let mut index = self.fallback.write().await;
        // Another task may have rebuilt it while we waited for the write lock
        if !index.as_ref().is_some_and(|i| i.is_fresh(self.ttl)) {
            warn!(external_id = external_id, "No title match, scanning the whole library");
            match self.library.enumerate_all().await {
                Ok(entries) => {
                    info!(entries = entries.len(), "Rebuilt library external-id index");
                    *index = Some(FallbackIndex::build(entries));
                }
                Err(e) => {
                    warn!(error = %e, "Library enumeration failed");
                    return None;
                }
            }
        }

        index
            .as_ref()
            .and_then(|i| i.by_external_id.get(external_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{entry, FakeLibrary};

    fn lookup(library: Arc<FakeLibrary>) -> LibraryLookup {
        LibraryLookup::new(library, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_title_search_strips_year() {
        let library = Arc::new(FakeLibrary::default());
        library.add(entry("1", "Dune", Some(2021), "tt1160419"));
        let lookup = lookup(library.clone());

        let found = lookup.find_entry("Dune (2021)", "tt1160419").await.unwrap();
        assert_eq!(found.key, "1");
        assert_eq!(library.enumerate_calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_scan_finds_retitled_entry() {
        let library = Arc::new(FakeLibrary::default());
        library.add_unsearchable(entry("7", "Dune: Part One", Some(2021), "tt1160419"));
        let lookup = lookup(library.clone());

        assert!(lookup.is_present("Dune (2021)", "tt1160419").await);
        assert_eq!(library.enumerate_calls(), 1);
    }

    #[tokio::test]
    async fn test_fallback_index_is_reused_within_ttl() {
        let library = Arc::new(FakeLibrary::default());
        library.add(entry("1", "Heat", Some(1995), "tt0113277"));
        let lookup = lookup(library.clone());

        assert!(!lookup.is_present("Arrival (2016)", "tt2543164").await);
        assert!(!lookup.is_present("Sicario (2015)", "tt3397884").await);
        assert_eq!(library.enumerate_calls(), 1);

        lookup.invalidate_index().await;
        assert!(!lookup.is_present("Arrival (2016)", "tt2543164").await);
        assert_eq!(library.enumerate_calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_index_is_rebuilt() {
        let library = Arc::new(FakeLibrary::default());
        let lookup = LibraryLookup::new(library.clone(), Duration::ZERO);

        assert!(!lookup.is_present("Arrival (2016)", "tt2543164").await);
        library.add_unsearchable(entry("2", "Arrival", Some(2016), "tt2543164"));
        assert!(lookup.is_present("Arrival (2016)", "tt2543164").await);
        assert_eq!(library.enumerate_calls(), 2);
    }

    #[tokio::test]
    async fn test_errors_mean_not_present() {
        let library = Arc::new(FakeLibrary::default());
        library.add(entry("1", "Dune", Some(2021), "tt1160419"));
        library.fail_all();
        let lookup = lookup(library);

        assert!(!lookup.is_present("Dune (2021)", "tt1160419").await);
        assert!(!lookup.is_present("Dune (2021)", "").await);
    }

    #[tokio::test]
    async fn test_find_by_title_year() {
        let library = Arc::new(FakeLibrary::default());
        library.add(entry("1", "Parasite", Some(2019), "tt6751668"));
        library.add(entry("2", "Parasite", Some(1982), "tt0084472"));
        library.add(entry("3", "Mother!", Some(2017), "tt5109784"));
        let lookup = lookup(library);

        assert_eq!(lookup.find_by_title_year("Parasite", Some(2019)).await.unwrap().key, "1");
        assert!(lookup.find_by_title_year("Parasite", Some(2001)).await.is_none());
        assert_eq!(lookup.find_by_title_year("mother!", None).await.unwrap().key, "3");
        // Without a year the title must match exactly, not as a substring
        assert!(lookup.find_by_title_year("Mother", None).await.is_none());
    }
}
