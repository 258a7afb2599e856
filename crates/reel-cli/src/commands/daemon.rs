use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use reel_core::CollectionService;
use reel_models::{CollectionStatus, ListedMovie};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::commands::{load_service, print_collections};
use crate::output::Output;

const STATUS_INTERVAL: Duration = Duration::from_secs(600);
const SEED_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Collections the daemon keeps set up
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SeedFile {
    #[serde(default, rename = "collection")]
    pub collections: Vec<SeedCollection>,
    #[serde(default, rename = "list")]
    pub lists: Vec<SeedList>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SeedCollection {
    pub name: String,
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SeedList {
    pub url: String,
    /// Defaults to the list's own name
    pub name: Option<String>,
    #[serde(default)]
    pub library_only: bool,
}

/// Difference between two versions of a seed file
#[derive(Debug, Default, PartialEq)]
pub struct SeedChanges {
    /// New or edited entries
    pub apply: SeedFile,
    pub removed_collections: Vec<String>,
    /// URLs of lists that are gone or seeded with different options
    pub removed_lists: Vec<String>,
}

impl SeedChanges {
    pub fn is_empty(&self) -> bool {
        self.apply == SeedFile::default()
            && self.removed_collections.is_empty()
            && self.removed_lists.is_empty()
    }
}

impl SeedFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read seed file {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| eyre!("Invalid seed file {}: {}", path.display(), e))
    }

    /// An edited collection is rebuilt in place; an edited list is recreated
    pub fn changes_since(&self, previous: &SeedFile) -> SeedChanges {
        let apply = SeedFile {
            collections: self
                .collections
                .iter()
                .filter(|c| !previous.collections.contains(c))
                .cloned()
                .collect(),
            lists: self
                .lists
                .iter()
                .filter(|l| !previous.lists.contains(l))
                .cloned()
                .collect(),
        };
        let removed_collections = previous
            .collections
            .iter()
            .filter(|old| !self.collections.iter().any(|c| c.name == old.name))
            .map(|c| c.name.clone())
            .collect();
        let removed_lists = previous
            .lists
            .iter()
            .filter(|old| !self.lists.contains(old))
            .map(|l| l.url.clone())
            .collect();

        SeedChanges {
            apply,
            removed_collections,
            removed_lists,
        }
    }
}

/// Seed file contents the daemon has applied
struct SeedState {
    path: Option<PathBuf>,
    current: SeedFile,
    /// Collection name each seeded list was created under, by URL
    list_names: HashMap<String, String>,
}

pub async fn run_daemon(seed_path: Option<PathBuf>, output: &Output) -> Result<()> {
    let seed = match &seed_path {
        Some(path) => SeedFile::load(path)?,
        None => SeedFile::default(),
    };

    let service = load_service(output).await?;
    service.start().await?;
    let settings = service.scheduler().settings();
    info!(
        operation = "daemon_started",
        collections = seed.collections.len(),
        lists = seed.lists.len(),
        check_interval_secs = settings.check_interval.as_secs(),
        max_checks = ?settings.max_checks,
        resync_schedule = %settings.resync_schedule,
        "Reconciliation scheduler started"
    );
    output.success("Scheduler running. Press Ctrl-C to stop.");

    let mut state = SeedState {
        path: seed_path,
        current: SeedFile::default(),
        list_names: HashMap::new(),
    };
    apply_seed(&service, &seed, &mut state.list_names).await;
    state.current = seed;
    print_collections(&service.collections_status().await, output);

    let mut status_ticker = tokio::time::interval(STATUS_INTERVAL);
    let mut seed_ticker = tokio::time::interval(SEED_POLL_INTERVAL);
    status_ticker.tick().await;
    seed_ticker.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = status_ticker.tick() => log_status(&service).await,
            _ = seed_ticker.tick() => reload_seed(&service, &mut state).await,
        }
    }

    info!(operation = "daemon_stopping", "Shutting down scheduler");
    service.shutdown().await?;
    output.success("Scheduler stopped");
    Ok(())
}

/// Pick up edits to the seed file; a file that fails to load keeps the last good state
async fn reload_seed(service: &CollectionService, state: &mut SeedState) {
    let Some(path) = &state.path else {
        return;
    };
    let seed = match SeedFile::load(path) {
        Ok(seed) => seed,
        Err(e) => {
            warn!(operation = "seed_reload", error = %e, "Keeping the previous seed");
            return;
        }
    };

    let changes = seed.changes_since(&state.current);
    if changes.is_empty() {
        return;
    }
    info!(
        operation = "seed_reload",
        collections = changes.apply.collections.len(),
        lists = changes.apply.lists.len(),
        removed = changes.removed_collections.len() + changes.removed_lists.len(),
        "Seed file changed"
    );

    remove_seeded(service, &changes, &mut state.list_names).await;
    apply_seed(service, &changes.apply, &mut state.list_names).await;
    state.current = seed;
}

async fn remove_seeded(
    service: &CollectionService,
    changes: &SeedChanges,
    list_names: &mut HashMap<String, String>,
) {
    let list_collections = changes.removed_lists.iter().filter_map(|url| {
        let name = list_names.remove(url);
        if name.is_none() {
            debug!(operation = "seed_remove", url = %url, "List was never created, nothing to delete");
        }
        name
    });
    let names: Vec<String> = changes
        .removed_collections
        .iter()
        .cloned()
        .chain(list_collections)
        .collect();

    for name in names {
        match service.delete_collection(&name).await {
            Ok(existed) => info!(operation = "seed_remove", collection = %name, existed = existed, "Removed seeded collection"),
            Err(e) => error!(operation = "seed_remove", collection = %name, error = %e, "Failed to delete collection"),
        }
    }
}

/// Each entry is independent; a failing one is logged and skipped
async fn apply_seed(service: &CollectionService, seed: &SeedFile, list_names: &mut HashMap<String, String>) {
    for collection in &seed.collections {
        match service.build_collection(&collection.name, &collection.titles).await {
            Ok(outcome) => info!(
                operation = "seed_collection",
                collection = %outcome.collection_name,
                present = outcome.movies_already_present.len(),
                dispatched = outcome.movies_dispatched.len(),
                "Seeded collection"
            ),
            Err(e) => error!(operation = "seed_collection", collection = %collection.name, error = %e, "Failed to seed collection"),
        }
    }

    for list in &seed.lists {
        match seed_list(service, list).await {
            Ok(Some(name)) => {
                list_names.insert(list.url.clone(), name);
            }
            Ok(None) => {}
            Err(e) => error!(operation = "seed_list", url = %list.url, error = %e, "Failed to seed list"),
        }
    }
}

/// Name of the collection created for the list, if any
async fn seed_list(service: &CollectionService, list: &SeedList) -> Result<Option<String>> {
    let preview = service.import_list(&list.url).await?;
    let selected: Vec<ListedMovie> = preview
        .movies
        .into_iter()
        .filter(|m| !list.library_only || m.in_library)
        .collect();
    if selected.is_empty() {
        warn!(operation = "seed_list", url = %list.url, "List has no movies to add");
        return Ok(None);
    }

    let name = list.name.clone().unwrap_or(preview.collection_name);
    let outcome = service.materialize_list(&name, &selected, &preview.source_url).await?;
    info!(
        operation = "seed_list",
        collection = %outcome.name,
        in_library = outcome.in_library.len(),
        to_add = outcome.to_add.len(),
        "Seeded list collection"
    );
    Ok(Some(outcome.name))
}

async fn log_status(service: &CollectionService) {
    let records = service.collections_status().await;
    let count = |status: CollectionStatus| records.iter().filter(|r| r.status == status).count();
    info!(
        operation = "status",
        collections = records.len(),
        in_progress = count(CollectionStatus::InProgress),
        complete = count(CollectionStatus::Complete),
        stalled = count(CollectionStatus::Stalled),
        "Collection status"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_seed_file_parses_collections_and_lists() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [[collection]]
            name = "Favorites"
            titles = ["Dune (2021)", "Arrival (2016)"]

            [[list]]
            url = "https://letterboxd.com/someone/list/korean-cinema/"
            library_only = true
            "#
        )
        .unwrap();

        let seed = SeedFile::load(file.path()).unwrap();
        assert_eq!(seed.collections.len(), 1);
        assert_eq!(seed.collections[0].titles.len(), 2);
        assert_eq!(seed.lists[0].name, None);
        assert!(seed.lists[0].library_only);
    }

    #[test]
    fn test_empty_seed_file() {
        let seed: SeedFile = toml::from_str("").unwrap();
        assert_eq!(seed, SeedFile::default());
    }

    fn collection(name: &str, titles: &[&str]) -> SeedCollection {
        SeedCollection {
            name: name.to_string(),
            titles: titles.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn list(url: &str, library_only: bool) -> SeedList {
        SeedList {
            url: url.to_string(),
            name: None,
            library_only,
        }
    }

    #[test]
    fn test_unchanged_seed_has_no_changes() {
        let seed = SeedFile {
            collections: vec![collection("Favorites", &["Dune (2021)"])],
            lists: vec![list("https://letterboxd.com/a/list/b/", false)],
        };
        assert!(seed.clone().changes_since(&seed).is_empty());
    }

    #[test]
    fn test_removed_entries_are_reported() {
        let previous = SeedFile {
            collections: vec![
                collection("Favorites", &["Dune (2021)"]),
                collection("Heist", &["Heat (1995)"]),
            ],
            lists: vec![list("https://letterboxd.com/a/list/b/", false)],
        };
        let current = SeedFile {
            collections: vec![collection("Favorites", &["Dune (2021)"])],
            lists: Vec::new(),
        };

        let changes = current.changes_since(&previous);
        assert_eq!(changes.removed_collections, vec!["Heist".to_string()]);
        assert_eq!(changes.removed_lists, vec!["https://letterboxd.com/a/list/b/".to_string()]);
        assert_eq!(changes.apply, SeedFile::default());
    }

    #[test]
    fn test_edited_entries_are_reapplied() {
        let url = "https://letterboxd.com/a/list/b/";
        let previous = SeedFile {
            collections: vec![collection("Favorites", &["Dune (2021)"])],
            lists: vec![list(url, false)],
        };
        let current = SeedFile {
            collections: vec![
                collection("Favorites", &["Dune (2021)", "Arrival (2016)"]),
                collection("New", &["Heat (1995)"]),
            ],
            lists: vec![list(url, true)],
        };

        let changes = current.changes_since(&previous);
        // Same name: rebuilt in place, not deleted
        assert!(changes.removed_collections.is_empty());
        assert_eq!(changes.apply.collections, current.collections);
        // Different options: the old list collection goes, the new one is created
        assert_eq!(changes.removed_lists, vec![url.to_string()]);
        assert_eq!(changes.apply.lists, vec![list(url, true)]);
    }

    #[test]
    fn test_seed_file_reload_sees_edits() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[[collection]]\nname = \"Favorites\"\ntitles = [\"Dune (2021)\"]\n").unwrap();
        let first = SeedFile::load(file.path()).unwrap();

        std::fs::write(file.path(), "").unwrap();
        let second = SeedFile::load(file.path()).unwrap();

        let changes = second.changes_since(&first);
        assert_eq!(changes.removed_collections, vec!["Favorites".to_string()]);
    }

    #[test]
    fn test_missing_seed_file_is_an_error() {
        assert!(SeedFile::load(Path::new("/nonexistent/seed.toml")).is_err());
    }
}
