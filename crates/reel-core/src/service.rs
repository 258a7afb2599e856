use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reel_config::Config;
use reel_models::{CollectionRecord, CollectionSource, ListedMovie, MovieReference};
use reel_sources::{LibraryService, ListProvider, SourceSet};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::candidates::{Candidate, CandidateMode, CandidateVerifier};
use crate::dispatch::AcquisitionDispatcher;
use crate::error::{CuratorError, Result};
use crate::lookup::LibraryLookup;
use crate::membership::MembershipCache;
use crate::registry::CollectionRegistry;
use crate::resolver::IdentityResolver;
use crate::scheduler::{JobKind, ReconciliationScheduler, SchedulerServices, SchedulerSettings};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildOutcome {
    pub collection_name: String,
    pub movies_already_present: Vec<String>,
    pub movies_dispatched: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListPreview {
    pub collection_name: String,
    pub movies: Vec<ListedMovie>,
    pub source_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaterializeOutcome {
    pub name: String,
    pub in_library: Vec<String>,
    pub to_add: Vec<String>,
    pub dispatched: Vec<String>,
}

/// Entry point for every collection operation
pub struct CollectionService {
    registry: Arc<CollectionRegistry>,
    scheduler: Arc<ReconciliationScheduler>,
    resolver: Arc<IdentityResolver>,
    lookup: Arc<LibraryLookup>,
    membership: Arc<MembershipCache>,
    dispatcher: Arc<AcquisitionDispatcher>,
    verifier: CandidateVerifier,
    library: Arc<dyn LibraryService>,
    lists: Arc<dyn ListProvider>,
    workers: usize,
}

impl CollectionService {
    pub async fn new(sources: SourceSet, config: &Config) -> Result<Self> {
        let settings = &config.reconciliation;

        let resolver = Arc::new(IdentityResolver::new(
            sources.index.clone(),
            Duration::from_millis(settings.resolve_delay_ms),
        ));
        let lookup = Arc::new(LibraryLookup::new(
            sources.library.clone(),
            Duration::from_secs(settings.library_index_ttl_secs),
        ));
        let membership = Arc::new(MembershipCache::new(lookup.clone(), settings.cache_capacity));
        let dispatcher = Arc::new(AcquisitionDispatcher::new(
            resolver.clone(),
            sources.acquisition.clone(),
            membership.clone(),
            config.radarr.root_folder.as_str(),
            config.radarr.quality_profile.as_str(),
        ));
        let verifier = CandidateVerifier::new(resolver.clone(), membership.clone(), settings.verify_workers);
        let registry = Arc::new(CollectionRegistry::new());

        let scheduler = ReconciliationScheduler::new(
            SchedulerServices {
                registry: registry.clone(),
                resolver: resolver.clone(),
                lookup: lookup.clone(),
                membership: membership.clone(),
                library: sources.library.clone(),
                lists: sources.lists.clone(),
                dispatcher: dispatcher.clone(),
            },
            SchedulerSettings::from_config(settings),
        )
        .await?;

        Ok(Self {
            registry,
            scheduler,
            resolver,
            lookup,
            membership,
            dispatcher,
            verifier,
            library: sources.library,
            lists: sources.lists,
            workers: settings.verify_workers.max(1),
        })
    }

    pub fn scheduler(&self) -> &Arc<ReconciliationScheduler> {
        &self.scheduler
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler.shutdown().await
    }

    /// Register an ad hoc collection, attach the titles the library already has,
    /// dispatch the rest and schedule a completion check while any are pending
    pub async fn build_collection(&self, name: &str, titles: &[String]) -> Result<BuildOutcome> {
        let name = require_name(name)?;
        let titles = require_titles(titles)?;

        let mut record = CollectionRecord::new_ad_hoc(name, titles);
        let mut entries = Vec::new();
        let mut present = Vec::new();
        let mut missing = Vec::new();
        for title in &record.movies {
            let external_id = self.resolver.resolve(title).await;
            if !self.membership.is_present(title, external_id.as_deref()).await {
                missing.push(title.clone());
                continue;
            }
            let entry = match external_id.as_deref() {
                Some(id) => self.lookup.find_entry(title, id).await,
                None => None,
            };
            match entry {
                Some(entry) => {
                    entries.push(entry);
                    present.push(title.clone());
                }
                None => {
                    warn!(collection = name, title = %title, "Cached as present but not found, dispatching");
                    missing.push(title.clone());
                }
            }
        }

        if !entries.is_empty() {
            self.library.create_grouping(name, &entries).await?;
        }
        let dispatched = self.dispatcher.dispatch(&missing).await;
        self.membership.clear();

        for title in &present {
            record.confirm(title);
        }
        record.refresh_status();
        let complete = record.is_fully_confirmed();
        if let Some(previous) = self.registry.insert(record).await {
            if previous.source == CollectionSource::ExternalList {
                self.scheduler.forget(name, JobKind::Resync).await;
            }
        }
        if complete {
            self.scheduler.forget(name, JobKind::Check).await;
        } else {
            self.scheduler.schedule_check(name).await?;
        }

        info!(
            operation = "collection_built",
            collection = name,
            present = present.len(),
            dispatched = dispatched.len(),
            "Collection registered"
        );
        Ok(BuildOutcome {
            collection_name: name.to_string(),
            movies_already_present: present,
            movies_dispatched: dispatched,
        })
    }

    /// Fetch an external list and report which titles the library already has
    pub async fn import_list(&self, url: &str) -> Result<ListPreview> {
        let url = self.require_list_url(url)?;

        let titles = self.lists.fetch_titles(url).await?;
        let collection_name = self.lists.fetch_list_name(url).await?;

        let movies: Vec<ListedMovie> = stream::iter(titles)
            .map(|title| async move {
                let reference = MovieReference::parse(&title);
                let in_library = self
                    .lookup
                    .find_by_title_year(&reference.title, reference.year)
                    .await
                    .is_some();
                ListedMovie { title, in_library }
            })
            .buffered(self.workers)
            .collect()
            .await;

        info!(
            operation = "list_imported",
            collection = %collection_name,
            listed = movies.len(),
            in_library = movies.iter().filter(|m| m.in_library).count(),
            "Fetched list from {}",
            self.lists.provider_name()
        );
        Ok(ListPreview {
            collection_name,
            movies,
            source_url: url.to_string(),
        })
    }

    /// Create the library grouping for present titles, dispatch the rest and
    /// keep the collection in sync with its list
    pub async fn materialize_list(
        &self,
        name: &str,
        selected: &[ListedMovie],
        url: &str,
    ) -> Result<MaterializeOutcome> {
        let name = require_name(name)?;
        let url = self.require_list_url(url)?;
        if selected.is_empty() {
            return Err(CuratorError::InvalidRequest("no movies selected".to_string()));
        }

        let mut titles: Vec<String> = Vec::new();
        let mut entries = Vec::new();
        let mut in_library = Vec::new();
        let mut to_add = Vec::new();
        for movie in selected {
            if titles.contains(&movie.title) {
                continue;
            }
            titles.push(movie.title.clone());

            if !movie.in_library {
                to_add.push(movie.title.clone());
                continue;
            }
            let reference = MovieReference::parse(&movie.title);
            match self.lookup.find_by_title_year(&reference.title, reference.year).await {
                Some(entry) => {
                    entries.push(entry);
                    in_library.push(movie.title.clone());
                }
                None => {
                    warn!(collection = name, title = %movie.title, "Marked as in library but not found, dispatching");
                    to_add.push(movie.title.clone());
                }
            }
        }

        if !entries.is_empty() {
            self.library.create_grouping(name, &entries).await?;
        }
        let dispatched = self.dispatcher.dispatch(&to_add).await;

        let mut record = CollectionRecord::new_external(name, titles, url);
        for title in &in_library {
            record.confirm(title);
        }
        record.refresh_status();
        let complete = record.is_fully_confirmed();
        self.registry.insert(record).await;

        if complete {
            self.scheduler.forget(name, JobKind::Check).await;
        } else {
            self.scheduler.schedule_check(name).await?;
        }
        self.scheduler.schedule_resync(name).await?;

        info!(
            operation = "list_materialized",
            collection = name,
            in_library = in_library.len(),
            to_add = to_add.len(),
            dispatched = dispatched.len(),
            "Collection created from list"
        );
        Ok(MaterializeOutcome {
            name: name.to_string(),
            in_library,
            to_add,
            dispatched,
        })
    }

    /// Forget a collection and delete its library grouping.
    /// Returns whether a record existed; deleting twice is not an error.
    pub async fn delete_collection(&self, name: &str) -> Result<bool> {
        let name = require_name(name)?;

        self.scheduler.cancel(name).await;
        let existed = self.registry.remove(name).await.is_some();
        self.library.delete_grouping(name).await?;

        info!(operation = "collection_deleted", collection = name, existed = existed, "Collection deleted");
        Ok(existed)
    }

    pub async fn collections_status(&self) -> Vec<CollectionRecord> {
        self.registry.list().await
    }

    pub async fn verify_candidates(
        &self,
        titles: &[String],
        mode: CandidateMode,
        limit: Option<usize>,
    ) -> Result<Vec<Candidate>> {
        let titles = require_titles(titles)?;
        Ok(self.verifier.verify(&titles, mode, limit).await)
    }

    pub async fn clear_cache(&self) {
        self.membership.clear();
        self.lookup.invalidate_index().await;
        info!(operation = "cache_cleared", "Library caches cleared");
    }

    fn require_list_url<'a>(&self, url: &'a str) -> Result<&'a str> {
        let url = url.trim();
        if url.is_empty() || !self.lists.accepts(url) {
            return Err(CuratorError::InvalidRequest(format!(
                "not a {} list URL: '{}'",
                self.lists.provider_name(),
                url
            )));
        }
        Ok(url)
    }
}

fn require_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CuratorError::InvalidRequest("missing collection name".to_string()));
    }
    Ok(name)
}

fn require_titles(titles: &[String]) -> Result<Vec<String>> {
    let titles: Vec<String> = titles
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    if titles.is_empty() {
        return Err(CuratorError::InvalidRequest("no movies given".to_string()));
    }
    Ok(titles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::CheckOutcome;
    use crate::testing::{entry, FakeAcquisition, FakeIndex, FakeLibrary, FakeLists};
    use reel_models::CollectionStatus;

    const LIST_URL: &str = "https://letterboxd.com/someone/list/bong/";

    struct Fixture {
        index: Arc<FakeIndex>,
        library: Arc<FakeLibrary>,
        lists: Arc<FakeLists>,
        acquisition: Arc<FakeAcquisition>,
        service: CollectionService,
    }

    async fn fixture() -> Fixture {
        let index = Arc::new(FakeIndex::default());
        let library = Arc::new(FakeLibrary::default());
        let lists = Arc::new(FakeLists::default());
        let acquisition = Arc::new(FakeAcquisition::default());

        let mut config = Config::default();
        config.reconciliation.resolve_delay_ms = 0;
        config.reconciliation.library_index_ttl_secs = 0;

        let sources = SourceSet {
            index: index.clone(),
            library: library.clone(),
            acquisition: acquisition.clone(),
            lists: lists.clone(),
        };
        let service = CollectionService::new(sources, &config).await.unwrap();

        Fixture {
            index,
            library,
            lists,
            acquisition,
            service,
        }
    }

    fn titles(items: &[&str]) -> Vec<String> {
        items.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_favorites_end_to_end() {
        let f = fixture().await;
        f.index.film("Dune (2021)", "tt1160419");
        f.index.film("Arrival (2016)", "tt2543164");
        f.library.add(entry("1", "Dune", Some(2021), "tt1160419"));

        let outcome = f
            .service
            .build_collection("Favorites", &titles(&["Dune (2021)", "Arrival (2016)"]))
            .await
            .unwrap();
        assert_eq!(outcome.movies_already_present, titles(&["Dune (2021)"]));
        assert_eq!(outcome.movies_dispatched, titles(&["Arrival (2016)"]));
        assert_eq!(*f.acquisition.submitted.lock().unwrap(), vec!["tt2543164".to_string()]);

        // Present titles are attached right away, no daemon needed
        assert_eq!(f.library.grouping("Favorites"), titles(&["1"]));
        let status = f.service.collections_status().await;
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].status, CollectionStatus::InProgress);
        assert_eq!(status[0].added_count, 1);
        assert!(status[0].next_check.is_some());

        let scheduler = f.service.scheduler();
        assert!(matches!(
            scheduler.run_check("Favorites").await.unwrap(),
            CheckOutcome::Rescheduled(_)
        ));
        assert_eq!(f.service.collections_status().await[0].added_count, 1);

        // The download finished and the library picked it up
        f.library.add(entry("2", "Arrival", Some(2016), "tt2543164"));
        assert_eq!(scheduler.run_check("Favorites").await.unwrap(), CheckOutcome::Complete);

        let record = &f.service.collections_status().await[0];
        assert_eq!(record.status, CollectionStatus::Complete);
        assert_eq!(record.added_count, 2);
        assert_eq!(record.total_count, 2);
        assert_eq!(f.library.grouping("Favorites"), titles(&["1", "2"]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_build_with_everything_present_completes_immediately() {
        let f = fixture().await;
        f.index.film("Dune (2021)", "tt1160419");
        f.index.film("Sicario (2015)", "tt3397884");
        f.library.add(entry("1", "Dune", Some(2021), "tt1160419"));
        f.library.add(entry("3", "Sicario", Some(2015), "tt3397884"));

        let outcome = f
            .service
            .build_collection("Villeneuve", &titles(&["Dune (2021)", "Sicario (2015)"]))
            .await
            .unwrap();
        assert!(outcome.movies_dispatched.is_empty());
        assert_eq!(f.library.grouping("Villeneuve"), titles(&["1", "3"]));
        assert!(f.acquisition.submitted.lock().unwrap().is_empty());

        let record = &f.service.collections_status().await[0];
        assert_eq!(record.status, CollectionStatus::Complete);
        assert_eq!(record.added_count, 2);
        assert!(f
            .service
            .scheduler()
            .pending_job("Villeneuve", JobKind::Check)
            .await
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rebuilding_same_name_keeps_one_check() {
        let f = fixture().await;
        f.service
            .build_collection("Favorites", &titles(&["Arrival (2016)"]))
            .await
            .unwrap();
        f.service
            .build_collection("Favorites", &titles(&["Sicario (2015)"]))
            .await
            .unwrap();

        let status = f.service.collections_status().await;
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].movies, titles(&["Sicario (2015)"]));
        assert!(f
            .service
            .scheduler()
            .pending_job("Favorites", JobKind::Check)
            .await
            .is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_parasite_list_scenario() {
        let f = fixture().await;
        f.library.add(entry("10", "Parasite", Some(2019), "tt6751668"));
        f.lists.set(LIST_URL, "Bong Joon-ho", &["Parasite (2019)"]);

        let preview = f.service.import_list(LIST_URL).await.unwrap();
        assert_eq!(preview.collection_name, "Bong Joon-ho");
        assert_eq!(
            preview.movies,
            vec![ListedMovie {
                title: "Parasite (2019)".to_string(),
                in_library: true
            }]
        );

        let outcome = f
            .service
            .materialize_list(&preview.collection_name, &preview.movies, &preview.source_url)
            .await
            .unwrap();
        assert_eq!(outcome.in_library, titles(&["Parasite (2019)"]));
        assert!(outcome.to_add.is_empty());
        assert_eq!(f.library.grouping("Bong Joon-ho"), titles(&["10"]));

        let record = &f.service.collections_status().await[0];
        assert_eq!(record.status, CollectionStatus::Complete);
        assert_eq!(record.source, CollectionSource::ExternalList);
        assert_eq!(record.source_url.as_deref(), Some(LIST_URL));

        let scheduler = f.service.scheduler();
        assert!(scheduler.pending_job("Bong Joon-ho", JobKind::Check).await.is_none());
        assert!(scheduler.pending_job("Bong Joon-ho", JobKind::Resync).await.is_some());

        // Completion does not retire the daily re-sync
        scheduler.run_resync("Bong Joon-ho").await.unwrap();
        assert!(scheduler.pending_job("Bong Joon-ho", JobKind::Resync).await.is_some());
        assert_eq!(f.service.collections_status().await[0].status, CollectionStatus::Complete);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_materialize_dispatches_missing_titles() {
        let f = fixture().await;
        f.index.film("Okja (2017)", "tt3967856");
        let selected = vec![ListedMovie {
            title: "Okja (2017)".to_string(),
            in_library: false,
        }];

        let outcome = f.service.materialize_list("Bong", &selected, LIST_URL).await.unwrap();
        assert_eq!(outcome.to_add, titles(&["Okja (2017)"]));
        assert_eq!(outcome.dispatched, titles(&["Okja (2017)"]));
        assert!(f.library.grouping("Bong").is_empty());

        let scheduler = f.service.scheduler();
        assert!(scheduler.pending_job("Bong", JobKind::Check).await.is_some());
        assert!(scheduler.pending_job("Bong", JobKind::Resync).await.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_is_idempotent_and_cancels_jobs() {
        let f = fixture().await;
        f.library.add(entry("10", "Parasite", Some(2019), "tt6751668"));
        let selected = vec![ListedMovie {
            title: "Parasite (2019)".to_string(),
            in_library: true,
        }];
        f.service.materialize_list("Bong", &selected, LIST_URL).await.unwrap();

        assert!(f.service.delete_collection("Bong").await.unwrap());
        assert!(!f.service.delete_collection("Bong").await.unwrap());

        let scheduler = f.service.scheduler();
        assert!(scheduler.pending_job("Bong", JobKind::Resync).await.is_none());
        assert!(f.service.collections_status().await.is_empty());
        assert!(f.library.grouping("Bong").is_empty());
        assert_eq!(scheduler.run_check("Bong").await.unwrap(), CheckOutcome::Missing);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_request_validation() {
        let f = fixture().await;

        let err = f.service.build_collection("  ", &titles(&["Dune (2021)"])).await.unwrap_err();
        assert!(matches!(err, CuratorError::InvalidRequest(_)));

        let err = f.service.build_collection("Empty", &titles(&["", " "])).await.unwrap_err();
        assert!(matches!(err, CuratorError::InvalidRequest(_)));

        let err = f.service.import_list("https://example.com/list/").await.unwrap_err();
        assert!(matches!(err, CuratorError::InvalidRequest(_)));

        let err = f.service.materialize_list("Bong", &[], LIST_URL).await.unwrap_err();
        assert!(matches!(err, CuratorError::InvalidRequest(_)));
        assert!(f.service.collections_status().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upstream_failure_surfaces_from_import() {
        let f = fixture().await;
        let err = f.service.import_list(LIST_URL).await.unwrap_err();
        assert!(matches!(err, CuratorError::Upstream(_)));
    }
}
