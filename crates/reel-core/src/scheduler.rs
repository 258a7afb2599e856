use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reel_config::ReconciliationConfig;
use reel_models::{CollectionStatus, MovieReference};
use reel_sources::{LibraryService, ListProvider};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatch::AcquisitionDispatcher;
use crate::error::Result;
use crate::lookup::LibraryLookup;
use crate::membership::MembershipCache;
use crate::registry::CollectionRegistry;
use crate::resolver::IdentityResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// One-shot completion check
    Check,
    /// Recurring external list re-sync
    Resync,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// The record no longer exists
    Missing,
    /// Another check for the same collection was still running
    Skipped,
    Complete,
    Rescheduled(DateTime<Utc>),
    Stalled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResyncOutcome {
    Missing,
    Synced {
        attached: Vec<String>,
        new_titles: Vec<String>,
        dispatched: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub check_interval: Duration,
    /// `None` keeps checking forever
    pub max_checks: Option<u32>,
    /// Six-field cron expression (with seconds)
    pub resync_schedule: String,
}

impl SchedulerSettings {
    pub fn from_config(config: &ReconciliationConfig) -> Self {
        Self {
            check_interval: Duration::from_secs(config.check_interval_secs),
            max_checks: config.max_checks_limit(),
            resync_schedule: config.resync_schedule.clone(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&ReconciliationConfig::default())
    }
}

/// Shared services a reconciliation pass works with
pub struct SchedulerServices {
    pub registry: Arc<CollectionRegistry>,
    pub resolver: Arc<IdentityResolver>,
    pub lookup: Arc<LibraryLookup>,
    pub membership: Arc<MembershipCache>,
    pub library: Arc<dyn LibraryService>,
    pub lists: Arc<dyn ListProvider>,
    pub dispatcher: Arc<AcquisitionDispatcher>,
}

/// Marks a collection as being checked until dropped
struct InFlightGuard<'a> {
    running: &'a StdMutex<HashSet<String>>,
    name: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(running: &'a StdMutex<HashSet<String>>, name: &str) -> Option<Self> {
        let inserted = running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string());
        inserted.then(|| Self {
            running,
            name: name.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.name);
    }
}

/// Drives collections from "requested" to "complete" with scheduled jobs
///
/// Each collection has at most one pending job per `JobKind`: scheduling
/// again under the same name replaces the previous job.
pub struct ReconciliationScheduler {
    scheduler: JobScheduler,
    services: SchedulerServices,
    settings: SchedulerSettings,
    jobs: Mutex<HashMap<(String, JobKind), Uuid>>,
    running: StdMutex<HashSet<String>>,
    this: Weak<Self>,
}

impl ReconciliationScheduler {
    pub async fn new(services: SchedulerServices, settings: SchedulerSettings) -> Result<Arc<Self>> {
        let scheduler = JobScheduler::new().await?;

        Ok(Arc::new_cyclic(|this| Self {
            scheduler,
            services,
            settings,
            jobs: Mutex::new(HashMap::new()),
            running: StdMutex::new(HashSet::new()),
            this: this.clone(),
        }))
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await?;
        info!(
            operation = "scheduler_started",
            check_interval_secs = self.settings.check_interval.as_secs(),
            resync_schedule = %self.settings.resync_schedule,
            "Reconciliation scheduler started"
        );
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler.shutdown().await?;
        info!(operation = "scheduler_stopped", "Reconciliation scheduler stopped");
        Ok(())
    }

    /// Schedule the next completion check, replacing any pending one
    pub async fn schedule_check(&self, name: &str) -> Result<DateTime<Utc>> {
        let delay = self.settings.check_interval;
        let job = self.check_job(name, delay)?;
        self.replace_job(name, JobKind::Check, job).await?;

        let next_check = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(60));
        self.services
            .registry
            .update(name, |record| record.next_check = Some(next_check))
            .await;

        debug!(
            operation = "check_scheduled",
            collection = name,
            next_check = %next_check,
            "Completion check scheduled"
        );
        Ok(next_check)
    }

    /// Register the recurring list re-sync, replacing any existing one
    pub async fn schedule_resync(&self, name: &str) -> Result<()> {
        let job = self.resync_job(name)?;
        self.replace_job(name, JobKind::Resync, job).await?;
        info!(
            operation = "resync_scheduled",
            collection = name,
            schedule = %self.settings.resync_schedule,
            "List re-sync scheduled"
        );
        Ok(())
    }

    /// Drop every pending job of a collection. Unknown names are fine.
    pub async fn cancel(&self, name: &str) {
        let check = self.forget(name, JobKind::Check).await;
        let resync = self.forget(name, JobKind::Resync).await;
        debug!(
            operation = "jobs_cancelled",
            collection = name,
            check = check,
            resync = resync,
            "Cancelled pending jobs"
        );
    }

    pub async fn pending_job(&self, name: &str, kind: JobKind) -> Option<Uuid> {
        self.jobs
            .lock()
            .await
            .get(&(name.to_string(), kind))
            .copied()
    }

    async fn replace_job(&self, name: &str, kind: JobKind, job: Job) -> Result<Uuid> {
        let mut jobs = self.jobs.lock().await;
        let key = (name.to_string(), kind);
        if let Some(previous) = jobs.remove(&key) {
            if let Err(e) = self.scheduler.remove(&previous).await {
                debug!(collection = name, job = %previous, error = %e, "Previous job already gone");
            }
        }
        let id = self.scheduler.add(job).await?;
        jobs.insert(key, id);
        Ok(id)
    }

    pub(crate) async fn forget(&self, name: &str, kind: JobKind) -> bool {
        let mut jobs = self.jobs.lock().await;
        match jobs.remove(&(name.to_string(), kind)) {
            Some(id) => {
                if let Err(e) = self.scheduler.remove(&id).await {
                    debug!(collection = name, job = %id, error = %e, "Job already gone");
                }
                true
            }
            None => false,
        }
    }

    fn check_job(&self, name: &str, delay: Duration) -> Result<Job> {
        let this = self.this.clone();
        let name = name.to_string();
        let job = Job::new_one_shot_async(delay, move |_id, _scheduler| {
            let this = this.clone();
            let name = name.clone();
            Box::pin(async move {
                let Some(this) = this.upgrade() else { return };
                if let Err(e) = this.run_check(&name).await {
                    error!(operation = "collection_check", collection = %name, error = %e, "Check failed");
                }
            })
        })?;
        Ok(job)
    }

    fn resync_job(&self, name: &str) -> Result<Job> {
        let this = self.this.clone();
        let name = name.to_string();
        let job = Job::new_async(self.settings.resync_schedule.as_str(), move |_id, _scheduler| {
            let this = this.clone();
            let name = name.clone();
            Box::pin(async move {
                let Some(this) = this.upgrade() else { return };
                if let Err(e) = this.run_resync(&name).await {
                    error!(operation = "list_resync", collection = %name, error = %e, "Re-sync failed");
                }
            })
        })?;
        Ok(job)
    }

    /// One reconciliation pass over the collection's unconfirmed titles
    pub async fn run_check(&self, name: &str) -> Result<CheckOutcome> {
        let Some(_guard) = InFlightGuard::acquire(&self.running, name) else {
            debug!(operation = "collection_check", collection = name, "Check already running, skipping");
            return Ok(CheckOutcome::Skipped);
        };

        let registry = &self.services.registry;
        let Some(snapshot) = registry.get(name).await else {
            self.forget(name, JobKind::Check).await;
            debug!(operation = "collection_check", collection = name, "Collection is gone");
            return Ok(CheckOutcome::Missing);
        };

        let pending = snapshot.pending();
        info!(
            operation = "collection_check",
            collection = name,
            pending = pending.len(),
            added = snapshot.added_count,
            total = snapshot.total_count,
            "Checking collection"
        );

        for title in &pending {
            let Some(external_id) = self.services.resolver.resolve(title).await else {
                warn!(collection = name, title = %title, "Couldn't resolve an identifier");
                continue;
            };
            let Some(entry) = self.services.lookup.find_entry(title, &external_id).await else {
                debug!(collection = name, title = %title, external_id = %external_id, "Not in the library yet");
                continue;
            };
            // Deletion may have landed while resolving; attaching would recreate the grouping
            if !registry.contains(name).await {
                self.forget(name, JobKind::Check).await;
                info!(operation = "collection_check", collection = name, "Collection deleted during check");
                return Ok(CheckOutcome::Missing);
            }
            if let Err(e) = self.services.library.attach(&entry, name).await {
                warn!(collection = name, title = %title, error = %e, "Attaching to the collection failed");
                continue;
            }
            self.services.membership.invalidate(title, &external_id);
            if registry.update(name, |record| record.confirm(title)).await.is_none() {
                info!(operation = "collection_check", collection = name, "Collection deleted during check");
                return Ok(CheckOutcome::Missing);
            }
            info!(collection = name, title = %title, library_title = %entry.title, "Added to collection");
        }

        let max_checks = self.settings.max_checks;
        let outcome = registry
            .update(name, |record| {
                record.refresh_status();
                if record.status == CollectionStatus::Complete {
                    return CheckOutcome::Complete;
                }
                record.checks_run += 1;
                if max_checks.is_some_and(|limit| record.checks_run >= limit) {
                    record.status = CollectionStatus::Stalled;
                    record.next_check = None;
                    return CheckOutcome::Stalled;
                }
                CheckOutcome::Rescheduled(Utc::now())
            })
            .await;

        match outcome {
            None => Ok(CheckOutcome::Missing),
            Some(CheckOutcome::Complete) => {
                self.forget(name, JobKind::Check).await;
                info!(operation = "collection_complete", collection = name, "Collection complete");
                Ok(CheckOutcome::Complete)
            }
            Some(CheckOutcome::Stalled) => {
                self.forget(name, JobKind::Check).await;
                warn!(
                    operation = "collection_stalled",
                    collection = name,
                    checks = max_checks.unwrap_or_default(),
                    "Giving up on collection after the configured number of checks"
                );
                Ok(CheckOutcome::Stalled)
            }
            Some(_) => {
                let next_check = self.schedule_check(name).await?;
                Ok(CheckOutcome::Rescheduled(next_check))
            }
        }
    }

    /// Refresh an external-list collection from its source
    pub async fn run_resync(&self, name: &str) -> Result<ResyncOutcome> {
        let registry = &self.services.registry;
        let Some(snapshot) = registry.get(name).await else {
            self.forget(name, JobKind::Resync).await;
            return Ok(ResyncOutcome::Missing);
        };
        let Some(url) = snapshot.source_url.clone() else {
            warn!(operation = "list_resync", collection = name, "Collection has no source list");
            self.forget(name, JobKind::Resync).await;
            return Ok(ResyncOutcome::Missing);
        };

        let titles = self.services.lists.fetch_titles(&url).await?;
        info!(
            operation = "list_resync",
            collection = name,
            listed = titles.len(),
            "Re-syncing collection from {}",
            self.services.lists.provider_name()
        );

        let mut attached = Vec::new();
        for title in &titles {
            if snapshot.is_confirmed(title) {
                continue;
            }
            let reference = MovieReference::parse(title);
            let Some(entry) = self
                .services
                .lookup
                .find_by_title_year(&reference.title, reference.year)
                .await
            else {
                continue;
            };
            if !registry.contains(name).await {
                self.forget(name, JobKind::Resync).await;
                info!(operation = "list_resync", collection = name, "Collection deleted during re-sync");
                return Ok(ResyncOutcome::Missing);
            }
            match self.services.library.attach(&entry, name).await {
                Ok(()) => {
                    self.services.membership.clear();
                    attached.push(title.clone());
                }
                Err(e) => warn!(collection = name, title = %title, error = %e, "Attaching to the collection failed"),
            }
        }

        let updated = registry
            .update(name, |record| {
                let new_titles = record.extend_movies(&titles);
                for title in &attached {
                    record.confirm(title);
                }
                record.last_updated = Utc::now();
                record.refresh_status();
                if record.status == CollectionStatus::Stalled && !new_titles.is_empty() {
                    record.reopen();
                }
                let needs_check = record.status == CollectionStatus::InProgress;
                (new_titles, needs_check)
            })
            .await;
        let Some((new_titles, needs_check)) = updated else {
            return Ok(ResyncOutcome::Missing);
        };

        let missing: Vec<String> = new_titles
            .iter()
            .filter(|title| !attached.contains(title))
            .cloned()
            .collect();
        let dispatched = if missing.is_empty() {
            Vec::new()
        } else {
            self.services.dispatcher.dispatch(&missing).await
        };

        if needs_check && self.pending_job(name, JobKind::Check).await.is_none() {
            self.schedule_check(name).await?;
        }

        info!(
            operation = "list_resync",
            collection = name,
            attached = attached.len(),
            new_titles = new_titles.len(),
            dispatched = dispatched.len(),
            "Re-sync finished"
        );
        Ok(ResyncOutcome::Synced {
            attached,
            new_titles,
            dispatched,
        })
    }
}
