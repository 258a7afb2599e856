//! In-memory stand-ins for the external services, shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reel_models::{AcquisitionRecord, IndexHit, LibraryEntry, TitleKind};
use reel_sources::{
    AcquisitionService, LibraryService, ListProvider, ReferenceIndex, Result, SourceError,
};

pub fn hit(id: &str, kind: TitleKind) -> IndexHit {
    IndexHit {
        id: id.to_string(),
        kind,
        title: String::new(),
        year: None,
    }
}

pub fn entry(key: &str, title: &str, year: Option<u32>, imdb_id: &str) -> LibraryEntry {
    LibraryEntry {
        key: key.to_string(),
        title: title.to_string(),
        year,
        external_ids: vec![format!("imdb://{}", imdb_id)],
    }
}

fn unavailable(service: &'static str) -> SourceError {
    SourceError::Status {
        service,
        status: 503,
        message: "unavailable".to_string(),
    }
}

#[derive(Default)]
pub struct FakeIndex {
    hits: Mutex<HashMap<String, Vec<IndexHit>>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl FakeIndex {
    pub fn add(&self, query: &str, hits: Vec<IndexHit>) {
        self.hits.lock().unwrap().insert(query.to_string(), hits);
    }

    /// Register `query` as a feature film with `id`
    pub fn film(&self, query: &str, id: &str) {
        self.add(query, vec![hit(id, TitleKind::FeatureFilm)]);
    }

    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReferenceIndex for FakeIndex {
    fn index_name(&self) -> &str {
        "fake-index"
    }

    async fn search(&self, query: &str) -> Result<Vec<IndexHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable("fake-index"));
        }
        Ok(self.hits.lock().unwrap().get(query).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeLibrary {
    entries: Mutex<Vec<LibraryEntry>>,
    /// Entries that exist but never show up in title search
    unsearchable: Mutex<HashSet<String>>,
    failing_attach: Mutex<HashSet<String>>,
    pub groupings: Mutex<HashMap<String, Vec<String>>>,
    pub deleted: Mutex<Vec<String>>,
    search_calls: AtomicUsize,
    enumerate_calls: AtomicUsize,
    failing: AtomicBool,
}

impl FakeLibrary {
    pub fn add(&self, entry: LibraryEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn add_unsearchable(&self, entry: LibraryEntry) {
        self.unsearchable.lock().unwrap().insert(entry.key.clone());
        self.add(entry);
    }

    pub fn fail_attach(&self, key: &str) {
        self.failing_attach.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn grouping(&self, name: &str) -> Vec<String> {
        self.groupings
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn enumerate_calls(&self) -> usize {
        self.enumerate_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable("fake-library"));
        }
        Ok(())
    }

    fn tag(&self, name: &str, key: &str) {
        let mut groupings = self.groupings.lock().unwrap();
        let keys = groupings.entry(name.to_string()).or_default();
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
}

#[async_trait]
impl LibraryService for FakeLibrary {
    fn service_name(&self) -> &str {
        "fake-library"
    }

    async fn search(&self, title: &str, year: Option<u32>) -> Result<Vec<LibraryEntry>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let needle = title.to_lowercase();
        let unsearchable = self.unsearchable.lock().unwrap().clone();
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !unsearchable.contains(&e.key))
            .filter(|e| e.title.to_lowercase().contains(&needle))
            .filter(|e| year.is_none() || e.year == year)
            .cloned()
            .collect())
    }

    async fn enumerate_all(&self) -> Result<Vec<LibraryEntry>> {
        self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn attach(&self, entry: &LibraryEntry, grouping: &str) -> Result<()> {
        self.check_available()?;
        if self.failing_attach.lock().unwrap().contains(&entry.key) {
            return Err(unavailable("fake-library"));
        }
        self.tag(grouping, &entry.key);
        Ok(())
    }

    async fn create_grouping(&self, name: &str, entries: &[LibraryEntry]) -> Result<()> {
        self.check_available()?;
        for entry in entries {
            self.tag(name, &entry.key);
        }
        Ok(())
    }

    async fn delete_grouping(&self, name: &str) -> Result<()> {
        self.check_available()?;
        self.groupings.lock().unwrap().remove(name);
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeAcquisition {
    records: Mutex<HashMap<String, AcquisitionRecord>>,
    rejected: Mutex<HashSet<String>>,
    pub submitted: Mutex<Vec<String>>,
    pub promoted: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl FakeAcquisition {
    pub fn existing(&self, external_id: &str, monitored: bool) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        self.records.lock().unwrap().insert(
            external_id.to_string(),
            AcquisitionRecord {
                id,
                external_id: external_id.to_string(),
                title: external_id.to_string(),
                monitored,
            },
        );
    }

    pub fn reject(&self, external_id: &str) {
        self.rejected.lock().unwrap().insert(external_id.to_string());
    }

    pub fn is_monitored(&self, external_id: &str) -> bool {
        self.records
            .lock()
            .unwrap()
            .get(external_id)
            .map(|r| r.monitored)
            .unwrap_or(false)
    }
}

#[async_trait]
impl AcquisitionService for FakeAcquisition {
    fn service_name(&self) -> &str {
        "fake-acquisition"
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<AcquisitionRecord>> {
        Ok(self.records.lock().unwrap().get(external_id).cloned())
    }

    async fn set_monitored(&self, record: &AcquisitionRecord) -> Result<()> {
        if let Some(stored) = self.records.lock().unwrap().get_mut(&record.external_id) {
            stored.monitored = true;
        }
        self.promoted.lock().unwrap().push(record.external_id.clone());
        Ok(())
    }

    async fn submit(
        &self,
        external_id: &str,
        _root_folder: &str,
        _quality_profile: &str,
    ) -> Result<AcquisitionRecord> {
        if self.rejected.lock().unwrap().contains(external_id) {
            return Err(SourceError::Status {
                service: "fake-acquisition",
                status: 400,
                message: "validation failed".to_string(),
            });
        }
        self.submitted.lock().unwrap().push(external_id.to_string());
        self.existing(external_id, true);
        Ok(self.records.lock().unwrap()[external_id].clone())
    }
}

#[derive(Default)]
pub struct FakeLists {
    lists: Mutex<HashMap<String, (String, Vec<String>)>>,
}

impl FakeLists {
    pub fn set(&self, url: &str, name: &str, titles: &[&str]) {
        self.lists.lock().unwrap().insert(
            url.to_string(),
            (name.to_string(), titles.iter().map(|t| t.to_string()).collect()),
        );
    }
}

#[async_trait]
impl ListProvider for FakeLists {
    fn provider_name(&self) -> &str {
        "fake-lists"
    }

    fn accepts(&self, url: &str) -> bool {
        url.starts_with("https://letterboxd.com/")
    }

    async fn fetch_titles(&self, url: &str) -> Result<Vec<String>> {
        self.lists
            .lock()
            .unwrap()
            .get(url)
            .map(|(_, titles)| titles.clone())
            .ok_or_else(|| SourceError::NotFound(url.to_string()))
    }

    async fn fetch_list_name(&self, url: &str) -> Result<String> {
        self.lists
            .lock()
            .unwrap()
            .get(url)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| SourceError::NotFound(url.to_string()))
    }
}
