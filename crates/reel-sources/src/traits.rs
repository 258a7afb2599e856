use async_trait::async_trait;
use reel_models::{AcquisitionRecord, IndexHit, LibraryEntry};

use crate::error::Result;

/// Public movie database used to turn a title into a stable external id
#[async_trait]
pub trait ReferenceIndex: Send + Sync {
    fn index_name(&self) -> &str;

    /// Search hits in the index's own relevance order
    async fn search(&self, query: &str) -> Result<Vec<IndexHit>>;
}

/// The media library that holds the files and the named groupings
#[async_trait]
pub trait LibraryService: Send + Sync {
    fn service_name(&self) -> &str;

    /// Title search restricted to the managed movie section
    async fn search(&self, title: &str, year: Option<u32>) -> Result<Vec<LibraryEntry>>;

    /// Every movie in the managed section, with external ids attached
    async fn enumerate_all(&self) -> Result<Vec<LibraryEntry>>;

    /// Tag one entry with the grouping name
    async fn attach(&self, entry: &LibraryEntry, grouping: &str) -> Result<()>;

    /// Create (or extend) a grouping from a batch of entries
    async fn create_grouping(&self, name: &str, entries: &[LibraryEntry]) -> Result<()>;

    /// Remove the grouping itself. The movies stay in the library.
    async fn delete_grouping(&self, name: &str) -> Result<()>;
}

/// Download manager that fetches movies missing from the library
#[async_trait]
pub trait AcquisitionService: Send + Sync {
    fn service_name(&self) -> &str;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<AcquisitionRecord>>;

    async fn set_monitored(&self, record: &AcquisitionRecord) -> Result<()>;

    /// Add a new monitored movie and start searching for it
    async fn submit(
        &self,
        external_id: &str,
        root_folder: &str,
        quality_profile: &str,
    ) -> Result<AcquisitionRecord>;
}

/// Public curated list site
#[async_trait]
pub trait ListProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    fn accepts(&self, url: &str) -> bool;

    /// Titles in list order, formatted `Title (Year)` when a year is known
    async fn fetch_titles(&self, url: &str) -> Result<Vec<String>>;

    async fn fetch_list_name(&self, url: &str) -> Result<String>;
}
