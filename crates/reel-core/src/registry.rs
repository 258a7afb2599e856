use std::collections::HashMap;

use reel_models::CollectionRecord;
use tokio::sync::RwLock;

/// In-memory store of collection records, keyed by collection name
///
/// Callers only ever see clones; every mutation goes through `update`, which
/// is a no-op for names that are no longer registered.
#[derive(Default)]
pub struct CollectionRegistry {
    records: RwLock<HashMap<String, CollectionRecord>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record`, returning the record it replaced
    pub async fn insert(&self, record: CollectionRecord) -> Option<CollectionRecord> {
        self.records
            .write()
            .await
            .insert(record.name.clone(), record)
    }

    pub async fn get(&self, name: &str) -> Option<CollectionRecord> {
        self.records.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.records.read().await.contains_key(name)
    }

    /// Snapshot of every record, sorted by name
    pub async fn list(&self) -> Vec<CollectionRecord> {
        let mut records: Vec<CollectionRecord> =
            self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    pub async fn update<F, R>(&self, name: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut CollectionRecord) -> R,
    {
        self.records.write().await.get_mut(name).map(f)
    }

    pub async fn remove(&self, name: &str) -> Option<CollectionRecord> {
        self.records.write().await.remove(name)
    }
}
