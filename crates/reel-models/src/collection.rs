use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reconciliation state of a collection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStatus {
    /// Waiting for one or more movies to show up in the library
    InProgress,
    /// Every movie is attached to the library grouping
    Complete,
    /// Gave up after the configured number of checks
    Stalled,
}

/// Where the collection's titles came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionSource {
    AdHoc,
    ExternalList,
}

/// A title from an external list, annotated with library presence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListedMovie {
    pub title: String,
    pub in_library: bool,
}

/// State tracked for one collection while it is being materialized
///
/// `confirmed` holds the titles already attached to the library grouping;
/// `added_count` and `total_count` are kept in step with `confirmed` and
/// `movies` by the mutating methods below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionRecord {
    pub name: String,
    pub movies: Vec<String>,
    #[serde(default)]
    pub confirmed: Vec<String>,
    pub added_count: usize,
    pub total_count: usize,
    pub status: CollectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checks_run: u32,
    pub source: CollectionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl CollectionRecord {
    pub fn new_ad_hoc(name: impl Into<String>, movies: Vec<String>) -> Self {
        Self::new(name.into(), dedup(movies), CollectionSource::AdHoc, None)
    }

    pub fn new_external(name: impl Into<String>, movies: Vec<String>, url: impl Into<String>) -> Self {
        Self::new(
            name.into(),
            dedup(movies),
            CollectionSource::ExternalList,
            Some(url.into()),
        )
    }

    fn new(name: String, movies: Vec<String>, source: CollectionSource, source_url: Option<String>) -> Self {
        let total_count = movies.len();
        let mut record = Self {
            name,
            movies,
            confirmed: Vec::new(),
            added_count: 0,
            total_count,
            status: CollectionStatus::InProgress,
            next_check: None,
            checks_run: 0,
            source,
            source_url,
            last_updated: Utc::now(),
        };
        record.refresh_status();
        record
    }

    pub fn is_confirmed(&self, title: &str) -> bool {
        self.confirmed.iter().any(|t| t == title)
    }

    /// Titles not yet attached to the library grouping, in list order
    pub fn pending(&self) -> Vec<String> {
        self.movies
            .iter()
            .filter(|title| !self.is_confirmed(title))
            .cloned()
            .collect()
    }

    pub fn is_fully_confirmed(&self) -> bool {
        self.movies.iter().all(|title| self.is_confirmed(title))
    }

    /// Mark a title as attached. Unknown or already confirmed titles are ignored.
    pub fn confirm(&mut self, title: &str) -> bool {
        if self.is_confirmed(title) || !self.movies.iter().any(|t| t == title) {
            return false;
        }
        self.confirmed.push(title.to_string());
        self.added_count = self.confirmed.len();
        self.last_updated = Utc::now();
        true
    }

    /// Append titles that are not yet part of the collection, returning the new ones
    pub fn extend_movies(&mut self, titles: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for title in titles {
            if !self.movies.iter().any(|t| t == title) {
                self.movies.push(title.clone());
                added.push(title.clone());
            }
        }
        self.total_count = self.movies.len();
        if !added.is_empty() {
            self.last_updated = Utc::now();
        }
        added
    }

    /// Complete when everything is confirmed; a record with pending titles
    /// returns to `InProgress` even if it had completed or stalled before.
    pub fn refresh_status(&mut self) {
        if self.is_fully_confirmed() {
            self.status = CollectionStatus::Complete;
            self.next_check = None;
        } else if self.status == CollectionStatus::Complete {
            self.status = CollectionStatus::InProgress;
        }
    }

    pub fn reopen(&mut self) {
        if !self.is_fully_confirmed() {
            self.status = CollectionStatus::InProgress;
            self.checks_run = 0;
        }
    }
}

fn dedup(movies: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(movies.len());
    for movie in movies {
        if !unique.contains(&movie) {
            unique.push(movie);
        }
    }
    unique
}
