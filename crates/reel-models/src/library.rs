use serde::{Deserialize, Serialize};

/// A movie as stored in the media library
///
/// `key` is the library's own identifier for the entry (the Plex rating key),
/// `external_ids` are the raw GUID strings the library attaches to it,
/// e.g. `imdb://tt1160419` or `tmdb://438631`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryEntry {
    pub key: String,
    pub title: String,
    pub year: Option<u32>,
    #[serde(default)]
    pub external_ids: Vec<String>,
}

impl LibraryEntry {
    /// Check whether any attached GUID refers to `external_id`
    pub fn has_external_id(&self, external_id: &str) -> bool {
        self.external_ids
            .iter()
            .any(|guid| matches_external_id(guid, external_id))
    }

    /// IMDb ids attached to this entry, without the `imdb://` scheme
    pub fn imdb_ids(&self) -> impl Iterator<Item = &str> {
        self.external_ids
            .iter()
            .filter_map(|guid| guid.strip_prefix("imdb://"))
    }
}

/// Compare a library GUID against a bare external identifier
///
/// Plex exposes IMDb ids as `imdb://tt0133093` while the reference index
/// returns `tt0133093`; both forms are accepted.
pub fn matches_external_id(guid: &str, external_id: &str) -> bool {
    if external_id.is_empty() {
        return false;
    }
    guid == external_id || guid.strip_prefix("imdb://") == Some(external_id)
}

/// Classification the reference index attaches to a search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TitleKind {
    FeatureFilm,
    TvSeries,
    TvMovie,
    Short,
    Video,
    Other(String),
}

impl TitleKind {
    /// Map the index's raw kind label to a `TitleKind`
    pub fn from_label(label: &str) -> Self {
        match label {
            "movie" | "feature" => TitleKind::FeatureFilm,
            "tvSeries" | "tvMiniSeries" | "TV series" | "TV mini-series" => TitleKind::TvSeries,
            "tvMovie" | "TV movie" => TitleKind::TvMovie,
            "short" | "tvShort" => TitleKind::Short,
            "video" => TitleKind::Video,
            other => TitleKind::Other(other.to_string()),
        }
    }

    pub fn is_feature_film(&self) -> bool {
        matches!(self, TitleKind::FeatureFilm)
    }
}

/// One candidate returned by the reference index, in index order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexHit {
    pub id: String,
    pub kind: TitleKind,
    pub title: String,
    pub year: Option<u32>,
}
