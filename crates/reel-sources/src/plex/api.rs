use reel_models::LibraryEntry;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::{ensure_success, Result, SourceError};

const SERVICE: &str = "plex";
const CLIENT_IDENTIFIER: &str = "reelcurator";

#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub key: String,
    pub type_: String,
    pub title: String,
}

/// Thin wrapper over the Plex Media Server HTTP API
pub struct PlexHttpClient {
    client: Client,
    server_url: String,
}

impl PlexHttpClient {
    pub fn new(token: &str, server_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("x-plex-token"),
            HeaderValue::from_str(token)
                .map_err(|_| SourceError::Configuration("invalid Plex token format".to_string()))?,
        );
        headers.insert(
            HeaderName::from_static("x-plex-client-identifier"),
            HeaderValue::from_static(CLIENT_IDENTIFIER),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!("Plex: GET {}", url);
        let response = self.client.get(url).send().await?;
        let json = ensure_success(SERVICE, response).await?.json().await?;
        Ok(json)
    }

    /// Server machine identifier, needed to build collection item URIs
    pub async fn get_machine_identifier(&self) -> Result<String> {
        let json = self.get_json(&format!("{}/identity", self.server_url)).await?;
        json.get("MediaContainer")
            .and_then(|mc| mc.get("machineIdentifier"))
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| SourceError::parse(SERVICE, "identity response without machineIdentifier"))
    }

    pub async fn get_libraries(&self) -> Result<Vec<LibraryInfo>> {
        let json = self
            .get_json(&format!("{}/library/sections", self.server_url))
            .await?;

        let libraries = directory_items(&json)
            .iter()
            .map(|dir| LibraryInfo {
                key: str_field(dir, "key"),
                type_: str_field(dir, "type"),
                title: str_field(dir, "title"),
            })
            .collect();

        Ok(libraries)
    }

    pub async fn get_movies(&self, library_key: &str) -> Result<Vec<LibraryEntry>> {
        let url = format!(
            "{}/library/sections/{}/all?type=1&includeGuids=1",
            self.server_url, library_key
        );
        let json = self.get_json(&url).await?;
        let movies = parse_entries(&json);
        debug!("Plex get_movies: {} movies in section {}", movies.len(), library_key);
        Ok(movies)
    }

    pub async fn search_movies(
        &self,
        library_key: &str,
        title: &str,
        year: Option<u32>,
    ) -> Result<Vec<LibraryEntry>> {
        let mut url = format!(
            "{}/library/sections/{}/all?type=1&includeGuids=1&title={}",
            self.server_url,
            library_key,
            urlencoding::encode(title)
        );
        if let Some(year) = year {
            url.push_str(&format!("&year={}", year));
        }

        let json = self.get_json(&url).await?;
        let results = parse_entries(&json);
        debug!(
            "Plex search: {} results for '{}' (year: {:?})",
            results.len(),
            title,
            year
        );
        Ok(results)
    }

    /// Collection tags currently on one movie
    pub async fn get_item_collections(&self, rating_key: &str) -> Result<Vec<String>> {
        let url = format!("{}/library/metadata/{}", self.server_url, rating_key);
        let json = self.get_json(&url).await?;
        Ok(metadata_items(&json)
            .first()
            .map(collection_tags)
            .unwrap_or_default())
    }

    /// Add a collection tag to one movie, creating the collection if needed.
    /// Plex replaces the whole tag list on edit, so the movie's current tags are re-sent.
    pub async fn add_collection_tag(
        &self,
        library_key: &str,
        rating_key: &str,
        collection: &str,
    ) -> Result<()> {
        let existing = self.get_item_collections(rating_key).await?;
        let Some(tags) = collection_tag_params(&existing, collection) else {
            debug!("Plex: {} already in collection '{}'", rating_key, collection);
            return Ok(());
        };

        let url = format!(
            "{}/library/sections/{}/all?type=1&id={}&{}&collection.locked=1",
            self.server_url, library_key, rating_key, tags
        );
        debug!(
            "Plex: tagging {} with collection '{}' ({} existing tags kept)",
            rating_key,
            collection,
            existing.len()
        );
        let response = self.client.put(&url).send().await?;
        ensure_success(SERVICE, response).await?;
        Ok(())
    }

    /// Create a static collection holding `rating_keys`
    pub async fn create_collection(
        &self,
        library_key: &str,
        machine_identifier: &str,
        title: &str,
        rating_keys: &[String],
    ) -> Result<()> {
        let uri = format!(
            "server://{}/com.plexapp.plugins.library/library/metadata/{}",
            machine_identifier,
            rating_keys.join(",")
        );
        let url = format!(
            "{}/library/collections?type=1&smart=0&sectionId={}&title={}&uri={}",
            self.server_url,
            library_key,
            urlencoding::encode(title),
            urlencoding::encode(&uri)
        );
        let response = self.client.post(&url).send().await?;
        ensure_success(SERVICE, response).await?;
        Ok(())
    }

    /// Rating key of the collection titled exactly `title`, if it exists
    pub async fn find_collection(&self, library_key: &str, title: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/library/sections/{}/collections?title={}",
            self.server_url,
            library_key,
            urlencoding::encode(title)
        );
        let json = self.get_json(&url).await?;
        Ok(find_collection_key(&json, title))
    }

    pub async fn delete_collection(&self, rating_key: &str) -> Result<()> {
        let url = format!("{}/library/collections/{}", self.server_url, rating_key);
        let response = self.client.delete(&url).send().await?;
        ensure_success(SERVICE, response).await?;
        Ok(())
    }
}

fn str_field(item: &Value, field: &str) -> String {
    item.get(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn directory_items(json: &Value) -> Vec<Value> {
    json.get("MediaContainer")
        .and_then(|mc| mc.get("Directory"))
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default()
}

fn metadata_items(json: &Value) -> &[Value] {
    json.get("MediaContainer")
        .and_then(|mc| mc.get("Metadata").or_else(|| mc.get("Video")))
        .and_then(|m| m.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn parse_guid_array(guid_value: &Value) -> Vec<String> {
    match guid_value {
        Value::Array(items) => items
            .iter()
            .filter_map(|guid| {
                guid.get("id")
                    .and_then(|id| id.as_str())
                    .or_else(|| guid.as_str())
                    .map(str::to_string)
            })
            .collect(),
        Value::Object(obj) => obj
            .get("id")
            .and_then(|id| id.as_str())
            .map(|id| vec![id.to_string()])
            .unwrap_or_default(),
        Value::String(id) => vec![id.clone()],
        _ => Vec::new(),
    }
}

fn parse_metadata_item(item: &Value) -> Option<LibraryEntry> {
    let key = item.get("ratingKey")?.as_str()?.to_string();
    let title = item.get("title")?.as_str()?.to_string();
    let year = item.get("year").and_then(|y| y.as_u64()).map(|y| y as u32);
    let external_ids = parse_guid_array(item.get("Guid").unwrap_or(&Value::Null));

    Some(LibraryEntry {
        key,
        title,
        year,
        external_ids,
    })
}

fn parse_entries(json: &Value) -> Vec<LibraryEntry> {
    let items = metadata_items(json);
    let entries: Vec<LibraryEntry> = items.iter().filter_map(parse_metadata_item).collect();
    if entries.len() < items.len() {
        debug!("Plex: skipped {} items without ratingKey/title", items.len() - entries.len());
    }
    entries
}

fn collection_tags(item: &Value) -> Vec<String> {
    match item.get("Collection") {
        Some(Value::Array(tags)) => tags
            .iter()
            .filter_map(|tag| tag.get("tag").and_then(|t| t.as_str()))
            .map(str::to_string)
            .collect(),
        Some(tag @ Value::Object(_)) => tag
            .get("tag")
            .and_then(|t| t.as_str())
            .map(|t| vec![t.to_string()])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Indexed `collection[i].tag.tag` parameters for the existing tags plus `collection`.
/// `None` when the movie already carries the tag.
fn collection_tag_params(existing: &[String], collection: &str) -> Option<String> {
    if existing.iter().any(|tag| tag == collection) {
        return None;
    }
    let params = existing
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(collection))
        .enumerate()
        .map(|(idx, tag)| format!("collection%5B{}%5D.tag.tag={}", idx, urlencoding::encode(tag)))
        .collect::<Vec<_>>()
        .join("&");
    Some(params)
}

fn find_collection_key(json: &Value, title: &str) -> Option<String> {
    metadata_items(json)
        .iter()
        .find(|item| item.get("title").and_then(|t| t.as_str()) == Some(title))
        .and_then(|item| item.get("ratingKey"))
        .and_then(|key| key.as_str())
        .map(str::to_string)
}
