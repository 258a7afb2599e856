use async_trait::async_trait;
use reel_models::AcquisitionRecord;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{ensure_success, Result, SourceError};
use crate::traits::AcquisitionService;

const SERVICE: &str = "radarr";

#[derive(Debug, Clone, Deserialize)]
struct QualityProfile {
    id: i64,
    name: String,
}

/// Radarr v3 API client
pub struct RadarrClient {
    client: Client,
    base_url: String,
    quality_profiles: OnceCell<Vec<QualityProfile>>,
}

impl RadarrClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key)
                .map_err(|_| SourceError::Configuration("invalid Radarr API key format".to_string()))?,
        );
        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            quality_profiles: OnceCell::new(),
        })
    }

    /// Radarr's metadata for an IMDb id; `None` when Radarr does not know the title
    async fn lookup(&self, external_id: &str) -> Result<Option<Value>> {
        let url = format!(
            "{}/api/v3/movie/lookup/imdb?imdbId={}",
            self.base_url,
            urlencoding::encode(external_id)
        );
        debug!("Radarr: GET {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let value: Value = ensure_success(SERVICE, response).await?.json().await?;
        Ok(Some(value))
    }

    async fn quality_profile_id(&self, name: &str) -> Result<i64> {
        let profiles = self
            .quality_profiles
            .get_or_try_init(|| async {
                let url = format!("{}/api/v3/qualityprofile", self.base_url);
                let response = self.client.get(&url).send().await?;
                let profiles: Vec<QualityProfile> =
                    ensure_success(SERVICE, response).await?.json().await?;
                Ok::<_, SourceError>(profiles)
            })
            .await?;

        find_profile_id(profiles, name).ok_or_else(|| {
            SourceError::Configuration(format!("quality profile not found: {}", name))
        })
    }
}

fn find_profile_id(profiles: &[QualityProfile], name: &str) -> Option<i64> {
    profiles
        .iter()
        .find(|profile| profile.name.eq_ignore_ascii_case(name))
        .map(|profile| profile.id)
}

/// A lookup result is only a library movie once Radarr has assigned it an id
fn record_from_value(value: &Value, external_id: &str) -> Option<AcquisitionRecord> {
    let id = value.get("id").and_then(|id| id.as_i64()).filter(|id| *id > 0)?;
    Some(AcquisitionRecord {
        id,
        external_id: value
            .get("imdbId")
            .and_then(|v| v.as_str())
            .unwrap_or(external_id)
            .to_string(),
        title: value
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        monitored: value
            .get("monitored")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    })
}

fn submission_body(mut movie: Value, profile_id: i64, root_folder: &str) -> Value {
    if let Some(obj) = movie.as_object_mut() {
        obj.insert("qualityProfileId".to_string(), json!(profile_id));
        obj.insert("rootFolderPath".to_string(), json!(root_folder));
        obj.insert("monitored".to_string(), json!(true));
        obj.insert("addOptions".to_string(), json!({ "searchForMovie": true }));
    }
    movie
}

#[async_trait]
impl AcquisitionService for RadarrClient {
    fn service_name(&self) -> &str {
        SERVICE
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<AcquisitionRecord>> {
        Ok(self
            .lookup(external_id)
            .await?
            .and_then(|value| record_from_value(&value, external_id)))
    }

    async fn set_monitored(&self, record: &AcquisitionRecord) -> Result<()> {
        let url = format!("{}/api/v3/movie/{}", self.base_url, record.id);
        let response = self.client.get(&url).send().await?;
        let mut movie: Value = ensure_success(SERVICE, response).await?.json().await?;

        if movie.get("monitored").and_then(|m| m.as_bool()) == Some(true) {
            return Ok(());
        }
        if let Some(obj) = movie.as_object_mut() {
            obj.insert("monitored".to_string(), json!(true));
        }

        let response = self.client.put(&url).json(&movie).send().await?;
        ensure_success(SERVICE, response).await?;
        info!("Radarr: '{}' set to monitored", record.title);
        Ok(())
    }

    async fn submit(
        &self,
        external_id: &str,
        root_folder: &str,
        quality_profile: &str,
    ) -> Result<AcquisitionRecord> {
        let movie = self
            .lookup(external_id)
            .await?
            .ok_or_else(|| SourceError::NotFound(format!("Radarr metadata for {}", external_id)))?;
        let profile_id = self.quality_profile_id(quality_profile).await?;

        let url = format!("{}/api/v3/movie", self.base_url);
        let body = submission_body(movie, profile_id, root_folder);
        let response = self.client.post(&url).json(&body).send().await?;
        let created: Value = ensure_success(SERVICE, response).await?.json().await?;

        let record = record_from_value(&created, external_id)
            .ok_or_else(|| SourceError::parse(SERVICE, "created movie has no id"))?;
        info!("Radarr: added '{}' ({})", record.title, record.external_id);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_requires_positive_id() {
        let unknown = json!({"title": "Dune", "imdbId": "tt1160419", "id": 0});
        assert!(record_from_value(&unknown, "tt1160419").is_none());

        let known = json!({"title": "Dune", "imdbId": "tt1160419", "id": 42, "monitored": false});
        let record = record_from_value(&known, "tt1160419").unwrap();
        assert_eq!(record.id, 42);
        assert!(!record.monitored);
        assert_eq!(record.external_id, "tt1160419");
    }

    #[test]
    fn test_profile_lookup_ignores_case() {
        let profiles = vec![
            QualityProfile { id: 1, name: "Any".to_string() },
            QualityProfile { id: 4, name: "HD-1080p".to_string() },
        ];
        assert_eq!(find_profile_id(&profiles, "hd-1080p"), Some(4));
        assert_eq!(find_profile_id(&profiles, "Ultra-HD"), None);
    }

    #[test]
    fn test_submission_body_sets_add_options() {
        let body = submission_body(json!({"title": "Arrival", "tmdbId": 329865}), 4, "/movies");
        assert_eq!(body["qualityProfileId"], 4);
        assert_eq!(body["rootFolderPath"], "/movies");
        assert_eq!(body["monitored"], true);
        assert_eq!(body["addOptions"]["searchForMovie"], true);
        assert_eq!(body["tmdbId"], 329865);
    }
}
