use async_trait::async_trait;
use reel_models::{IndexHit, MovieReference, TitleKind};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ensure_success, Result, SourceError};
use crate::traits::ReferenceIndex;

const SUGGEST_BASE_URL: &str = "https://v3.sg.media-imdb.com/suggestion";
const SERVICE: &str = "imdb";

#[derive(Debug, Deserialize)]
struct SuggestResponse {
    #[serde(default)]
    d: Vec<SuggestItem>,
}

#[derive(Debug, Deserialize)]
struct SuggestItem {
    id: String,
    #[serde(default)]
    l: Option<String>,
    /// Machine label, e.g. "movie" or "tvSeries"
    #[serde(default)]
    qid: Option<String>,
    /// Display label, e.g. "feature" or "TV series"
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    y: Option<u32>,
}

/// IMDb title search backed by the public suggestion endpoint
pub struct ImdbSuggestIndex {
    client: Client,
    base_url: String,
}

impl ImdbSuggestIndex {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            base_url: SUGGEST_BASE_URL.to_string(),
        })
    }

    fn suggestion_url(&self, query: &str) -> String {
        let text = search_text(query);
        let bucket = text
            .chars()
            .find(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .unwrap_or('x');
        format!(
            "{}/{}/{}.json",
            self.base_url,
            bucket,
            urlencoding::encode(&text.to_lowercase())
        )
    }
}

/// "Dune (2021)" is searched as "Dune 2021"
fn search_text(query: &str) -> String {
    let reference = MovieReference::parse(query);
    match reference.year {
        Some(year) => format!("{} {}", reference.title, year),
        None => reference.title,
    }
}

fn parse_suggestions(body: &str) -> Result<Vec<IndexHit>> {
    let response: SuggestResponse =
        serde_json::from_str(body).map_err(|e| SourceError::parse(SERVICE, e.to_string()))?;

    Ok(response
        .d
        .into_iter()
        .filter(|item| item.id.starts_with("tt"))
        .map(|item| {
            let kind = item
                .qid
                .as_deref()
                .or(item.q.as_deref())
                .map(TitleKind::from_label)
                .unwrap_or_else(|| TitleKind::Other("unknown".to_string()));
            IndexHit {
                id: item.id,
                kind,
                title: item.l.unwrap_or_default(),
                year: item.y,
            }
        })
        .collect())
}

#[async_trait]
impl ReferenceIndex for ImdbSuggestIndex {
    fn index_name(&self) -> &str {
        SERVICE
    }

    async fn search(&self, query: &str) -> Result<Vec<IndexHit>> {
        let url = self.suggestion_url(query);
        debug!("IMDb suggest: GET {}", url);

        let response = self.client.get(&url).send().await?;
        let body = ensure_success(SERVICE, response).await?.text().await?;
        let hits = parse_suggestions(&body)?;

        debug!("IMDb suggest: {} title hits for '{}'", hits.len(), query);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUNE_RESPONSE: &str = r#"{
        "d": [
            {"id": "nm0000001", "l": "Some Person", "s": "Actor"},
            {"id": "tt10466872", "l": "Dune: Prophecy", "q": "TV series", "qid": "tvSeries", "y": 2024},
            {"id": "tt1160419", "l": "Dune: Part One", "q": "feature", "qid": "movie", "y": 2021},
            {"id": "tt0087182", "l": "Dune", "q": "feature", "y": 1984}
        ],
        "q": "dune",
        "v": 1
    }"#;

    #[test]
    fn test_parse_keeps_title_hits_in_order() {
        let hits = parse_suggestions(DUNE_RESPONSE).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, "tt10466872");
        assert_eq!(hits[0].kind, TitleKind::TvSeries);
        assert_eq!(hits[1].id, "tt1160419");
        assert!(hits[1].kind.is_feature_film());
        assert_eq!(hits[1].year, Some(2021));
    }

    #[test]
    fn test_parse_falls_back_to_display_label() {
        let hits = parse_suggestions(DUNE_RESPONSE).unwrap();
        assert_eq!(hits[2].kind, TitleKind::FeatureFilm);
    }

    #[test]
    fn test_parse_empty_and_invalid_bodies() {
        assert!(parse_suggestions(r#"{"q": "zzzz", "v": 1}"#).unwrap().is_empty());
        assert!(parse_suggestions("<html>").is_err());
    }

    #[test]
    fn test_suggestion_url_uses_year_and_bucket() {
        let index = ImdbSuggestIndex::new("test-agent").unwrap();
        assert_eq!(
            index.suggestion_url("Dune (2021)"),
            "https://v3.sg.media-imdb.com/suggestion/d/dune%202021.json"
        );
        assert_eq!(
            index.suggestion_url("  "),
            "https://v3.sg.media-imdb.com/suggestion/x/.json"
        );
    }
}
