//! Builds the concrete service adapters from configuration and credentials.

use std::sync::Arc;

use reel_config::{Config, CredentialStore};
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::imdb::ImdbSuggestIndex;
use crate::letterboxd::LetterboxdLists;
use crate::plex::PlexLibrary;
use crate::radarr::RadarrClient;
use crate::traits::{AcquisitionService, LibraryService, ListProvider, ReferenceIndex};

/// The four external services the curator talks to
#[derive(Clone)]
pub struct SourceSet {
    pub index: Arc<dyn ReferenceIndex>,
    pub library: Arc<dyn LibraryService>,
    pub acquisition: Arc<dyn AcquisitionService>,
    pub lists: Arc<dyn ListProvider>,
}

impl SourceSet {
    pub fn from_config(config: &Config, credentials: &CredentialStore) -> Result<Self> {
        let missing = credentials.missing();
        if !missing.is_empty() {
            return Err(SourceError::MissingCredentials(missing));
        }
        let plex_token = credentials
            .get_plex_token()
            .ok_or_else(|| SourceError::MissingCredentials(vec!["plex_token_missing".to_string()]))?;
        let radarr_api_key = credentials
            .get_radarr_api_key()
            .ok_or_else(|| SourceError::MissingCredentials(vec!["radarr_api_key_missing".to_string()]))?;

        debug!(
            "Building sources: plex={} radarr={}",
            config.plex.server_url, config.radarr.url
        );

        Ok(Self {
            index: Arc::new(ImdbSuggestIndex::new(&config.letterboxd.user_agent)?),
            library: Arc::new(PlexLibrary::new(
                plex_token,
                &config.plex.server_url,
                config.plex.library.clone(),
            )?),
            acquisition: Arc::new(RadarrClient::new(radarr_api_key, &config.radarr.url)?),
            lists: Arc::new(LetterboxdLists::new(&config.letterboxd.user_agent)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_credentials_are_reported_together() {
        let credentials = CredentialStore::new(PathBuf::from("/tmp/reelcurator-test-credentials.toml"));
        let err = SourceSet::from_config(&Config::default(), &credentials)
            .err()
            .unwrap();
        match err {
            SourceError::MissingCredentials(codes) => assert_eq!(
                codes,
                vec!["plex_token_missing".to_string(), "radarr_api_key_missing".to_string()]
            ),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_builds_with_credentials() {
        let mut credentials = CredentialStore::new(PathBuf::from("/tmp/reelcurator-test-credentials.toml"));
        credentials.set_plex_token("plex-secret".to_string());
        credentials.set_radarr_api_key("radarr-secret".to_string());

        let sources = SourceSet::from_config(&Config::default(), &credentials).unwrap();
        assert_eq!(sources.library.service_name(), "plex");
        assert_eq!(sources.acquisition.service_name(), "radarr");
        assert!(sources.lists.accepts("https://letterboxd.com/x/list/y/"));
    }
}
