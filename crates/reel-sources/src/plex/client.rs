use async_trait::async_trait;
use reel_models::LibraryEntry;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{Result, SourceError};
use crate::plex::api::{LibraryInfo, PlexHttpClient};
use crate::traits::LibraryService;

/// One Plex movie section, used as the media library
pub struct PlexLibrary {
    api: PlexHttpClient,
    library_name: Option<String>,
    section: OnceCell<LibraryInfo>,
    machine_identifier: OnceCell<String>,
}

impl PlexLibrary {
    pub fn new(token: &str, server_url: &str, library_name: Option<String>) -> Result<Self> {
        Ok(Self {
            api: PlexHttpClient::new(token, server_url)?,
            library_name,
            section: OnceCell::new(),
            machine_identifier: OnceCell::new(),
        })
    }

    /// The configured movie section, or the first movie section on the server
    async fn section(&self) -> Result<&LibraryInfo> {
        self.section
            .get_or_try_init(|| async {
                let libraries = self.api.get_libraries().await?;
                let section = select_section(&libraries, self.library_name.as_deref())?;
                info!(
                    "Plex: managing movie section '{}' (key {}) on {}",
                    section.title,
                    section.key,
                    self.api.server_url()
                );
                Ok::<_, SourceError>(section)
            })
            .await
    }

    async fn machine_identifier(&self) -> Result<&String> {
        self.machine_identifier
            .get_or_try_init(|| self.api.get_machine_identifier())
            .await
    }
}

fn select_section(libraries: &[LibraryInfo], wanted: Option<&str>) -> Result<LibraryInfo> {
    let movie_sections: Vec<&LibraryInfo> =
        libraries.iter().filter(|lib| lib.type_ == "movie").collect();

    if let Some(name) = wanted {
        if let Some(section) = movie_sections.iter().find(|lib| lib.title == name) {
            return Ok((*section).clone());
        }
        warn!("Plex: movie section '{}' not found, using the first movie section", name);
    }

    movie_sections
        .first()
        .map(|section| (*section).clone())
        .ok_or_else(|| SourceError::NotFound("Plex movie library section".to_string()))
}

#[async_trait]
impl LibraryService for PlexLibrary {
    fn service_name(&self) -> &str {
        "plex"
    }

    async fn search(&self, title: &str, year: Option<u32>) -> Result<Vec<LibraryEntry>> {
        let section = self.section().await?;
        self.api.search_movies(&section.key, title, year).await
    }

    async fn enumerate_all(&self) -> Result<Vec<LibraryEntry>> {
        let section = self.section().await?;
        self.api.get_movies(&section.key).await
    }

    async fn attach(&self, entry: &LibraryEntry, grouping: &str) -> Result<()> {
        let section = self.section().await?;
        self.api
            .add_collection_tag(&section.key, &entry.key, grouping)
            .await
    }

    async fn create_grouping(&self, name: &str, entries: &[LibraryEntry]) -> Result<()> {
        if entries.is_empty() {
            debug!("Plex: no entries for collection '{}', nothing to create", name);
            return Ok(());
        }
        let section = self.section().await?;

        if self.api.find_collection(&section.key, name).await?.is_some() {
            for entry in entries {
                self.api
                    .add_collection_tag(&section.key, &entry.key, name)
                    .await?;
            }
            info!("Plex: added {} movies to existing collection '{}'", entries.len(), name);
            return Ok(());
        }

        let machine_identifier = self.machine_identifier().await?;
        let keys: Vec<String> = entries.iter().map(|entry| entry.key.clone()).collect();
        self.api
            .create_collection(&section.key, machine_identifier, name, &keys)
            .await?;
        info!("Plex: created collection '{}' with {} movies", name, keys.len());
        Ok(())
    }

    async fn delete_grouping(&self, name: &str) -> Result<()> {
        let section = self.section().await?;
        match self.api.find_collection(&section.key, name).await? {
            Some(rating_key) => {
                self.api.delete_collection(&rating_key).await?;
                info!("Plex: deleted collection '{}'", name);
            }
            None => debug!("Plex: collection '{}' does not exist, nothing to delete", name),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library(key: &str, type_: &str, title: &str) -> LibraryInfo {
        LibraryInfo {
            key: key.to_string(),
            type_: type_.to_string(),
            title: title.to_string(),
        }
    }

    #[test]
    fn test_select_named_movie_section() {
        let libraries = vec![
            library("1", "movie", "Movies"),
            library("2", "show", "Films"),
            library("3", "movie", "Films"),
        ];
        assert_eq!(select_section(&libraries, Some("Films")).unwrap().key, "3");
    }

    #[test]
    fn test_select_falls_back_to_first_movie_section() {
        let libraries = vec![library("2", "show", "TV"), library("5", "movie", "Movies")];
        assert_eq!(select_section(&libraries, None).unwrap().key, "5");
        assert_eq!(select_section(&libraries, Some("Missing")).unwrap().key, "5");
    }

    #[test]
    fn test_select_without_movie_sections_fails() {
        let libraries = vec![library("2", "show", "TV")];
        assert!(matches!(
            select_section(&libraries, None),
            Err(SourceError::NotFound(_))
        ));
    }
}
