pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{Config, LetterboxdConfig, PlexConfig, RadarrConfig, ReconciliationConfig, DEFAULT_QUALITY_PROFILE, DEFAULT_ROOT_FOLDER};
pub use credentials::{CredentialStore, PLEX_TOKEN_PLACEHOLDER, RADARR_API_KEY_PLACEHOLDER};
pub use paths::{PathManager, container_base_path};
