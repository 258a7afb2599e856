use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_ROOT_FOLDER: &str = "/movies";
pub const DEFAULT_QUALITY_PROFILE: &str = "HD-1080p";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub plex: PlexConfig,
    #[serde(default)]
    pub radarr: RadarrConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub letterboxd: LetterboxdConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexConfig {
    #[serde(default = "default_plex_url")]
    pub server_url: String,
    /// Movie library section to manage. The first movie section is used when unset.
    #[serde(default)]
    pub library: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarrConfig {
    #[serde(default = "default_radarr_url")]
    pub url: String,
    #[serde(default = "default_root_folder")]
    pub root_folder: String,
    #[serde(default = "default_quality_profile")]
    pub quality_profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Delay between two completion checks of the same collection
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Checks before an incomplete collection is marked stalled (0 = never give up)
    #[serde(default = "default_max_checks")]
    pub max_checks: u32,
    /// Minimum delay between two reference index queries
    #[serde(default = "default_resolve_delay_ms")]
    pub resolve_delay_ms: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Concurrent workers used when verifying candidate titles
    #[serde(default = "default_verify_workers")]
    pub verify_workers: usize,
    /// How long the external-id index built by a full library scan is reused
    #[serde(default = "default_library_index_ttl_secs")]
    pub library_index_ttl_secs: u64,
    /// Cron expression (with seconds) for external list re-syncs
    #[serde(default = "default_resync_schedule")]
    pub resync_schedule: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LetterboxdConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_plex_url() -> String {
    "http://localhost:32400".to_string()
}

fn default_radarr_url() -> String {
    "http://localhost:7878".to_string()
}

fn default_root_folder() -> String {
    DEFAULT_ROOT_FOLDER.to_string()
}

fn default_quality_profile() -> String {
    DEFAULT_QUALITY_PROFILE.to_string()
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_max_checks() -> u32 {
    1440 // one day of minute checks
}

fn default_resolve_delay_ms() -> u64 {
    500
}

fn default_cache_capacity() -> u64 {
    1000
}

fn default_verify_workers() -> usize {
    10
}

fn default_library_index_ttl_secs() -> u64 {
    60
}

fn default_resync_schedule() -> String {
    "0 1 0 * * *".to_string() // daily at 00:01
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self {
            server_url: default_plex_url(),
            library: None,
        }
    }
}

impl Default for RadarrConfig {
    fn default() -> Self {
        Self {
            url: default_radarr_url(),
            root_folder: default_root_folder(),
            quality_profile: default_quality_profile(),
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            max_checks: default_max_checks(),
            resolve_delay_ms: default_resolve_delay_ms(),
            cache_capacity: default_cache_capacity(),
            verify_workers: default_verify_workers(),
            library_index_ttl_secs: default_library_index_ttl_secs(),
            resync_schedule: default_resync_schedule(),
        }
    }
}

impl Default for LetterboxdConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
        }
    }
}

impl ReconciliationConfig {
    pub fn max_checks_limit(&self) -> Option<u32> {
        (self.max_checks > 0).then_some(self.max_checks)
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config file if present, otherwise start from defaults.
    /// Environment overrides are applied in both cases.
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `PLEX_URL` and `RADARR_URL` take precedence over the file
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PLEX_URL").filter(|v| !v.trim().is_empty()) {
            self.plex.server_url = url;
        }
        if let Some(url) = lookup("RADARR_URL").filter(|v| !v.trim().is_empty()) {
            self.radarr.url = url;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.plex.server_url.trim().is_empty() {
            return Err(anyhow::anyhow!("plex.server_url must not be empty"));
        }
        if self.radarr.url.trim().is_empty() {
            return Err(anyhow::anyhow!("radarr.url must not be empty"));
        }
        if self.radarr.root_folder.trim().is_empty() {
            return Err(anyhow::anyhow!("radarr.root_folder must not be empty"));
        }
        if self.radarr.quality_profile.trim().is_empty() {
            return Err(anyhow::anyhow!("radarr.quality_profile must not be empty"));
        }
        if self.reconciliation.check_interval_secs == 0 {
            return Err(anyhow::anyhow!("reconciliation.check_interval_secs must be positive"));
        }
        if self.reconciliation.verify_workers == 0 {
            return Err(anyhow::anyhow!("reconciliation.verify_workers must be positive"));
        }
        if self.reconciliation.cache_capacity == 0 {
            return Err(anyhow::anyhow!("reconciliation.cache_capacity must be positive"));
        }
        if self.reconciliation.resync_schedule.split_whitespace().count() != 6 {
            return Err(anyhow::anyhow!(
                "reconciliation.resync_schedule must be a six-field cron expression (sec min hour day month weekday)"
            ));
        }
        Ok(())
    }
}
