use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Values shipped in sample environments; treated as "not configured"
pub const PLEX_TOKEN_PLACEHOLDER: &str = "your_plex_token";
pub const RADARR_API_KEY_PLACEHOLDER: &str = "your_radarr_api_key";

const PLEX_TOKEN_KEY: &str = "plex_token";
const RADARR_API_KEY_KEY: &str = "radarr_api_key";

#[derive(Debug, Serialize, Deserialize, Default)]
struct CredentialsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

pub struct CredentialStore {
    path: PathBuf,
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            credentials: HashMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            let creds_data: CredentialsData = toml::from_str(&content)?;
            self.credentials = creds_data.data;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let creds_data = CredentialsData {
            data: self.credentials.clone(),
        };
        let content = toml::to_string_pretty(&creds_data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.credentials.get(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.credentials.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.credentials.remove(key);
    }

    /// `PLEX_TOKEN` / `RADARR_API_KEY` win over the stored values
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("PLEX_TOKEN").filter(|v| !v.trim().is_empty()) {
            self.set_plex_token(token);
        }
        if let Some(key) = lookup("RADARR_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.set_radarr_api_key(key);
        }
    }

    pub fn get_plex_token(&self) -> Option<&String> {
        self.get(PLEX_TOKEN_KEY)
            .filter(|token| is_real_secret(token, PLEX_TOKEN_PLACEHOLDER))
    }

    pub fn set_plex_token(&mut self, token: String) {
        self.set(PLEX_TOKEN_KEY.to_string(), token);
    }

    pub fn get_radarr_api_key(&self) -> Option<&String> {
        self.get(RADARR_API_KEY_KEY)
            .filter(|key| is_real_secret(key, RADARR_API_KEY_PLACEHOLDER))
    }

    pub fn set_radarr_api_key(&mut self, key: String) {
        self.set(RADARR_API_KEY_KEY.to_string(), key);
    }

    /// Error codes for every secret that is absent or still a placeholder
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.get_plex_token().is_none() {
            missing.push("plex_token_missing".to_string());
        }
        if self.get_radarr_api_key().is_none() {
            missing.push("radarr_api_key_missing".to_string());
        }
        missing
    }
}

fn is_real_secret(value: &str, placeholder: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed != placeholder
}
