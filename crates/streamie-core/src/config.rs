//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! server address, the last used username and where the session token is
//! persisted. Environment variables take precedence over the file.
//!
//! Configuration is stored at `~/.config/streamie/config.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "streamie";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_SERVER_URL: &str = "STREAMIE_SERVER_URL";
pub const ENV_USERNAME: &str = "STREAMIE_USERNAME";
pub const ENV_PASSWORD: &str = "STREAMIE_PASSWORD";

/// Where the session token is kept between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    File,
    Keyring,
    /// Never persisted; every run starts logged out.
    Memory,
}

impl std::str::FromStr for TokenStoreKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(TokenStoreKind::File),
            "keyring" => Ok(TokenStoreKind::Keyring),
            "memory" | "none" => Ok(TokenStoreKind::Memory),
            other => Err(format!("Unknown token store '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub server_url: Option<String>,
    pub last_username: Option<String>,
    #[serde(default)]
    pub token_store: TokenStoreKind,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Server base URL: environment, then file, then the default.
    pub fn server_url(&self) -> String {
        std::env::var(ENV_SERVER_URL)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.server_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Username to prefill: environment, then the last successful login.
    pub fn default_username(&self) -> Option<String> {
        std::env::var(ENV_USERNAME)
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.last_username.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        Ok(match self.token_store {
            TokenStoreKind::File => Arc::new(FileTokenStore::new(self.cache_dir()?)),
            TokenStoreKind::Keyring => Arc::new(KeyringTokenStore::new()?),
            TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
        })
    }
}
