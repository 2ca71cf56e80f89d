//! Persistence for the bearer token across restarts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Keychain service and entry the token is stored under
const KEYRING_SERVICE: &str = "streamie";
const KEYRING_ENTRY: &str = "session-token";

/// Where the token lives between runs. Holds a single string.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    token: String,
    saved_at: DateTime<Utc>,
}

/// Token kept as JSON in the cache directory.
pub struct FileTokenStore {
    cache_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data: SessionFile =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(data.token))
    }

    fn save(&self, token: &str) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create cache directory")?;
        }
        let data = SessionFile {
            token: token.to_string(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&data)?;
        std::fs::write(path, contents).context("Failed to write session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// Token kept in the OS keychain.
///
/// The entry is created once and reused, so the same credential handle is
/// read and written for the lifetime of the store.
pub struct KeyringTokenStore {
    entry: Entry,
}

impl KeyringTokenStore {
    pub fn new() -> Result<Self> {
        let entry =
            Entry::new(KEYRING_SERVICE, KEYRING_ENTRY).context("Failed to create keyring entry")?;
        Ok(Self { entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<String>> {
        match self.entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        self.entry
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.token.lock().clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.token.lock() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock() = None;
        Ok(())
    }
}
