//! Wiring of the client, session manager and sync controller from a `Config`.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::debug;

use crate::api::ApiClient;
use crate::auth::SessionManager;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::sync::ConfigSyncController;

/// Everything a front-end needs for one user session.
pub struct Context {
    pub api: ApiClient,
    pub session: Arc<SessionManager>,
    pub sync: Arc<ConfigSyncController>,
}

impl Context {
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let server_url = config.server_url();
        debug!(server_url = %server_url, store = ?config.token_store, "Building client context");

        let api = ApiClient::with_timeout(&server_url, config.request_timeout())
            .context("Failed to build HTTP client")?;
        let store = config.token_store()?;
        let backend = Arc::new(api.clone());

        let session = Arc::new(SessionManager::new(backend.clone(), store, clock));
        let sync = Arc::new(ConfigSyncController::new(session.clone(), backend));

        Ok(Self { api, session, sync })
    }
}
