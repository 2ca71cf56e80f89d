//! REST API client module for the streamie server.
//!
//! This module provides the `ApiClient` for logging in and for reading and
//! replacing the per-platform stream configuration.
//!
//! The API uses JWT bearer token authentication obtained from `POST /auth`.
//! The two traits below are the seams the session manager and the config
//! sync controller depend on, so either side can be driven without a server.

pub mod client;
pub mod error;

use async_trait::async_trait;

pub use client::ApiClient;
pub use error::ApiError;

use crate::auth::SessionToken;
use crate::models::StreamConfig;

/// Exchanges credentials for a bearer token.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<SessionToken, ApiError>;
}

/// Reads and replaces the stream configuration of the token's owner.
#[async_trait]
pub trait ConfigBackend: Send + Sync {
    async fn fetch_config(&self, token: &SessionToken) -> Result<StreamConfig, ApiError>;

    /// Always sends every platform; the server replaces the whole record.
    async fn submit_config(&self, token: &SessionToken, config: &StreamConfig) -> Result<(), ApiError>;
}
