//! API client for communicating with the streamie REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionToken;
use crate::models::{StreamConfig, StreamConfigPayload};

use super::{ApiError, AuthBackend, ConfigBackend};

// ============================================================================
// Constants
// ============================================================================

/// Server used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

/// API client for the streamie server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
///
/// The client never holds a token; callers pass the current one on every
/// call so an invalidated session is never reused.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(token: &SessionToken) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        let value = header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
            .map_err(|_| ApiError::MalformedToken("token is not a valid header value".into()))?;
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn authenticate(&self, username: &str, password: &str) -> Result<SessionToken, ApiError> {
        let url = self.url("/auth");
        debug!(url = %url, username = username, "Sending authentication request");

        let response = self
            .client
            .post(&url)
            .json(&AuthRequest { username, password })
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Authentication rejected");
            return Err(ApiError::AuthenticationFailed);
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("auth response: {}", e)))?;

        SessionToken::decode(&auth.token)
    }
}

#[async_trait]
impl ConfigBackend for ApiClient {
    async fn fetch_config(&self, token: &SessionToken) -> Result<StreamConfig, ApiError> {
        let url = self.url("/getconf");
        let response = self
            .client
            .get(&url)
            .headers(Self::auth_headers(token)?)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let payload: StreamConfigPayload = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("config response: {}", e)))?;

        debug!("Configuration fetched");
        Ok(payload.into())
    }

    async fn submit_config(&self, token: &SessionToken, config: &StreamConfig) -> Result<(), ApiError> {
        let url = self.url("/update");
        let response = self
            .client
            .post(&url)
            .headers(Self::auth_headers(token)?)
            .json(&StreamConfigPayload::from(config))
            .send()
            .await?;

        // Success body is informational text; nothing to parse.
        Self::check_response(response).await?;
        debug!("Configuration submitted");
        Ok(())
    }
}
