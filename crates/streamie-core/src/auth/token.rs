use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::ApiError;

/// Claims read from the JWT payload. Only used for display and the local
/// expiry check; the server remains the authority on validity.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: Option<String>,
    /// The reference server puts the account name here instead of `sub`.
    username: Option<String>,
    /// NumericDate; may carry a fractional part.
    exp: f64,
}

/// Bearer token plus the fields decoded from its payload.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    raw: String,
    subject: String,
    expires_at: i64,
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("subject", &self.subject)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl SessionToken {
    /// Decode the payload segment of a JWT without verifying its signature.
    pub fn decode(raw: &str) -> Result<Self, ApiError> {
        let raw = raw.trim();
        let mut segments = raw.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(ApiError::MalformedToken(
                "expected three dot-separated segments".to_string(),
            ));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ApiError::MalformedToken(format!("payload is not base64url: {}", e)))?;

        let claims: TokenClaims = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::MalformedToken(format!("payload is not valid claims: {}", e)))?;

        let subject = claims
            .sub
            .or(claims.username)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::MalformedToken("payload has no subject".to_string()))?;

        if !claims.exp.is_finite() {
            return Err(ApiError::MalformedToken("exp is not a number".to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            subject,
            expires_at: claims.exp.floor() as i64,
        })
    }

    /// The string sent in `Authorization: Bearer ...`.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Expiry as epoch seconds.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }

    /// Token timestamps are seconds, `now_millis` is milliseconds.
    /// Reaching the expiry instant exactly counts as expired.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.expires_at.saturating_mul(1000) <= now_millis
    }

    pub fn seconds_until_expiry(&self, now_millis: i64) -> i64 {
        (self.expires_at - now_millis.div_euclid(1000)).max(0)
    }
}
