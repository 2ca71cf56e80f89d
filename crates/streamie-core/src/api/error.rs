use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Authentication failed - invalid credentials")]
    AuthenticationFailed,

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Malformed session token: {0}")]
    MalformedToken(String),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Transport("request timed out".to_string())
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Map a non-success status from an authenticated endpoint.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// True when the session can no longer be trusted and must be dropped.
    pub fn ends_session(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::MalformedToken(_))
    }

    /// Short message suitable for showing to the end user.
    ///
    /// Raw transport details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            ApiError::AuthenticationFailed => "Invalid username or password",
            ApiError::Unauthorized | ApiError::MalformedToken(_) => {
                "Your session has ended. Please log in again."
            }
            ApiError::Transport(_) => {
                "Unable to reach the server. Check your connection and try again."
            }
            ApiError::NotFound(_) => "No configuration found on the server",
            ApiError::RateLimited => "Too many requests. Please wait and try again.",
            ApiError::ServerError(_) | ApiError::InvalidResponse(_) => {
                "The server could not handle the request. Please try again."
            }
        }
    }
}
