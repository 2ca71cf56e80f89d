use std::fmt;

/// Short-lived, dismissible message raised by a sync operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Submitted,
    SubmitFailed(String),
    ReloadFailed(String),
    /// The server rejected the session; the user has been logged out.
    SessionEnded(String),
}

impl Notice {
    pub fn is_error(&self) -> bool {
        !matches!(self, Notice::Submitted)
    }

    pub fn message(&self) -> String {
        match self {
            Notice::Submitted => "Stream keys updated successfully".to_string(),
            Notice::SubmitFailed(reason) => format!("Failed to update stream keys. {}", reason),
            Notice::ReloadFailed(reason) => format!("Failed to load configuration. {}", reason),
            Notice::SessionEnded(reason) => reason.clone(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}
