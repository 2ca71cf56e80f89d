use std::fmt;

/// Username and password for a single login attempt.
///
/// Moved into [`SessionManager::login`](super::SessionManager::login) and
/// dropped when it returns; never stored.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Presence check only; the server decides whether they are correct.
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_complete() {
        assert!(Credentials::new("alice", "secret1").is_complete());
        assert!(!Credentials::new("", "secret1").is_complete());
        assert!(!Credentials::new("   ", "secret1").is_complete());
        assert!(!Credentials::new("alice", "").is_complete());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("alice", "secret1");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("secret1"));
    }
}
