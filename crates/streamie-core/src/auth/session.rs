use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthBackend};
use crate::clock::Clock;

use super::{Credentials, SessionToken, TokenStore};

/// Capacity of the transition event channel.
/// Transitions are user-driven, so a handful of slots is plenty.
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    Authenticating,
    Authenticated { token: SessionToken, subject: String },
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// Explicit logout.
    UserLogout,
    /// The local expiry check found the token past `exp`.
    Expired,
    /// The server rejected the token (401) or it could not be decoded.
    Rejected,
}

/// Published on every transition into or out of `Authenticated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { subject: String, generation: u64 },
    LoggedOut { reason: LogoutReason, generation: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Username and password required")]
    MissingCredentials,

    #[error("Login was superseded by another session change")]
    Superseded,

    #[error("Server issued a token that has already expired")]
    ExpiredOnArrival,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::MissingCredentials => "Username and password required",
            SessionError::Superseded => "Login was cancelled",
            SessionError::ExpiredOnArrival => {
                "The server issued an expired session. Check the system clock."
            }
            SessionError::Api(ApiError::MalformedToken(_)) => {
                "The server returned an invalid session token. Please try again."
            }
            SessionError::Api(e) => e.user_message(),
        }
    }
}

struct Inner {
    state: SessionState,
    /// Bumped on every transition; lets callers detect that the session they
    /// started a request under is gone.
    generation: u64,
}

/// Owns the current session. Single writer of the bearer token.
pub struct SessionManager {
    auth: Arc<dyn AuthBackend>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Create the manager, resuming a persisted session if one is still valid.
    pub fn new(
        auth: Arc<dyn AuthBackend>,
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = Self::restore(store.as_ref(), clock.as_ref());
        Self {
            auth,
            store,
            clock,
            inner: Mutex::new(Inner {
                state,
                generation: 0,
            }),
            events,
        }
    }

    fn restore(store: &dyn TokenStore, clock: &dyn Clock) -> SessionState {
        let raw = match store.load() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No persisted session");
                return SessionState::LoggedOut;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session");
                return SessionState::LoggedOut;
            }
        };

        match SessionToken::decode(&raw) {
            Ok(token) if !token.is_expired(clock.now_millis()) => {
                info!(subject = token.subject(), "Resumed persisted session");
                let subject = token.subject().to_string();
                SessionState::Authenticated { token, subject }
            }
            Ok(token) => {
                debug!(expires_at = token.expires_at(), "Persisted session has expired");
                Self::clear_store(store);
                SessionState::LoggedOut
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable persisted session");
                Self::clear_store(store);
                SessionState::LoggedOut
            }
        }
    }

    fn clear_store(store: &dyn TokenStore) {
        if let Err(e) = store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }

    fn emit(&self, event: SessionEvent) {
        debug!(?event, "Session transition");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Log in with the given credentials. Returns the subject on success.
    ///
    /// Any existing session is ended first. If the session changes while the
    /// request is in flight (for example a logout), the result is dropped.
    pub async fn login(&self, credentials: Credentials) -> Result<String, SessionError> {
        if !credentials.is_complete() {
            return Err(SessionError::MissingCredentials);
        }

        let (generation, previous) = {
            let mut inner = self.inner.lock();
            let previous = std::mem::replace(&mut inner.state, SessionState::Authenticating);
            inner.generation += 1;
            (inner.generation, previous)
        };
        if matches!(previous, SessionState::Authenticated { .. }) {
            Self::clear_store(self.store.as_ref());
            self.emit(SessionEvent::LoggedOut {
                reason: LogoutReason::UserLogout,
                generation,
            });
        }

        let result = self
            .auth
            .authenticate(&credentials.username, &credentials.password)
            .await;
        drop(credentials);

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!("Discarding login result for a superseded attempt");
            return Err(SessionError::Superseded);
        }

        let token = match result {
            Ok(token) => token,
            Err(e) => {
                inner.state = SessionState::LoggedOut;
                warn!(error = %e, "Login failed");
                return Err(e.into());
            }
        };

        if token.is_expired(self.clock.now_millis()) {
            inner.state = SessionState::LoggedOut;
            warn!(expires_at = token.expires_at(), "Login returned an expired token");
            return Err(SessionError::ExpiredOnArrival);
        }

        let subject = token.subject().to_string();
        let raw = token.as_str().to_string();
        inner.generation += 1;
        let generation = inner.generation;
        inner.state = SessionState::Authenticated {
            token,
            subject: subject.clone(),
        };
        drop(inner);

        if let Err(e) = self.store.save(&raw) {
            warn!(error = %e, "Failed to persist session");
        }
        info!(subject = %subject, "Login successful");
        self.emit(SessionEvent::LoggedIn {
            subject: subject.clone(),
            generation,
        });
        Ok(subject)
    }

    /// Explicit logout. No-op when already logged out.
    pub fn logout(&self) {
        self.end_session(LogoutReason::UserLogout);
    }

    /// Forced logout, e.g. after the server answered 401.
    /// The server's verdict wins over the local expiry check.
    pub fn invalidate(&self, reason: LogoutReason) {
        self.end_session(reason);
    }

    /// Returns true if a session (or a login attempt) was actually ended.
    fn end_session(&self, reason: LogoutReason) -> bool {
        let (generation, was_authenticated) = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::LoggedOut {
                return false;
            }
            let was_authenticated = matches!(inner.state, SessionState::Authenticated { .. });
            inner.state = SessionState::LoggedOut;
            inner.generation += 1;
            (inner.generation, was_authenticated)
        };

        Self::clear_store(self.store.as_ref());
        info!(?reason, "Session ended");
        if was_authenticated {
            self.emit(SessionEvent::LoggedOut { reason, generation });
        }
        true
    }

    /// Re-check the token against the clock, collapsing an expired session
    /// to `LoggedOut`. Returns whether the session is still authenticated.
    pub fn check_validity(&self) -> bool {
        let expired = {
            let inner = self.inner.lock();
            match &inner.state {
                SessionState::Authenticated { token, .. } => {
                    token.is_expired(self.clock.now_millis())
                }
                _ => return false,
            }
        };
        if expired {
            self.end_session(LogoutReason::Expired);
            return false;
        }
        true
    }

    // =========================================================================
    // Reads (each re-validates expiry)
    // =========================================================================

    pub fn state(&self) -> SessionState {
        self.check_validity();
        self.inner.lock().state.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.check_validity()
    }

    pub fn current_token(&self) -> Option<SessionToken> {
        self.authenticated().map(|(token, _)| token)
    }

    pub fn current_subject(&self) -> Option<String> {
        self.authenticated().map(|(token, _)| token.subject().to_string())
    }

    /// Current token together with the generation it belongs to.
    pub fn authenticated(&self) -> Option<(SessionToken, u64)> {
        if !self.check_validity() {
            return None;
        }
        let inner = self.inner.lock();
        match &inner.state {
            SessionState::Authenticated { token, .. } => Some((token.clone(), inner.generation)),
            _ => None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// True if the session that was current at `generation` is still current
    /// and has not expired.
    pub fn is_current(&self, generation: u64) -> bool {
        self.check_validity() && self.generation() == generation
    }

    /// Seconds left on the current token, for display.
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.current_token()
            .map(|t| t.seconds_until_expiry(self.clock.now_millis()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::tests::make_token;
    use crate::auth::MemoryTokenStore;
    use crate::clock::ManualClock;
    use crate::test_utils::FakeBackend;

    const NOW_SECS: i64 = 1_700_000_000;

    fn token_for(subject: &str, exp: i64) -> SessionToken {
        SessionToken::decode(&make_token(&serde_json::json!({"username": subject, "exp": exp})))
            .unwrap()
    }

    struct Harness {
        backend: Arc<FakeBackend>,
        store: Arc<MemoryTokenStore>,
        clock: Arc<ManualClock>,
        session: Arc<SessionManager>,
    }

    fn harness_with_store(store: MemoryTokenStore) -> Harness {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(store);
        let clock = Arc::new(ManualClock::at_secs(NOW_SECS));
        let session = Arc::new(SessionManager::new(
            backend.clone(),
            store.clone(),
            clock.clone(),
        ));
        Harness {
            backend,
            store,
            clock,
            session,
        }
    }

    fn harness() -> Harness {
        harness_with_store(MemoryTokenStore::new())
    }

    #[test]
    fn test_starts_logged_out_without_persisted_token() {
        let h = harness();
        assert_eq!(h.session.state(), SessionState::LoggedOut);
        assert_eq!(h.session.current_subject(), None);
    }

    #[test]
    fn test_restores_persisted_token() {
        let raw = make_token(&serde_json::json!({"username": "alice", "exp": NOW_SECS + 60}));
        let h = harness_with_store(MemoryTokenStore::with_token(raw));
        assert!(h.session.is_authenticated());
        assert_eq!(h.session.current_subject().as_deref(), Some("alice"));
    }

    #[test]
    fn test_discards_expired_persisted_token() {
        let raw = make_token(&serde_json::json!({"username": "alice", "exp": NOW_SECS}));
        let h = harness_with_store(MemoryTokenStore::with_token(raw));
        assert!(!h.session.is_authenticated());
        assert_eq!(h.store.load().unwrap(), None);
    }

    #[test]
    fn test_discards_malformed_persisted_token() {
        let h = harness_with_store(MemoryTokenStore::with_token("garbage"));
        assert_eq!(h.session.state(), SessionState::LoggedOut);
        assert_eq!(h.store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_then_expiry() {
        let h = harness();
        h.backend.push_auth(Ok(token_for("alice", NOW_SECS + 3600)));
        let mut events = h.session.subscribe();

        let subject = h
            .session
            .login(Credentials::new("alice", "secret1"))
            .await
            .unwrap();
        assert_eq!(subject, "alice");
        assert_eq!(h.session.current_subject().as_deref(), Some("alice"));
        assert!(h.store.load().unwrap().is_some());
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedIn { ref subject, .. } if subject == "alice"
        ));

        h.clock.advance_secs(3600);
        assert_eq!(h.session.state(), SessionState::LoggedOut);
        assert_eq!(h.store.load().unwrap(), None);
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedOut {
                reason: LogoutReason::Expired,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_login_failure_returns_to_logged_out() {
        let h = harness();
        h.backend.push_auth(Err(ApiError::AuthenticationFailed));

        let err = h
            .session
            .login(Credentials::new("alice", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::Api(ApiError::AuthenticationFailed));
        assert_eq!(err.user_message(), "Invalid username or password");
        assert_eq!(h.session.state(), SessionState::LoggedOut);
    }

    #[tokio::test]
    async fn test_login_with_undecodable_token() {
        let h = harness();
        h.backend.push_auth(Err(ApiError::MalformedToken(
            "expected three dot-separated segments".into(),
        )));
        let err = h
            .session
            .login(Credentials::new("alice", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::MalformedToken(_))));
        assert!(!err.user_message().contains("session has ended"));
        assert_eq!(h.session.state(), SessionState::LoggedOut);
        assert_eq!(h.store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_transport_error_is_distinct() {
        let h = harness();
        h.backend
            .push_auth(Err(ApiError::Transport("connection refused".into())));
        let err = h
            .session
            .login(Credentials::new("alice", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::Transport(_))));
    }

    #[tokio::test]
    async fn test_login_requires_both_fields() {
        let h = harness();
        let err = h
            .session
            .login(Credentials::new("alice", ""))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::MissingCredentials);
        assert_eq!(h.backend.auth_calls(), 0);
    }

    #[tokio::test]
    async fn test_login_with_expired_token() {
        let h = harness();
        h.backend.push_auth(Ok(token_for("alice", NOW_SECS - 1)));
        let err = h
            .session
            .login(Credentials::new("alice", "secret1"))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::ExpiredOnArrival);
        assert!(!h.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_token_and_store() {
        let h = harness();
        h.backend.push_auth(Ok(token_for("alice", NOW_SECS + 3600)));
        h.session
            .login(Credentials::new("alice", "secret1"))
            .await
            .unwrap();
        let mut events = h.session.subscribe();

        h.session.logout();
        assert_eq!(h.session.state(), SessionState::LoggedOut);
        assert_eq!(h.session.current_token(), None);
        assert_eq!(h.store.load().unwrap(), None);
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedOut {
                reason: LogoutReason::UserLogout,
                ..
            }
        ));

        // Second logout is a no-op
        h.session.logout();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalidate_overrides_local_validity() {
        let h = harness();
        h.backend.push_auth(Ok(token_for("alice", NOW_SECS + 3600)));
        h.session
            .login(Credentials::new("alice", "secret1"))
            .await
            .unwrap();

        h.session.invalidate(LogoutReason::Rejected);
        assert!(!h.session.is_authenticated());
        assert_eq!(h.store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_during_login_discards_result() {
        let h = harness();
        let gate = h.backend.gate();
        h.backend.push_auth(Ok(token_for("alice", NOW_SECS + 3600)));

        let session = h.session.clone();
        let pending = tokio::spawn(async move {
            session.login(Credentials::new("alice", "secret1")).await
        });

        gate.started.notified().await;
        assert_eq!(h.session.state(), SessionState::Authenticating);
        h.session.logout();
        gate.release.notify_one();

        assert_eq!(pending.await.unwrap(), Err(SessionError::Superseded));
        assert_eq!(h.session.state(), SessionState::LoggedOut);
        assert_eq!(h.store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_generation_changes_on_transition() {
        let h = harness();
        let start = h.session.generation();
        h.backend.push_auth(Ok(token_for("alice", NOW_SECS + 3600)));
        h.session
            .login(Credentials::new("alice", "secret1"))
            .await
            .unwrap();
        let (_, generation) = h.session.authenticated().unwrap();
        assert!(generation > start);
        assert!(h.session.is_current(generation));

        h.session.logout();
        assert!(!h.session.is_current(generation));
    }

    #[tokio::test]
    async fn test_seconds_until_expiry() {
        let h = harness();
        h.backend.push_auth(Ok(token_for("alice", NOW_SECS + 3600)));
        h.session
            .login(Credentials::new("alice", "secret1"))
            .await
            .unwrap();
        h.clock.advance_secs(600);
        assert_eq!(h.session.seconds_until_expiry(), Some(3000));
    }
}
