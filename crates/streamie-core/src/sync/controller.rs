use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ConfigBackend};
use crate::auth::{LogoutReason, SessionEvent, SessionManager};
use crate::models::{FieldEdit, Platform, StreamConfig};

use super::{Notice, SyncError};

/// Snapshot and draft, tied to the session generation they were loaded under.
struct SyncState {
    generation: u64,
    snapshot: StreamConfig,
    draft: StreamConfig,
}

impl SyncState {
    fn is_dirty(&self) -> bool {
        self.draft != self.snapshot
    }
}

/// Holds the editable configuration for the current session and
/// reconciles it with the server.
///
/// Every network call reads the token at call time and re-checks the session
/// generation before applying its result, so a logout or a 401 that lands
/// while a request is in flight always wins.
pub struct ConfigSyncController {
    session: Arc<SessionManager>,
    backend: Arc<dyn ConfigBackend>,
    state: Mutex<Option<SyncState>>,
    notice: Mutex<Option<Notice>>,
}

impl ConfigSyncController {
    pub fn new(session: Arc<SessionManager>, backend: Arc<dyn ConfigBackend>) -> Self {
        Self {
            session,
            backend,
            state: Mutex::new(None),
            notice: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    // =========================================================================
    // Server round-trips
    // =========================================================================

    /// Fetch the configuration and make it both the snapshot and the draft.
    ///
    /// On failure the previous state is left alone and a `ReloadFailed`
    /// notice is raised; the user may retry. A server with no stored
    /// configuration yet yields an all-empty, all-disabled one.
    pub async fn load_for_session(&self) -> Result<(), SyncError> {
        let (token, generation) = self
            .session
            .authenticated()
            .ok_or(SyncError::NotAuthenticated)?;

        let config = match self.backend.fetch_config(&token).await {
            Ok(config) => config,
            Err(ApiError::NotFound(_)) => {
                info!("No configuration stored yet, starting from defaults");
                StreamConfig::default()
            }
            Err(e) => return Err(self.intercept(e, generation, Notice::ReloadFailed)),
        };

        if !self.session.is_current(generation) {
            debug!("Discarding configuration fetched for an ended session");
            return Err(SyncError::Stale);
        }

        *self.state.lock() = Some(SyncState {
            generation,
            snapshot: config.clone(),
            draft: config,
        });
        {
            let mut notice = self.notice.lock();
            if matches!(*notice, Some(Notice::ReloadFailed(_))) {
                *notice = None;
            }
        }
        debug!("Configuration loaded");
        Ok(())
    }

    /// Send the full draft to the server. Only allowed while dirty.
    ///
    /// On success the submitted draft becomes the snapshot. On failure the
    /// draft is kept untouched so no edits are lost.
    pub async fn submit(&self) -> Result<(), SyncError> {
        let (token, generation) = self
            .session
            .authenticated()
            .ok_or(SyncError::NotAuthenticated)?;

        let draft = self
            .with_state_at(generation, |s| s.is_dirty().then(|| s.draft.clone()))?
            .ok_or(SyncError::NotDirty)?;

        debug!("Submitting configuration");
        match self.backend.submit_config(&token, &draft).await {
            Ok(()) => {
                if !self.session.is_current(generation) {
                    debug!("Discarding submit result for an ended session");
                    return Err(SyncError::Stale);
                }
                self.with_state_at(generation, |s| s.snapshot = draft)
                    .map_err(|_| SyncError::Stale)?;
                info!("Configuration submitted");
                self.set_notice(Notice::Submitted);
                Ok(())
            }
            Err(e) => Err(self.intercept(e, generation, Notice::SubmitFailed)),
        }
    }

    /// Single place every authenticated failure goes through.
    ///
    /// A rejected token forces a logout and drops the config state. Other
    /// failures become a notice, unless the session moved on meanwhile.
    fn intercept(
        &self,
        err: ApiError,
        generation: u64,
        on_failure: fn(String) -> Notice,
    ) -> SyncError {
        if err.ends_session() {
            if self.session.generation() != generation {
                debug!(error = %err, "Ignoring rejection for an ended session");
                return SyncError::Stale;
            }
            warn!(error = %err, "Server rejected the session, logging out");
            self.session.invalidate(LogoutReason::Rejected);
            self.clear();
            self.set_notice(Notice::SessionEnded(err.user_message().to_string()));
            return SyncError::Api(err);
        }

        if !self.session.is_current(generation) {
            debug!(error = %err, "Ignoring failure for an ended session");
            return SyncError::Stale;
        }

        warn!(error = %err, "Configuration request failed");
        self.set_notice(on_failure(err.user_message().to_string()));
        SyncError::Api(err)
    }

    // =========================================================================
    // Local edits
    // =========================================================================

    /// Apply an edit to the draft. Returns whether the draft is now dirty.
    pub fn edit_field(&self, platform: Platform, edit: FieldEdit) -> Result<bool, SyncError> {
        self.with_state(|s| {
            s.draft.apply(platform, edit);
            s.is_dirty()
        })
    }

    pub fn set_stream_key(&self, platform: Platform, key: impl Into<String>) -> Result<bool, SyncError> {
        self.edit_field(platform, FieldEdit::StreamKey(key.into()))
    }

    pub fn set_enabled(&self, platform: Platform, enabled: bool) -> Result<bool, SyncError> {
        self.edit_field(platform, FieldEdit::Enabled(enabled))
    }

    /// Throw away local edits.
    pub fn discard(&self) -> Result<(), SyncError> {
        self.with_state(|s| s.draft = s.snapshot.clone())
    }

    /// Drop snapshot and draft, e.g. on logout.
    pub fn clear(&self) {
        *self.state.lock() = None;
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn is_loaded(&self) -> bool {
        self.with_state(|_| ()).is_ok()
    }

    pub fn is_dirty(&self) -> bool {
        self.with_state(|s| s.is_dirty()).unwrap_or(false)
    }

    pub fn draft(&self) -> Option<StreamConfig> {
        self.with_state(|s| s.draft.clone()).ok()
    }

    pub fn snapshot(&self) -> Option<StreamConfig> {
        self.with_state(|s| s.snapshot.clone()).ok()
    }

    pub fn changed_platforms(&self) -> Vec<Platform> {
        self.with_state(|s| s.draft.diff(&s.snapshot))
            .unwrap_or_default()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice.lock().clone()
    }

    pub fn take_notice(&self) -> Option<Notice> {
        self.notice.lock().take()
    }

    pub fn dismiss_notice(&self) {
        *self.notice.lock() = None;
    }

    fn set_notice(&self, notice: Notice) {
        *self.notice.lock() = Some(notice);
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SyncState) -> R) -> Result<R, SyncError> {
        match self.session.authenticated() {
            Some((_, generation)) => self.with_state_at(generation, f),
            None => {
                self.clear();
                Err(SyncError::NotAuthenticated)
            }
        }
    }

    /// State belonging to `generation`. State left over from an older
    /// session is dropped on sight.
    fn with_state_at<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut SyncState) -> R,
    ) -> Result<R, SyncError> {
        let mut guard = self.state.lock();
        match guard.as_mut() {
            Some(state) if state.generation == generation => Ok(f(state)),
            Some(_) => {
                *guard = None;
                Err(SyncError::NotLoaded)
            }
            None => Err(SyncError::NotLoaded),
        }
    }

    // =========================================================================
    // Session transitions
    // =========================================================================

    /// React to a session transition: load on login, clear on logout.
    pub async fn handle_session_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::LoggedIn { subject, .. } => {
                debug!(subject = %subject, "Loading configuration for new session");
                if let Err(e) = self.load_for_session().await {
                    debug!(error = %e, "Initial configuration load failed");
                }
            }
            SessionEvent::LoggedOut { reason, .. } => {
                self.clear();
                if *reason == LogoutReason::Expired {
                    self.set_notice(Notice::SessionEnded(
                        "Your session has expired. Please log in again.".to_string(),
                    ));
                }
            }
        }
    }

    /// Follow session transitions in a background task.
    ///
    /// The task stops once the controller is dropped.
    pub fn spawn_session_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.session.subscribe();
        let controller: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(controller) = controller.upgrade() else {
                            break;
                        };
                        controller.handle_session_event(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session listener fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
