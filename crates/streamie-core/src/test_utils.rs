//! Scripted backend for driving the session manager and sync controller in tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::api::{ApiError, AuthBackend, ConfigBackend};
use crate::auth::SessionToken;
use crate::models::StreamConfig;

/// Pauses every backend call between `started` and `release`.
#[derive(Default)]
pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct FakeBackend {
    auth_results: Mutex<VecDeque<Result<SessionToken, ApiError>>>,
    fetch_results: Mutex<VecDeque<Result<StreamConfig, ApiError>>>,
    submit_results: Mutex<VecDeque<Result<(), ApiError>>>,
    submitted: Mutex<Vec<StreamConfig>>,
    auth_calls: Mutex<usize>,
    gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeBackend {
    pub fn push_auth(&self, result: Result<SessionToken, ApiError>) {
        self.auth_results.lock().push_back(result);
    }

    pub fn push_fetch(&self, result: Result<StreamConfig, ApiError>) {
        self.fetch_results.lock().push_back(result);
    }

    pub fn push_submit(&self, result: Result<(), ApiError>) {
        self.submit_results.lock().push_back(result);
    }

    /// Configs received by `submit_config`, in call order.
    pub fn submitted(&self) -> Vec<StreamConfig> {
        self.submitted.lock().clone()
    }

    pub fn auth_calls(&self) -> usize {
        *self.auth_calls.lock()
    }

    /// Make subsequent calls wait on the returned gate.
    pub fn gate(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    async fn pass_gate(&self) {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn authenticate(&self, _username: &str, _password: &str) -> Result<SessionToken, ApiError> {
        *self.auth_calls.lock() += 1;
        let result = self
            .auth_results
            .lock()
            .pop_front()
            .unwrap_or(Err(ApiError::AuthenticationFailed));
        self.pass_gate().await;
        result
    }
}

#[async_trait]
impl ConfigBackend for FakeBackend {
    async fn fetch_config(&self, _token: &SessionToken) -> Result<StreamConfig, ApiError> {
        let result = self
            .fetch_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(StreamConfig::default()));
        self.pass_gate().await;
        result
    }

    async fn submit_config(&self, _token: &SessionToken, config: &StreamConfig) -> Result<(), ApiError> {
        let result = self.submit_results.lock().pop_front().unwrap_or(Ok(()));
        self.pass_gate().await;
        if result.is_ok() {
            self.submitted.lock().push(config.clone());
        }
        result
    }
}
