//! Streamie core: session lifecycle and stream destination config sync.
//!
//! - [`auth`]: bearer token decoding, the session state machine, token persistence
//! - [`api`]: HTTP client for `/auth`, `/getconf` and `/update`
//! - [`sync`]: draft/snapshot tracking of the per-platform stream keys
//! - [`config`]: client configuration file and environment overrides

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod context;
pub mod models;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::{ApiClient, ApiError};
pub use auth::{Credentials, LogoutReason, SessionError, SessionEvent, SessionManager, SessionState, SessionToken};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use context::Context;
pub use models::{DestinationConfig, FieldEdit, Platform, StreamConfig};
pub use sync::{ConfigSyncController, Notice, SyncError};
