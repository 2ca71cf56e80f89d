//! Draft/snapshot synchronization of the stream configuration.
//!
//! `ConfigSyncController` keeps the last configuration known to match the
//! server (the snapshot) next to the user's working copy (the draft). The
//! configuration is dirty exactly when the two differ, so editing a field and
//! then editing it back leaves nothing to submit.

pub mod controller;
pub mod error;
pub mod notice;

pub use controller::ConfigSyncController;
pub use error::SyncError;
pub use notice::Notice;
