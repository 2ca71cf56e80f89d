use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Configuration has not been loaded")]
    NotLoaded,

    #[error("No changes to submit")]
    NotDirty,

    #[error("Session changed while the request was in flight")]
    Stale,

    #[error(transparent)]
    Api(#[from] ApiError),
}
