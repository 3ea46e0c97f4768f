use thiserror::Error;

use bodylog_core::ValidationError;
use bodylog_store::{AuthError, StorageError, StoreError};

/// Errors surfaced to the user by client operations.
///
/// Remote failures keep the collaborator's message so it can be shown as-is.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    #[error("object storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// An upload was requested with an empty file list.
    #[error("no files selected")]
    NoFiles,

    #[error("not signed in")]
    NotSignedIn,
}

impl ClientError {
    /// Whether the error was raised locally, before any remote call.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NoFiles | Self::NotSignedIn)
    }
}
