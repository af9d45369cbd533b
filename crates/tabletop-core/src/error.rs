//! Engine errors.

use crate::model::{SceneId, TokenId};
use crate::store::StoreError;
use thiserror::Error;

/// Errors raised by engine operations.
///
/// Inside a sync batch these reject only the offending item; they are logged
/// and skipped. They are returned only when a whole call cannot proceed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Token {token} belongs to scene {scene}, not the active scene")]
    StaleReference { token: TokenId, scene: SceneId },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => SyncError::NotFound(what),
            StoreError::InvalidData(what) => SyncError::InvalidArgument(what),
            other => SyncError::Store(other),
        }
    }
}

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
