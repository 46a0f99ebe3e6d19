use thiserror::Error;

use cask_pack::PackError;

/// Errors from backend and router operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be attached to the router.
    #[error("backend registration failed: {0}")]
    Registration(String),

    /// Pack serialization failed during a dump. The staged table is left
    /// unchanged.
    #[error("pack serialization failed: {0}")]
    Serialization(#[from] PackError),

    /// Operation attempted on a released backend.
    #[error("backend has been released")]
    BackendUnavailable,

    /// Strict reset refused: staged objects are not covered by a dump the
    /// caller has confirmed as persisted.
    #[error(
        "staged objects not covered by a persisted dump \
         (last dump seq {dumped}, last persisted seq {persisted})"
    )]
    UnpersistedDump { dumped: u64, persisted: u64 },

    /// Attempted to write under the null object id.
    #[error("cannot store object with null id")]
    NullObjectId,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
