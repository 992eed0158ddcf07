use thiserror::Error;

use crate::crypto::CryptoError;
use crate::dao::base::DaoError;
use crate::store::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure taxonomy for room operations. A failure in one room or
/// operation is reported to the acting client and never takes down the
/// dispatcher or leaks partial state to other participants.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("crypto failure: {0}")]
    Crypto(#[from] CryptoError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable code carried in `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::PermissionDenied(_) => "permission_denied",
            EngineError::NotFound(_) => "not_found",
            EngineError::StoreUnavailable(_) => "store_unavailable",
            EngineError::Validation(_) => "validation_error",
            EngineError::Crypto(_) => "decode_failure",
            EngineError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => EngineError::StoreUnavailable(msg),
            StoreError::Corrupt(msg) => EngineError::Internal(msg),
        }
    }
}

impl From<DaoError> for EngineError {
    fn from(err: DaoError) -> Self {
        match err {
            DaoError::NotFound => EngineError::NotFound("resource not found".to_string()),
            DaoError::Validation(msg) => EngineError::Validation(msg),
            other => EngineError::Internal(other.to_string()),
        }
    }
}
