//! Standard error types for consistent error handling

use mycelix_health_crypto::CodecError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used by every public operation of the core
pub type HealthResult<T> = Result<T, HealthError>;

/// Every failure a core operation can report
///
/// Nothing in the core panics on an expected failure mode; the only fatal
/// case is [`HealthError::Precondition`] at startup.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HealthError {
    /// Missing or malformed startup configuration
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The ledger (or a deployed contract) rejected the call
    #[error("Ledger rejected the call: {0}")]
    LedgerRejection(String),

    /// The ledger network could not be reached
    #[error("Ledger unreachable: {0}")]
    Unreachable(String),

    /// A ledger call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A record status change the state machine does not allow
    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Local wallet or key vault persistence failed
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable discriminant of a [`HealthError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Precondition,
    LedgerRejection,
    Unreachable,
    Timeout,
    NotFound,
    Validation,
    IllegalTransition,
    PermissionDenied,
    Storage,
    Crypto,
    Internal,
}

impl HealthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HealthError::Precondition(_) => ErrorKind::Precondition,
            HealthError::LedgerRejection(_) => ErrorKind::LedgerRejection,
            HealthError::Unreachable(_) => ErrorKind::Unreachable,
            HealthError::Timeout(_) => ErrorKind::Timeout,
            HealthError::NotFound(_) => ErrorKind::NotFound,
            HealthError::Validation(_) => ErrorKind::Validation,
            HealthError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            HealthError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            HealthError::Storage(_) => ErrorKind::Storage,
            HealthError::Crypto(_) => ErrorKind::Crypto,
            HealthError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HealthError::NotFound(_))
    }
}

impl From<CodecError> for HealthError {
    fn from(err: CodecError) -> Self {
        HealthError::Crypto(err.to_string())
    }
}

impl From<serde_json::Error> for HealthError {
    fn from(err: serde_json::Error) -> Self {
        HealthError::Internal(format!("Malformed payload: {}", err))
    }
}
