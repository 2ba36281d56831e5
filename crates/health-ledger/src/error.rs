//! Ledger-level failures

use mycelix_health_shared::HealthError;
use thiserror::Error;

use crate::receipt::ReceiptStatus;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Operator credentials missing or malformed
    #[error("invalid operator credentials: {0}")]
    InvalidCredentials(String),

    /// The gateway session was closed
    #[error("ledger session is closed")]
    Closed,

    #[error("ledger unreachable: {0}")]
    Unreachable(String),

    #[error("{operation} timed out after {after_ms} ms")]
    Timeout { operation: String, after_ms: u64 },

    /// Terminal receipt with a non-success status, or a reverted query
    #[error("{status}: {message}")]
    Rejected {
        status: ReceiptStatus,
        message: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("signing failed: {0}")]
    Signing(String),

    /// A payload that does not have the expected shape
    #[error("malformed ledger payload: {0}")]
    Malformed(String),
}

impl LedgerError {
    pub fn reverted(message: impl Into<String>) -> Self {
        LedgerError::Rejected {
            status: ReceiptStatus::Reverted,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Malformed(err.to_string())
    }
}

impl From<LedgerError> for HealthError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidCredentials(msg) => HealthError::Precondition(msg),
            LedgerError::Closed => HealthError::Unreachable(err.to_string()),
            LedgerError::Unreachable(msg) => HealthError::Unreachable(msg),
            LedgerError::Timeout { .. } => HealthError::Timeout(err.to_string()),
            LedgerError::Rejected { .. } => HealthError::LedgerRejection(err.to_string()),
            LedgerError::NotFound(msg) => HealthError::NotFound(msg),
            LedgerError::Signing(msg) => HealthError::Crypto(msg),
            LedgerError::Malformed(msg) => HealthError::Internal(msg),
        }
    }
}
