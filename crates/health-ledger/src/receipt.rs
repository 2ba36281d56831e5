//! Transaction receipts

use serde::{Deserialize, Serialize};

/// Terminal (or pending) status reported by the network
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    Success,
    Reverted,
    InsufficientGas,
    InvalidSignature,
    DuplicateTransaction,
    /// Not yet final
    Unknown,
}

impl ReceiptStatus {
    pub fn is_success(self) -> bool {
        matches!(self, ReceiptStatus::Success)
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ReceiptStatus::Unknown)
    }
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReceiptStatus::Success => "SUCCESS",
            ReceiptStatus::Reverted => "REVERTED",
            ReceiptStatus::InsufficientGas => "INSUFFICIENT_GAS",
            ReceiptStatus::InvalidSignature => "INVALID_SIGNATURE",
            ReceiptStatus::DuplicateTransaction => "DUPLICATE_TRANSACTION",
            ReceiptStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_id: String,
    pub status: ReceiptStatus,
    pub gas_used: u64,
    /// Function return value, if any
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Revert reason or other diagnostic
    #[serde(default)]
    pub message: Option<String>,
}

impl TransactionReceipt {
    pub fn success(transaction_id: String, gas_used: u64, result: Option<serde_json::Value>) -> Self {
        Self {
            transaction_id,
            status: ReceiptStatus::Success,
            gas_used,
            result,
            message: None,
        }
    }

    pub fn failure(
        transaction_id: String,
        status: ReceiptStatus,
        gas_used: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id,
            status,
            gas_used,
            result: None,
            message: Some(message.into()),
        }
    }
}
