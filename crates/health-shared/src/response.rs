//! Success/failure envelope handed to external request handlers
//!
//! ```json
//! { "success": true, "transactionId": "0.0.2@1718000000.000000001-9f2c", "patientId": 7 }
//! { "success": false, "error": "Not found: Record 999999", "errorKind": "not_found" }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, HealthResult};

/// Payload of an operation whose only output is the committing transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub transaction_id: String,
}

impl TransactionResult {
    pub fn new(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
        }
    }
}

/// Discriminated result of a core operation
///
/// Operation-specific fields of `T` are flattened next to `success`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl<T: Serialize> ServiceResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Render as a JSON value, falling back to a failure envelope if `T`
    /// cannot be serialized
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "error": format!("Internal error: response encoding failed: {}", e),
                "errorKind": "internal",
            })
        })
    }
}

impl<T: Serialize> From<HealthResult<T>> for ServiceResponse<T> {
    fn from(result: HealthResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(err.to_string()),
                error_kind: Some(err.kind()),
            },
        }
    }
}
