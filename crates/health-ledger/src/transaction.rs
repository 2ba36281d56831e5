//! Transaction and call shapes

use chrono::{DateTime, Utc};
use mycelix_health_shared::Address;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Network-assigned identifier of a deployed contract
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractRef(String);

impl ContractRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContractRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// References of the three contracts the core uses
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerContracts {
    pub identity: ContractRef,
    pub access_control: ContractRef,
    pub medical_records: ContractRef,
}

impl LedgerContracts {
    pub fn new(
        identity: impl Into<String>,
        access_control: impl Into<String>,
        medical_records: impl Into<String>,
    ) -> Self {
        Self {
            identity: ContractRef::new(identity),
            access_control: ContractRef::new(access_control),
            medical_records: ContractRef::new(medical_records),
        }
    }
}

/// A read-only contract call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCall {
    pub contract: ContractRef,
    pub function: String,
    pub params: serde_json::Value,
}

/// The signed part of a transaction
///
/// Canonical bytes are the compact JSON encoding of this struct; field order is
/// fixed by declaration and `params` objects serialize with sorted keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBody {
    pub contract: ContractRef,
    pub function: String,
    pub params: serde_json::Value,
    pub gas_limit: u64,
    /// Account paying for and authorizing the call
    pub payer: Address,
    /// Random 128-bit hex nonce
    pub nonce: String,
    pub valid_start: DateTime<Utc>,
}

impl TransactionBody {
    /// `<payer>@<seconds>.<nanos>-<nonce>`
    pub fn transaction_id(&self) -> String {
        format!(
            "{}@{}.{:09}-{}",
            self.payer,
            self.valid_start.timestamp(),
            self.valid_start.timestamp_subsec_nanos(),
            self.nonce
        )
    }

    pub fn canonical_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub body: TransactionBody,
    /// Hex-encoded ed25519 public key of the signer
    pub public_key: String,
    /// Hex-encoded ed25519 signature over the canonical body
    pub signature: String,
}

impl SignedTransaction {
    pub fn transaction_id(&self) -> String {
        self.body.transaction_id()
    }
}
