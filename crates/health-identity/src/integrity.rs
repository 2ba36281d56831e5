//! Patient personal data and wallet records
//!
//! Personal data never leaves the core in clear: it is validated here,
//! serialized and handed to the codec.

use chrono::{DateTime, NaiveDate, Utc};
use mycelix_health_shared::{Address, HealthError, HealthResult, PatientId};
use serde::{Deserialize, Serialize};

/// Demographics submitted at registration or update
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalData {
    pub name: String,
    /// Date of birth (YYYY-MM-DD format)
    pub birthdate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Any further fields supplied by the caller
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PersonalData {
    pub fn new(name: impl Into<String>, birthdate: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            birthdate: birthdate.into(),
            gender: None,
            phone: None,
            email: None,
            address: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn birthdate(&self) -> HealthResult<NaiveDate> {
        NaiveDate::parse_from_str(self.birthdate.trim(), "%Y-%m-%d").map_err(|_| {
            HealthError::Validation("Date of birth must be in YYYY-MM-DD format".to_string())
        })
    }
}

/// Public part of a custodial wallet, persisted per patient
///
/// The matching private key lives in the key vault, never here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub patient_id: PatientId,
    pub name: String,
    pub birthdate: String,
    pub wallet_address: Address,
    /// Hex-encoded ed25519 public key
    pub public_key: String,
    /// Transaction that registered the identity
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

/// Validate personal data before it is encrypted
pub fn validate_personal_data(data: &PersonalData, today: NaiveDate) -> HealthResult<()> {
    // Validate name is not empty
    if data.name.trim().is_empty() {
        return Err(HealthError::Validation("Patient name is required".to_string()));
    }

    // Validate date of birth format and range
    let birthdate = data.birthdate()?;
    if birthdate > today {
        return Err(HealthError::Validation(
            "Date of birth cannot be in the future".to_string(),
        ));
    }

    if let Some(email) = &data.email {
        if !email.contains('@') {
            return Err(HealthError::Validation("Email address is malformed".to_string()));
        }
    }

    Ok(())
}

/// Associated data binding a sealed key to its patient
pub fn key_binding(patient_id: PatientId) -> String {
    format!("mycelix-health/patient/{}", patient_id)
}
