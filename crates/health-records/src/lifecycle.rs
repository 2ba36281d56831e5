//! Record inputs and lifecycle rules
//!
//! Draft -> Finalized -> Amended (-> Amended); any non-cancelled record may be
//! cancelled. `Amended` is only reachable through an amendment, never through
//! a plain status update.

use mycelix_health_shared::{Address, HealthError, HealthResult, PatientId, RecordId, RecordStatus, RecordType};
use serde::{Deserialize, Serialize};

/// Minimum length of an amendment justification
pub const MIN_AMENDMENT_REASON: usize = 10;

/// A record to create; `medical_data` is encrypted before submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub patient_id: PatientId,
    pub doctor_address: Address,
    pub record_type: RecordType,
    pub medical_data: serde_json::Value,
    /// SHA-256 digests of attachments stored off-ledger
    #[serde(default)]
    pub attachment_hashes: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub is_emergency: bool,
    #[serde(default)]
    pub authorized_viewers: Vec<Address>,
}

impl NewRecord {
    pub fn new(
        patient_id: PatientId,
        doctor_address: Address,
        record_type: RecordType,
        medical_data: serde_json::Value,
    ) -> Self {
        Self {
            patient_id,
            doctor_address,
            record_type,
            medical_data,
            attachment_hashes: Vec::new(),
            metadata: serde_json::Map::new(),
            is_emergency: false,
            authorized_viewers: Vec::new(),
        }
    }
}

/// Result of a committed record creation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCreated {
    pub transaction_id: String,
    pub record_id: RecordId,
    /// SHA-256 of the ciphertext envelope now on the ledger
    pub encrypted_data_hash: String,
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Validate a record before it is encrypted
pub fn validate_new_record(record: &NewRecord) -> HealthResult<()> {
    // Validate payload is present
    if record.medical_data.is_null() {
        return Err(HealthError::Validation("Medical data is required".to_string()));
    }

    // Validate attachment digests
    if let Some(bad) = record.attachment_hashes.iter().find(|h| !is_sha256_hex(h)) {
        return Err(HealthError::Validation(format!(
            "Attachment hash '{}' is not a SHA-256 hex digest",
            bad
        )));
    }

    Ok(())
}

/// Validate an amendment justification
pub fn validate_reason(reason: &str) -> HealthResult<()> {
    if reason.trim().chars().count() < MIN_AMENDMENT_REASON {
        return Err(HealthError::Validation(format!(
            "Amendment reason must be at least {} characters",
            MIN_AMENDMENT_REASON
        )));
    }
    Ok(())
}

fn illegal(from: RecordStatus, to: RecordStatus) -> HealthError {
    HealthError::IllegalTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// Check a plain status update
pub fn check_status_update(from: RecordStatus, to: RecordStatus) -> HealthResult<()> {
    if to == RecordStatus::Amended || !from.can_transition_to(to) {
        return Err(illegal(from, to));
    }
    Ok(())
}

/// Check that a record in `from` may be amended
pub fn check_amendment(from: RecordStatus) -> HealthResult<()> {
    if !from.can_transition_to(RecordStatus::Amended) {
        return Err(illegal(from, RecordStatus::Amended));
    }
    Ok(())
}
