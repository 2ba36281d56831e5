//! Ledger entry types
//!
//! These are the shapes the three deployed contracts return from queries.
//! Field names cross the boundary in camelCase.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{actions, Address, PatientId, PermissionId, RecordId, RecordStatus, RecordType, Role};

/// A registered platform participant
///
/// Deactivated, never hard-deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub address: Address,
    pub role: Role,
    /// Hex-encoded public key
    pub public_key: String,
    /// License / registration number for clinical roles
    pub professional_id: Option<String>,
    pub is_active: bool,
    pub registration_date: DateTime<Utc>,
}

/// On-ledger patient identity
///
/// `encrypted_personal_data` is a codec envelope; the core never decrypts it
/// on read paths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdentity {
    pub patient_id: PatientId,
    pub encrypted_personal_data: String,
    /// Custodial wallet that owns this identity
    pub wallet_address: Address,
    pub is_active: bool,
    pub creation_date: DateTime<Utc>,
    /// SHA-256 of the plaintext personal data
    pub metadata_hash: String,
}

/// Time-bounded, action-scoped authorization
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    pub id: PermissionId,
    pub grantor: Address,
    pub grantee: Address,
    pub patient_id: PatientId,
    pub allowed_actions: BTreeSet<String>,
    pub expiration_date: DateTime<Utc>,
    pub is_active: bool,
}

impl PermissionGrant {
    /// Valid iff active and not yet expired
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.expiration_date
    }

    pub fn allows(&self, action: &str) -> bool {
        self.allowed_actions.contains(&actions::normalize(action))
    }

    /// Whether this grant alone lets `grantee` perform `action` on `patient_id` at `now`
    pub fn authorizes(
        &self,
        grantee: &Address,
        patient_id: PatientId,
        action: &str,
        now: DateTime<Utc>,
    ) -> bool {
        &self.grantee == grantee
            && self.patient_id == patient_id
            && self.allows(action)
            && self.is_valid_at(now)
    }
}

/// Encrypted medical record metadata as stored on the ledger
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecord {
    pub record_id: RecordId,
    pub patient_id: PatientId,
    pub doctor_address: Address,
    pub record_type: RecordType,
    pub status: RecordStatus,
    /// SHA-256 of the current ciphertext envelope
    pub encrypted_data_hash: String,
    /// SHA-256 of the plaintext at creation/amendment time
    pub original_data_hash: String,
    #[serde(default)]
    pub attachment_hashes: Vec<String>,
    #[serde(default)]
    pub authorized_viewers: Vec<Address>,
    pub is_emergency: bool,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl MedicalRecord {
    pub fn is_viewer(&self, address: &Address) -> bool {
        self.authorized_viewers.iter().any(|v| v == address)
    }
}

/// Append-only audit entry, recorded for permitted and denied attempts alike
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub accessor: Address,
    pub patient_id: PatientId,
    pub action: String,
    pub success: bool,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// State of the coarse patient -> doctor access toggle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoarseAccess {
    /// Never toggled for this pair
    #[default]
    Unset,
    Granted,
    Revoked,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn grant(expiration: DateTime<Utc>, is_active: bool) -> PermissionGrant {
        PermissionGrant {
            id: 1,
            grantor: Address::parse("0xpatient").unwrap(),
            grantee: Address::parse("0xdoctor").unwrap(),
            patient_id: 7,
            allowed_actions: [actions::READ.to_string()].into_iter().collect(),
            expiration_date: expiration,
            is_active,
        }
    }

    #[test]
    fn test_grant_validity_decay() {
        let now = Utc::now();
        assert!(!grant(now - Duration::seconds(1), true).is_valid_at(now));
        assert!(grant(now + Duration::hours(1), true).is_valid_at(now));
        // expiration is exclusive
        assert!(!grant(now, true).is_valid_at(now));
    }

    #[test]
    fn test_revoked_grant_is_invalid() {
        let now = Utc::now();
        assert!(!grant(now + Duration::hours(1), false).is_valid_at(now));
    }

    #[test]
    fn test_authorizes_checks_every_dimension() {
        let now = Utc::now();
        let g = grant(now + Duration::hours(1), true);
        let doctor = Address::parse("0xdoctor").unwrap();
        let other = Address::parse("0xnurse").unwrap();

        assert!(g.authorizes(&doctor, 7, "read", now));
        assert!(!g.authorizes(&other, 7, "READ", now));
        assert!(!g.authorizes(&doctor, 8, "READ", now));
        assert!(!g.authorizes(&doctor, 7, "WRITE", now));
        assert!(!g.authorizes(&doctor, 7, "READ", now + Duration::hours(2)));
    }

    #[test]
    fn test_entry_serialization_uses_camel_case() {
        let json = serde_json::to_value(grant(Utc::now(), true)).unwrap();
        assert!(json.get("allowedActions").is_some());
        assert!(json.get("expirationDate").is_some());
        assert_eq!(json["patientId"], 7);
    }
}
