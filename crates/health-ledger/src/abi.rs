//! Call surface of the deployed contracts
//!
//! Function names and parameter shapes shared by the managers (which build
//! calls) and the in-process simulator (which executes them). Parameters cross
//! the wire as camelCase JSON objects.

use serde::{Deserialize, Serialize};

/// Encode a parameter struct as the JSON object carried in a transaction
pub fn params<T: Serialize>(value: &T) -> Result<serde_json::Value, crate::LedgerError> {
    Ok(serde_json::to_value(value)?)
}

// ==================== IDENTITY CONTRACT ====================

pub mod identity {
    use super::*;
    use mycelix_health_shared::{Address, PatientId};

    pub const REGISTER_PATIENT: &str = "register_patient";
    pub const UPDATE_PATIENT_DATA: &str = "update_patient_data";
    pub const GRANT_ACCESS: &str = "grant_access";
    pub const REVOKE_ACCESS: &str = "revoke_access";
    pub const DEACTIVATE_PATIENT: &str = "deactivate_patient";
    pub const GET_PATIENT: &str = "get_patient";
    pub const GET_ACCESS_STATE: &str = "get_access_state";

    /// Operator-signed; `wallet_address` becomes the identity owner
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RegisterPatient {
        pub encrypted_personal_data: String,
        pub metadata_hash: String,
        pub wallet_address: Address,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Registered {
        pub patient_id: PatientId,
    }

    /// Owner-signed
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UpdatePatientData {
        pub patient_id: PatientId,
        pub encrypted_personal_data: String,
        pub metadata_hash: String,
    }

    /// Arguments of `grant_access`, `revoke_access` and `get_access_state`
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DoctorAccess {
        pub patient_id: PatientId,
        pub doctor_address: Address,
    }

    /// Arguments of `get_patient` and `deactivate_patient`
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PatientRef {
        pub patient_id: PatientId,
    }
}

// ==================== ACCESS CONTROL CONTRACT ====================

pub mod access {
    use super::*;
    use chrono::{DateTime, Utc};
    use mycelix_health_shared::{Address, PatientId, PermissionId, Role};
    use std::collections::BTreeSet;

    pub const REGISTER_USER: &str = "register_user";
    pub const DEACTIVATE_USER: &str = "deactivate_user";
    pub const GRANT_PERMISSION: &str = "grant_permission";
    pub const REVOKE_PERMISSION: &str = "revoke_permission";
    pub const LOG_ACCESS: &str = "log_access";
    pub const GET_USER: &str = "get_user";
    pub const GET_PERMISSION: &str = "get_permission";
    pub const GET_PATIENT_PERMISSIONS: &str = "get_patient_permissions";
    pub const GET_ACCESS_LOGS: &str = "get_access_logs";

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RegisterUser {
        pub address: Address,
        pub role: Role,
        pub public_key: String,
        pub professional_id: Option<String>,
    }

    /// Arguments of `get_user` and `deactivate_user`
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UserRef {
        pub address: Address,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GrantPermission {
        pub grantor: Address,
        pub grantee: Address,
        pub patient_id: PatientId,
        pub expiration_date: DateTime<Utc>,
        pub allowed_actions: BTreeSet<String>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Granted {
        pub permission_id: PermissionId,
    }

    /// Arguments of `revoke_permission` and `get_permission`
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PermissionRef {
        pub permission_id: PermissionId,
    }

    /// Arguments of `get_patient_permissions` and `get_access_logs`
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PatientRef {
        pub patient_id: PatientId,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LogAccess {
        pub accessor: Address,
        pub patient_id: PatientId,
        pub action: String,
        pub success: bool,
        pub details: String,
    }
}

// ==================== MEDICAL RECORDS CONTRACT ====================

pub mod records {
    use super::*;
    use mycelix_health_shared::{Address, PatientId, RecordId, RecordStatus, RecordType};

    pub const CREATE_RECORD: &str = "create_record";
    pub const UPDATE_RECORD_STATUS: &str = "update_record_status";
    pub const AMEND_RECORD: &str = "amend_record";
    pub const AUTHORIZE_VIEWER: &str = "authorize_viewer";
    pub const GET_RECORD: &str = "get_record";
    pub const GET_PATIENT_RECORDS: &str = "get_patient_records";
    pub const GET_RECORD_REVISIONS: &str = "get_record_revisions";

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateRecord {
        pub patient_id: PatientId,
        pub doctor_address: Address,
        pub record_type: RecordType,
        /// Codec envelope of the medical payload
        pub encrypted_data: String,
        pub encrypted_data_hash: String,
        pub original_data_hash: String,
        #[serde(default)]
        pub attachment_hashes: Vec<String>,
        #[serde(default)]
        pub metadata: serde_json::Map<String, serde_json::Value>,
        pub is_emergency: bool,
        #[serde(default)]
        pub authorized_viewers: Vec<Address>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Created {
        pub record_id: RecordId,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UpdateStatus {
        pub record_id: RecordId,
        pub status: RecordStatus,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AmendRecord {
        pub record_id: RecordId,
        pub reason: String,
        pub encrypted_data: String,
        pub encrypted_data_hash: String,
        pub original_data_hash: String,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AuthorizeViewer {
        pub record_id: RecordId,
        pub viewer_address: Address,
    }

    /// One ciphertext version of a record, oldest first
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Revision {
        pub encrypted_data: String,
        pub encrypted_data_hash: String,
        /// Amendment justification; `None` for the original version
        pub reason: Option<String>,
        pub recorded_at: chrono::DateTime<chrono::Utc>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RecordRef {
        pub record_id: RecordId,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PatientRef {
        pub patient_id: PatientId,
    }
}
