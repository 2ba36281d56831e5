//! Medical Record Lifecycle Manager operations
//!
//! Records are written operator-signed. The medical payload is encrypted with
//! the shared codec; only the ciphertext envelope and digests reach the
//! ledger. Read paths return decoded metadata and never decrypt.

use std::sync::Arc;

use mycelix_health_access::AccessAuthority;
use mycelix_health_crypto::RecordCodec;
use mycelix_health_ledger::abi::{self, records};
use mycelix_health_ledger::{ContractRef, ExecutionOutcome, LedgerGateway};
use mycelix_health_shared::{
    actions, Address, HealthError, HealthResult, MedicalRecord, PatientId, RecordId, RecordPolicy, RecordStatus,
    TransactionResult,
};
use tracing::{info, warn};

use crate::lifecycle::{
    check_amendment, check_status_update, validate_new_record, validate_reason, NewRecord, RecordCreated,
};

/// Default gas limit for medical-records contract calls
const DEFAULT_GAS_LIMIT: u64 = 400_000;

pub struct RecordManager {
    gateway: Arc<LedgerGateway>,
    contract: ContractRef,
    codec: Arc<RecordCodec>,
    /// Set under [`RecordPolicy::RequireAuthorGrant`]
    author_check: Option<Arc<AccessAuthority>>,
    gas_limit: u64,
}

impl RecordManager {
    pub fn new(gateway: Arc<LedgerGateway>, contract: ContractRef, codec: Arc<RecordCodec>) -> Self {
        Self {
            gateway,
            contract,
            codec,
            author_check: None,
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }

    /// Require the author to hold a `WRITE` grant for the patient before creating
    pub fn with_author_grant_check(mut self, authority: Arc<AccessAuthority>) -> Self {
        self.author_check = Some(authority);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn policy(&self) -> RecordPolicy {
        match self.author_check {
            Some(_) => RecordPolicy::RequireAuthorGrant,
            None => RecordPolicy::Permissive,
        }
    }

    async fn submit(&self, function: &str, params: serde_json::Value) -> HealthResult<ExecutionOutcome> {
        Ok(self
            .gateway
            .execute(&self.contract, function, params, self.gas_limit)
            .await?)
    }

    // ==================== CREATION ====================

    /// Encrypt and commit a new record in a single transaction
    ///
    /// Returns identifiers and the ciphertext digest only; the payload is not
    /// echoed back.
    pub async fn create(&self, record: NewRecord) -> HealthResult<RecordCreated> {
        validate_new_record(&record)?;

        if let Some(authority) = &self.author_check {
            let decision = authority
                .check_access(&record.doctor_address, record.patient_id, actions::WRITE)
                .await?;
            if !decision.authorized {
                return Err(HealthError::PermissionDenied(format!(
                    "{} may not write records for patient {}: {}",
                    record.doctor_address, record.patient_id, decision.reason
                )));
            }
        }

        let plaintext = serde_json::to_vec(&record.medical_data)?;
        let encrypted_data = self.codec.encrypt(&plaintext)?;
        let encrypted_data_hash = RecordCodec::hash(encrypted_data.as_bytes());

        let params = abi::params(&records::CreateRecord {
            patient_id: record.patient_id,
            doctor_address: record.doctor_address,
            record_type: record.record_type,
            encrypted_data,
            encrypted_data_hash: encrypted_data_hash.clone(),
            original_data_hash: RecordCodec::hash(&plaintext),
            attachment_hashes: record.attachment_hashes,
            metadata: record.metadata,
            is_emergency: record.is_emergency,
            authorized_viewers: record.authorized_viewers,
        })?;
        let outcome = self.submit(records::CREATE_RECORD, params).await?;
        let created: records::Created = outcome.decode()?;

        info!(
            record_id = created.record_id,
            patient_id = record.patient_id,
            record_type = %record.record_type,
            emergency = record.is_emergency,
            transaction_id = %outcome.transaction_id,
            "medical record created"
        );
        Ok(RecordCreated {
            transaction_id: outcome.transaction_id,
            record_id: created.record_id,
            encrypted_data_hash,
        })
    }

    // ==================== READS ====================

    pub async fn get_record(&self, record_id: RecordId) -> HealthResult<MedicalRecord> {
        let params = abi::params(&records::RecordRef { record_id })?;
        Ok(self
            .gateway
            .query(&self.contract, records::GET_RECORD, params)
            .await?)
    }

    /// Every record of the patient, oldest first
    pub async fn patient_history(&self, patient_id: PatientId) -> HealthResult<Vec<MedicalRecord>> {
        let params = abi::params(&records::PatientRef { patient_id })?;
        Ok(self
            .gateway
            .query(&self.contract, records::GET_PATIENT_RECORDS, params)
            .await?)
    }

    /// Ciphertext versions of a record; the first is the original
    pub async fn revisions(&self, record_id: RecordId) -> HealthResult<Vec<records::Revision>> {
        let params = abi::params(&records::RecordRef { record_id })?;
        Ok(self
            .gateway
            .query(&self.contract, records::GET_RECORD_REVISIONS, params)
            .await?)
    }

    // ==================== LIFECYCLE ====================

    /// Move a record to a new status
    ///
    /// The current status is looked up first; transitions the lifecycle does
    /// not allow are refused without submitting anything.
    pub async fn update_status(&self, record_id: RecordId, status: RecordStatus) -> HealthResult<TransactionResult> {
        let current = self.get_record(record_id).await?;
        if let Err(err) = check_status_update(current.status, status) {
            warn!(record_id, from = %current.status, to = %status, "status transition refused");
            return Err(err);
        }

        let params = abi::params(&records::UpdateStatus { record_id, status })?;
        let outcome = self.submit(records::UPDATE_RECORD_STATUS, params).await?;
        info!(
            record_id,
            from = %current.status,
            to = %status,
            transaction_id = %outcome.transaction_id,
            "record status updated"
        );
        Ok(TransactionResult::new(outcome.transaction_id))
    }

    /// Replace the record payload with a justified amendment
    ///
    /// # Arguments
    /// * `reason` - Justification, at least ten characters
    /// * `medical_data` - New payload; re-encrypted with a fresh nonce
    pub async fn amend(
        &self,
        record_id: RecordId,
        reason: &str,
        medical_data: &serde_json::Value,
    ) -> HealthResult<TransactionResult> {
        validate_reason(reason)?;
        let current = self.get_record(record_id).await?;
        check_amendment(current.status)?;

        let plaintext = serde_json::to_vec(medical_data)?;
        let encrypted_data = self.codec.encrypt(&plaintext)?;
        let params = abi::params(&records::AmendRecord {
            record_id,
            reason: reason.trim().to_string(),
            encrypted_data_hash: RecordCodec::hash(encrypted_data.as_bytes()),
            encrypted_data,
            original_data_hash: RecordCodec::hash(&plaintext),
        })?;
        let outcome = self.submit(records::AMEND_RECORD, params).await?;
        info!(record_id, transaction_id = %outcome.transaction_id, "record amended");
        Ok(TransactionResult::new(outcome.transaction_id))
    }

    /// Add a viewer to the record; adding an existing viewer is a no-op on ledger
    pub async fn authorize_viewer(&self, record_id: RecordId, viewer: &Address) -> HealthResult<TransactionResult> {
        let params = abi::params(&records::AuthorizeViewer {
            record_id,
            viewer_address: viewer.clone(),
        })?;
        let outcome = self.submit(records::AUTHORIZE_VIEWER, params).await?;
        info!(record_id, %viewer, transaction_id = %outcome.transaction_id, "viewer authorized");
        Ok(TransactionResult::new(outcome.transaction_id))
    }
}
