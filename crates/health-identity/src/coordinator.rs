//! Identity & Custodial Key Manager operations
//!
//! Registration order matters: the keypair is generated first, the identity is
//! committed on the ledger with the new wallet as owner, and only then is the
//! key sealed and stored. A rejected registration therefore leaves nothing
//! behind locally.

use std::sync::Arc;

use mycelix_health_crypto::{KeySealer, RecordCodec};
use mycelix_health_ledger::abi::{self, identity};
use mycelix_health_ledger::{ContractRef, LedgerGateway, TransactionSigner};
use mycelix_health_shared::{
    Address, Clock, CoarseAccess, HealthError, HealthResult, PatientId, PatientIdentity, SystemClock,
    TransactionResult,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::integrity::{key_binding, validate_personal_data, PersonalData, WalletRecord};
use crate::store::{KeyVault, WalletDirectory};

/// Default gas limit for identity contract calls
const DEFAULT_GAS_LIMIT: u64 = 300_000;

/// Result of a successful registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRegistration {
    pub transaction_id: String,
    pub patient_id: PatientId,
    pub wallet_address: Address,
}

pub struct IdentityManager {
    gateway: Arc<LedgerGateway>,
    contract: ContractRef,
    codec: Arc<RecordCodec>,
    sealer: KeySealer,
    vault: Arc<dyn KeyVault>,
    wallets: Arc<dyn WalletDirectory>,
    clock: Arc<dyn Clock>,
    gas_limit: u64,
}

impl IdentityManager {
    pub fn new(
        gateway: Arc<LedgerGateway>,
        contract: ContractRef,
        codec: Arc<RecordCodec>,
        sealer: KeySealer,
        vault: Arc<dyn KeyVault>,
        wallets: Arc<dyn WalletDirectory>,
    ) -> Self {
        Self {
            gateway,
            contract,
            codec,
            sealer,
            vault,
            wallets,
            clock: Arc::new(SystemClock),
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    // ==================== REGISTRATION ====================

    /// Register a patient identity with a fresh custodial wallet
    ///
    /// # Arguments
    /// * `personal` - Demographics; encrypted before submission
    ///
    /// If the ledger accepts the identity but the wallet cannot be stored, the
    /// returned [`HealthError::Storage`] names the patient and transaction so
    /// the orphaned identity can be traced.
    pub async fn register(&self, personal: PersonalData) -> HealthResult<PatientRegistration> {
        validate_personal_data(&personal, self.clock.now().date_naive())?;

        let signer = TransactionSigner::generate_custodial()?;
        let plaintext = serde_json::to_vec(&personal)?;
        let params = abi::params(&identity::RegisterPatient {
            encrypted_personal_data: self.codec.encrypt(&plaintext)?,
            metadata_hash: RecordCodec::hash(&plaintext),
            wallet_address: signer.account().clone(),
        })?;

        let outcome = self
            .gateway
            .execute(&self.contract, identity::REGISTER_PATIENT, params, self.gas_limit)
            .await?;
        let registered: identity::Registered = outcome.decode()?;
        let patient_id = registered.patient_id;
        let transaction_id = outcome.transaction_id;

        if let Err(err) = self.persist_wallet(patient_id, &signer, &personal, &transaction_id) {
            error!(
                patient_id,
                %transaction_id,
                error = %err,
                "identity registered but custodial wallet could not be stored"
            );
            return Err(HealthError::Storage(format!(
                "patient {} was registered in transaction {} but its custodial wallet could not be stored: {}",
                patient_id, transaction_id, err
            )));
        }

        info!(patient_id, %transaction_id, wallet = %signer.account(), "patient registered");
        Ok(PatientRegistration {
            transaction_id,
            patient_id,
            wallet_address: signer.account().clone(),
        })
    }

    /// Seal the key into the vault, then record the public wallet
    ///
    /// The key is written first. If the wallet record then fails, the sealed
    /// key stays in the write-once vault for manual recovery and a retry for
    /// the same patient reports `AlreadyExists`.
    fn persist_wallet(
        &self,
        patient_id: PatientId,
        signer: &TransactionSigner,
        personal: &PersonalData,
        transaction_id: &str,
    ) -> HealthResult<()> {
        let sealed = self.sealer.seal(&signer.secret(), &key_binding(patient_id))?;
        self.vault.store(patient_id, &sealed)?;
        self.wallets.store(&WalletRecord {
            patient_id,
            name: personal.name.clone(),
            birthdate: personal.birthdate.clone(),
            wallet_address: signer.account().clone(),
            public_key: signer.public_key_hex(),
            transaction_id: transaction_id.to_string(),
            created_at: self.clock.now(),
        })?;
        Ok(())
    }

    // ==================== CUSTODIAL SIGNING ====================

    /// Restore the patient's signer from the key vault
    fn custodial_signer(&self, patient_id: PatientId) -> HealthResult<TransactionSigner> {
        let wallet = self.wallets.load(patient_id)?;
        let sealed = self.vault.load(patient_id)?;
        let secret = self.sealer.unseal(&sealed, &key_binding(patient_id))?;
        let signer = TransactionSigner::from_custodial_secret(&secret)?;

        if signer.account() != &wallet.wallet_address {
            return Err(HealthError::Storage(format!(
                "custodial key of patient {} does not match wallet {}",
                patient_id, wallet.wallet_address
            )));
        }
        Ok(signer)
    }

    /// Sign and submit a call on the patient's behalf
    pub async fn auto_sign(
        &self,
        patient_id: PatientId,
        contract: &ContractRef,
        function: &str,
        params: serde_json::Value,
    ) -> HealthResult<TransactionResult> {
        let signer = self.custodial_signer(patient_id)?;
        let outcome = self
            .gateway
            .execute_as(&signer, contract, function, params, self.gas_limit)
            .await?;
        info!(patient_id, function, transaction_id = %outcome.transaction_id, "custodial transaction committed");
        Ok(TransactionResult::new(outcome.transaction_id))
    }

    /// Replace the patient's encrypted personal data (owner-signed)
    pub async fn update_data(&self, patient_id: PatientId, personal: PersonalData) -> HealthResult<TransactionResult> {
        validate_personal_data(&personal, self.clock.now().date_naive())?;

        let plaintext = serde_json::to_vec(&personal)?;
        let params = abi::params(&identity::UpdatePatientData {
            patient_id,
            encrypted_personal_data: self.codec.encrypt(&plaintext)?,
            metadata_hash: RecordCodec::hash(&plaintext),
        })?;
        self.auto_sign(patient_id, &self.contract, identity::UPDATE_PATIENT_DATA, params)
            .await
    }

    /// Deactivate the identity (owner-signed); it is never deleted
    pub async fn deactivate_patient(&self, patient_id: PatientId) -> HealthResult<TransactionResult> {
        let params = abi::params(&identity::PatientRef { patient_id })?;
        self.auto_sign(patient_id, &self.contract, identity::DEACTIVATE_PATIENT, params)
            .await
    }

    // ==================== COARSE ACCESS ====================

    /// Set the coarse doctor access toggle to granted
    pub async fn grant_access(&self, patient_id: PatientId, doctor: &Address) -> HealthResult<TransactionResult> {
        self.set_access(patient_id, doctor, identity::GRANT_ACCESS).await
    }

    /// Set the coarse doctor access toggle to revoked
    pub async fn revoke_access(&self, patient_id: PatientId, doctor: &Address) -> HealthResult<TransactionResult> {
        self.set_access(patient_id, doctor, identity::REVOKE_ACCESS).await
    }

    async fn set_access(
        &self,
        patient_id: PatientId,
        doctor: &Address,
        function: &str,
    ) -> HealthResult<TransactionResult> {
        let params = abi::params(&identity::DoctorAccess {
            patient_id,
            doctor_address: doctor.clone(),
        })?;
        let outcome = self
            .gateway
            .execute(&self.contract, function, params, self.gas_limit)
            .await?;
        info!(patient_id, %doctor, function, transaction_id = %outcome.transaction_id, "coarse access updated");
        Ok(TransactionResult::new(outcome.transaction_id))
    }

    pub async fn coarse_access(&self, patient_id: PatientId, doctor: &Address) -> HealthResult<CoarseAccess> {
        let params = abi::params(&identity::DoctorAccess {
            patient_id,
            doctor_address: doctor.clone(),
        })?;
        Ok(self
            .gateway
            .query(&self.contract, identity::GET_ACCESS_STATE, params)
            .await?)
    }

    // ==================== READS ====================

    /// Ledger identity record; personal data stays encrypted
    pub async fn get_patient(&self, patient_id: PatientId) -> HealthResult<PatientIdentity> {
        let params = abi::params(&identity::PatientRef { patient_id })?;
        Ok(self
            .gateway
            .query(&self.contract, identity::GET_PATIENT, params)
            .await?)
    }

    /// Public wallet data held for the patient
    pub fn wallet(&self, patient_id: PatientId) -> HealthResult<WalletRecord> {
        Ok(self.wallets.load(patient_id)?)
    }
}
