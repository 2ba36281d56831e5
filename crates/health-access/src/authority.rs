//! Access Control Authority operations
//!
//! Participant directory, permission grants and the access log all live on
//! the access-control contract. Permission checks are evaluated fresh on
//! every call from ledger state; nothing is cached here.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mycelix_health_ledger::abi::{self, access, identity};
use mycelix_health_ledger::{ContractRef, ExecutionOutcome, LedgerError, LedgerGateway};
use mycelix_health_shared::{
    actions, AccessLogEntry, Address, Clock, CoarseAccess, HealthError, HealthResult, Participant, PatientId,
    PermissionGrant, PermissionId, Role, SystemClock, TransactionResult,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::decision::{evaluate, AccessContext, AccessDecision};

/// Default gas limit for access-control contract calls
const DEFAULT_GAS_LIMIT: u64 = 200_000;

/// Result of a committed permission grant
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGranted {
    pub transaction_id: String,
    pub permission_id: PermissionId,
}

pub struct AccessAuthority {
    gateway: Arc<LedgerGateway>,
    contract: ContractRef,
    /// Identity contract, consulted for the coarse access toggle
    identity: ContractRef,
    clock: Arc<dyn Clock>,
    gas_limit: u64,
}

impl AccessAuthority {
    pub fn new(gateway: Arc<LedgerGateway>, contract: ContractRef, identity: ContractRef) -> Self {
        Self {
            gateway,
            contract,
            identity,
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

    async fn submit(&self, function: &str, params: serde_json::Value) -> HealthResult<ExecutionOutcome> {
        Ok(self
            .gateway
            .execute(&self.contract, function, params, self.gas_limit)
            .await?)
    }

    // ==================== PARTICIPANTS ====================

    /// Register a platform participant
    ///
    /// # Arguments
    /// * `public_key` - Hex-encoded public key of the participant
    /// * `professional_id` - License number; expected for clinical roles
    pub async fn register_user(
        &self,
        address: &Address,
        role: Role,
        public_key: &str,
        professional_id: Option<String>,
    ) -> HealthResult<TransactionResult> {
        // Validate public key is non-empty hex
        let public_key = public_key.trim();
        if public_key.is_empty() || !public_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HealthError::Validation(
                "Public key must be a non-empty hex string".to_string(),
            ));
        }

        let professional_id = professional_id.filter(|id| !id.trim().is_empty());
        if role.is_clinical() && professional_id.is_none() {
            warn!(%address, ?role, "clinical participant registered without professional id");
        }

        let params = abi::params(&access::RegisterUser {
            address: address.clone(),
            role,
            public_key: public_key.to_ascii_lowercase(),
            professional_id,
        })?;
        let outcome = self.submit(access::REGISTER_USER, params).await?;
        info!(%address, ?role, transaction_id = %outcome.transaction_id, "participant registered");
        Ok(TransactionResult::new(outcome.transaction_id))
    }

    /// Deactivate a participant; they are never deleted
    pub async fn deactivate_user(&self, address: &Address) -> HealthResult<TransactionResult> {
        let params = abi::params(&access::UserRef {
            address: address.clone(),
        })?;
        let outcome = self.submit(access::DEACTIVATE_USER, params).await?;
        info!(%address, transaction_id = %outcome.transaction_id, "participant deactivated");
        Ok(TransactionResult::new(outcome.transaction_id))
    }

    pub async fn get_user(&self, address: &Address) -> HealthResult<Participant> {
        let params = abi::params(&access::UserRef {
            address: address.clone(),
        })?;
        Ok(self
            .gateway
            .query(&self.contract, access::GET_USER, params)
            .await?)
    }

    /// Participant lookup where absence is an answer, not an error
    async fn find_user(&self, address: &Address) -> HealthResult<Option<Participant>> {
        match self.get_user(address).await {
            Ok(user) => Ok(Some(user)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    // ==================== PERMISSIONS ====================

    /// Grant `grantee` the listed actions on a patient until `expiration_date`
    pub async fn grant_permission(
        &self,
        grantor: &Address,
        grantee: &Address,
        patient_id: PatientId,
        expiration_date: DateTime<Utc>,
        allowed_actions: &[&str],
    ) -> HealthResult<PermissionGranted> {
        // Validate at least one action
        let allowed_actions: BTreeSet<String> = allowed_actions
            .iter()
            .map(|a| actions::normalize(a))
            .filter(|a| !a.is_empty())
            .collect();
        if allowed_actions.is_empty() {
            return Err(HealthError::Validation(
                "At least one allowed action is required".to_string(),
            ));
        }

        // Validate expiration is in the future
        if expiration_date <= self.clock.now() {
            return Err(HealthError::Validation(
                "Expiration date must be in the future".to_string(),
            ));
        }

        // Validate grantee is an active participant
        match self.find_user(grantee).await? {
            Some(user) if user.is_active => {}
            Some(_) => {
                return Err(HealthError::Validation(format!(
                    "Grantee {} is deactivated",
                    grantee
                )))
            }
            None => {
                return Err(HealthError::Validation(format!(
                    "Grantee {} is not a registered user",
                    grantee
                )))
            }
        }

        let params = abi::params(&access::GrantPermission {
            grantor: grantor.clone(),
            grantee: grantee.clone(),
            patient_id,
            expiration_date,
            allowed_actions,
        })?;
        let outcome = self.submit(access::GRANT_PERMISSION, params).await?;
        let granted: access::Granted = outcome.decode()?;

        info!(
            permission_id = granted.permission_id,
            patient_id,
            %grantee,
            transaction_id = %outcome.transaction_id,
            "permission granted"
        );
        Ok(PermissionGranted {
            transaction_id: outcome.transaction_id,
            permission_id: granted.permission_id,
        })
    }

    /// Revoke a grant; revocation is final
    pub async fn revoke_permission(&self, permission_id: PermissionId) -> HealthResult<TransactionResult> {
        let grant = self.get_permission(permission_id).await?;
        if !grant.is_active {
            return Err(HealthError::Validation(format!(
                "Permission {} is already revoked",
                permission_id
            )));
        }

        let params = abi::params(&access::PermissionRef { permission_id })?;
        let outcome = self.submit(access::REVOKE_PERMISSION, params).await?;
        info!(
            permission_id,
            patient_id = grant.patient_id,
            transaction_id = %outcome.transaction_id,
            "permission revoked"
        );
        Ok(TransactionResult::new(outcome.transaction_id))
    }

    pub async fn get_permission(&self, permission_id: PermissionId) -> HealthResult<PermissionGrant> {
        let params = abi::params(&access::PermissionRef { permission_id })?;
        Ok(self
            .gateway
            .query(&self.contract, access::GET_PERMISSION, params)
            .await?)
    }

    /// Every grant ever issued for the patient, revoked and expired included
    pub async fn patient_permissions(&self, patient_id: PatientId) -> HealthResult<Vec<PermissionGrant>> {
        let params = abi::params(&access::PatientRef { patient_id })?;
        Ok(self
            .gateway
            .query(&self.contract, access::GET_PATIENT_PERMISSIONS, params)
            .await?)
    }

    // ==================== EVALUATION ====================

    async fn coarse_access(&self, patient_id: PatientId, user: &Address) -> HealthResult<CoarseAccess> {
        let params = abi::params(&identity::DoctorAccess {
            patient_id,
            doctor_address: user.clone(),
        })?;
        match self
            .gateway
            .query(&self.identity, identity::GET_ACCESS_STATE, params)
            .await
        {
            Ok(state) => Ok(state),
            // Unknown patient on the identity contract: never toggled
            Err(LedgerError::NotFound(_)) => Ok(CoarseAccess::Unset),
            Err(err) => Err(err.into()),
        }
    }

    /// Evaluate whether `user` may perform `action` on a patient right now
    pub async fn evaluate(&self, user: &Address, patient_id: PatientId, action: &str) -> HealthResult<AccessDecision> {
        let participant = self.find_user(user).await?;
        let coarse = self.coarse_access(patient_id, user).await?;
        let grants = self.patient_permissions(patient_id).await?;

        let decision = evaluate(
            &AccessContext {
                user,
                participant: participant.as_ref(),
                patient_id,
                coarse,
                grants: &grants,
                now: self.clock.now(),
            },
            action,
        );
        debug!(%user, patient_id, action, authorized = decision.authorized, reason = %decision.reason, "access evaluated");
        Ok(decision)
    }

    pub async fn has_permission(&self, user: &Address, patient_id: PatientId, action: &str) -> HealthResult<bool> {
        Ok(self.evaluate(user, patient_id, action).await?.authorized)
    }

    /// Evaluate and record the attempt in the access log
    ///
    /// Denied attempts are logged as well; the returned decision carries the
    /// log transaction id.
    pub async fn check_access(
        &self,
        user: &Address,
        patient_id: PatientId,
        action: &str,
    ) -> HealthResult<AccessDecision> {
        let mut decision = self.evaluate(user, patient_id, action).await?;
        let logged = self
            .log_access(user, patient_id, action, decision.authorized, &decision.reason)
            .await?;
        decision.log_transaction_id = Some(logged.transaction_id);

        if !decision.authorized {
            warn!(%user, patient_id, action, reason = %decision.reason, "access denied");
        }
        Ok(decision)
    }

    // ==================== AUDIT ====================

    /// Append an entry to the access log
    pub async fn log_access(
        &self,
        accessor: &Address,
        patient_id: PatientId,
        action: &str,
        success: bool,
        details: &str,
    ) -> HealthResult<TransactionResult> {
        let params = abi::params(&access::LogAccess {
            accessor: accessor.clone(),
            patient_id,
            action: actions::normalize(action),
            success,
            details: details.to_string(),
        })?;
        let outcome = self.submit(access::LOG_ACCESS, params).await?;
        debug!(%accessor, patient_id, success, transaction_id = %outcome.transaction_id, "access logged");
        Ok(TransactionResult::new(outcome.transaction_id))
    }

    pub async fn access_logs(&self, patient_id: PatientId) -> HealthResult<Vec<AccessLogEntry>> {
        let params = abi::params(&access::PatientRef { patient_id })?;
        Ok(self
            .gateway
            .query(&self.contract, access::GET_ACCESS_LOGS, params)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mycelix_health_ledger::{InMemoryLedger, LedgerContracts};
    use mycelix_health_shared::config::{OperatorCredentials, TimeoutConfig};
    use mycelix_health_shared::{ErrorKind, ManualClock};

    struct Harness {
        ledger: Arc<InMemoryLedger>,
        gateway: Arc<LedgerGateway>,
        contracts: LedgerContracts,
        clock: Arc<ManualClock>,
        authority: AccessAuthority,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::starting_now());
        let contracts = LedgerContracts::new("0.0.2001", "0.0.2002", "0.0.2003");
        let ledger = Arc::new(InMemoryLedger::new(contracts.clone(), clock.clone()));
        let operator = OperatorCredentials {
            account_id: "0.0.1001".to_string(),
            private_key: "0b".repeat(32),
        };
        let gateway = Arc::new(
            LedgerGateway::new(ledger.clone(), Some(&operator), &TimeoutConfig::default()).unwrap(),
        );
        ledger.register_account(gateway.operator_account().clone(), gateway.operator_key());

        let authority = AccessAuthority::new(
            gateway.clone(),
            contracts.access_control.clone(),
            contracts.identity.clone(),
        )
        .with_clock(clock.clone());
        Harness {
            ledger,
            gateway,
            contracts,
            clock,
            authority,
        }
    }

    fn doctor() -> Address {
        Address::parse("0xd0c7").unwrap()
    }

    fn patient_wallet() -> Address {
        Address::parse("0xpa71e47").unwrap()
    }

    async fn register_doctor(h: &Harness) {
        h.authority
            .register_user(&doctor(), Role::Doctor, &"ab".repeat(32), Some("KMPDC-1234".to_string()))
            .await
            .unwrap();
    }

    async fn grant_read(h: &Harness, patient_id: PatientId, valid_for: Duration) -> PermissionGranted {
        h.authority
            .grant_permission(
                &patient_wallet(),
                &doctor(),
                patient_id,
                h.clock.now() + valid_for,
                &["read"],
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_and_get_user() {
        let h = harness();
        register_doctor(&h).await;

        let user = h.authority.get_user(&doctor()).await.unwrap();
        assert_eq!(user.role, Role::Doctor);
        assert!(user.is_active);
        assert_eq!(user.professional_id.as_deref(), Some("KMPDC-1234"));

        let missing = h.authority.get_user(&Address::parse("0xnobody").unwrap()).await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_register_user_rejects_non_hex_key() {
        let h = harness();
        let err = h
            .authority
            .register_user(&doctor(), Role::Doctor, "not-a-key", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(h.ledger.transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_grant_then_revoke() {
        let h = harness();
        register_doctor(&h).await;

        let granted = grant_read(&h, 1, Duration::days(30)).await;
        assert!(h.authority.has_permission(&doctor(), 1, "READ").await.unwrap());
        assert!(!h.authority.has_permission(&doctor(), 1, "WRITE").await.unwrap());
        assert!(!h.authority.has_permission(&doctor(), 2, "READ").await.unwrap());

        h.authority.revoke_permission(granted.permission_id).await.unwrap();
        assert!(!h.authority.has_permission(&doctor(), 1, "READ").await.unwrap());

        // Revocation is final
        let again = h.authority.revoke_permission(granted.permission_id).await.unwrap_err();
        assert_eq!(again.kind(), ErrorKind::Validation);
        assert!(!h.authority.get_permission(granted.permission_id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_grant_validity_decays_with_time() {
        let h = harness();
        register_doctor(&h).await;
        grant_read(&h, 1, Duration::hours(1)).await;

        assert!(h.authority.has_permission(&doctor(), 1, "READ").await.unwrap());
        h.clock.advance(Duration::hours(1) + Duration::seconds(1));
        assert!(!h.authority.has_permission(&doctor(), 1, "READ").await.unwrap());
    }

    #[tokio::test]
    async fn test_grant_validation_happens_before_submission() {
        let h = harness();
        register_doctor(&h).await;
        let before = h.ledger.transaction_log().len();

        let past = h
            .authority
            .grant_permission(&patient_wallet(), &doctor(), 1, h.clock.now() - Duration::seconds(1), &["READ"])
            .await
            .unwrap_err();
        assert_eq!(past.kind(), ErrorKind::Validation);

        let empty = h
            .authority
            .grant_permission(&patient_wallet(), &doctor(), 1, h.clock.now() + Duration::days(1), &[" "])
            .await
            .unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::Validation);

        let stranger = h
            .authority
            .grant_permission(
                &patient_wallet(),
                &Address::parse("0xstranger").unwrap(),
                1,
                h.clock.now() + Duration::days(1),
                &["READ"],
            )
            .await
            .unwrap_err();
        assert_eq!(stranger.kind(), ErrorKind::Validation);

        assert_eq!(h.ledger.transaction_log().len(), before);
    }

    #[tokio::test]
    async fn test_revoke_unknown_permission_is_not_found() {
        let h = harness();
        let err = h.authority.revoke_permission(404).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_deactivated_user_has_no_permission() {
        let h = harness();
        register_doctor(&h).await;
        grant_read(&h, 1, Duration::days(1)).await;

        h.authority.deactivate_user(&doctor()).await.unwrap();
        assert!(!h.authority.has_permission(&doctor(), 1, "READ").await.unwrap());
        assert!(!h.authority.get_user(&doctor()).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_coarse_revocation_vetoes_grant() {
        let h = harness();
        register_doctor(&h).await;
        let identity_params = abi::params(&identity::RegisterPatient {
            encrypted_personal_data: "sealed".to_string(),
            metadata_hash: "00".repeat(32),
            wallet_address: patient_wallet(),
        })
        .unwrap();
        h.gateway
            .execute(&h.contracts.identity, identity::REGISTER_PATIENT, identity_params, 300_000)
            .await
            .unwrap();
        grant_read(&h, 1, Duration::days(1)).await;
        assert!(h.authority.has_permission(&doctor(), 1, "READ").await.unwrap());

        let params = abi::params(&identity::DoctorAccess {
            patient_id: 1,
            doctor_address: doctor(),
        })
        .unwrap();
        h.gateway
            .execute(&h.contracts.identity, identity::REVOKE_ACCESS, params, 100_000)
            .await
            .unwrap();

        let decision = h.authority.evaluate(&doctor(), 1, "READ").await.unwrap();
        assert!(!decision.authorized);
        assert!(decision.reason.contains("revoked"));
    }

    #[tokio::test]
    async fn test_check_access_logs_both_outcomes() {
        let h = harness();
        register_doctor(&h).await;
        grant_read(&h, 1, Duration::days(1)).await;

        let permitted = h.authority.check_access(&doctor(), 1, "READ").await.unwrap();
        assert!(permitted.authorized);
        assert!(permitted.permission_id.is_some());
        assert!(permitted.log_transaction_id.is_some());

        let denied = h.authority.check_access(&doctor(), 1, "EXPORT").await.unwrap();
        assert!(!denied.authorized);

        let logs = h.authority.access_logs(1).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].success);
        assert!(!logs[1].success);
        assert_eq!(logs[1].action, "EXPORT");
    }

    #[tokio::test]
    async fn test_patient_permissions_lists_all_grants() {
        let h = harness();
        register_doctor(&h).await;
        let first = grant_read(&h, 1, Duration::days(1)).await;
        grant_read(&h, 1, Duration::days(2)).await;
        h.authority.revoke_permission(first.permission_id).await.unwrap();

        let grants = h.authority.patient_permissions(1).await.unwrap();
        assert_eq!(grants.len(), 2);
        assert_eq!(grants.iter().filter(|g| g.is_active).count(), 1);
    }
}
