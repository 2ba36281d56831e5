//! Ledger Execution Gateway
//!
//! One gateway per process, shared behind `Arc`. It holds the operator signer
//! and the transport; configuration is fixed at construction.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::VerifyingKey;
use mycelix_health_shared::config::{OperatorCredentials, TimeoutConfig};
use mycelix_health_shared::Address;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::receipt::{ReceiptStatus, TransactionReceipt};
use crate::signer::TransactionSigner;
use crate::transaction::{ContractCall, ContractRef};
use crate::transport::LedgerTransport;

/// Accepted state change
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionOutcome {
    pub transaction_id: String,
    pub status: ReceiptStatus,
    pub gas_used: u64,
    pub result: Option<serde_json::Value>,
}

impl ExecutionOutcome {
    /// Decode the function return value
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, LedgerError> {
        let value = self.result.clone().ok_or_else(|| {
            LedgerError::Malformed(format!(
                "transaction {} returned no value",
                self.transaction_id
            ))
        })?;
        Ok(serde_json::from_value(value)?)
    }
}

pub struct LedgerGateway {
    transport: Arc<dyn LedgerTransport>,
    operator: TransactionSigner,
    query_timeout: Duration,
    transaction_timeout: Duration,
    closed: AtomicBool,
}

impl LedgerGateway {
    /// Build the gateway
    ///
    /// Fails with [`LedgerError::InvalidCredentials`] when operator
    /// credentials are absent or malformed; nothing else here is fatal.
    pub fn new(
        transport: Arc<dyn LedgerTransport>,
        operator: Option<&OperatorCredentials>,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, LedgerError> {
        let credentials = operator.ok_or_else(|| {
            LedgerError::InvalidCredentials("operator credentials are not configured".to_string())
        })?;
        let operator = TransactionSigner::from_operator(credentials)?;
        info!(operator = %operator.account(), "ledger gateway ready");

        Ok(Self {
            transport,
            operator,
            query_timeout: timeouts.query(),
            transaction_timeout: timeouts.transaction(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn operator_account(&self) -> &Address {
        self.operator.account()
    }

    pub fn operator_key(&self) -> VerifyingKey {
        self.operator.verifying_key()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// State-changing call signed by the operator account
    pub async fn execute(
        &self,
        contract: &ContractRef,
        function: &str,
        params: serde_json::Value,
        gas_limit: u64,
    ) -> Result<ExecutionOutcome, LedgerError> {
        self.execute_as(&self.operator, contract, function, params, gas_limit)
            .await
    }

    /// State-changing call signed by `signer` (a custodial wallet)
    ///
    /// Waits for the terminal receipt; no retry. Any non-success status is
    /// returned as [`LedgerError::Rejected`].
    pub async fn execute_as(
        &self,
        signer: &TransactionSigner,
        contract: &ContractRef,
        function: &str,
        params: serde_json::Value,
        gas_limit: u64,
    ) -> Result<ExecutionOutcome, LedgerError> {
        self.ensure_open()?;

        let tx = signer.sign_call(contract, function, params, gas_limit)?;
        let transaction_id = tx.transaction_id();
        debug!(%contract, function, %transaction_id, payer = %signer.account(), "submitting transaction");

        let operation = format!("transaction {}", function);
        let receipt = self
            .with_deadline(&operation, self.transaction_timeout, self.transport.submit(tx))
            .await?;

        outcome_from_receipt(contract, function, receipt)
    }

    /// Read-only call, decoded into `T`
    pub async fn query<T: DeserializeOwned>(
        &self,
        contract: &ContractRef,
        function: &str,
        params: serde_json::Value,
    ) -> Result<T, LedgerError> {
        let value = self.query_value(contract, function, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn query_value(
        &self,
        contract: &ContractRef,
        function: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, LedgerError> {
        self.ensure_open()?;

        let call = ContractCall {
            contract: contract.clone(),
            function: function.to_string(),
            params,
        };
        let operation = format!("query {}", function);
        let result = self
            .with_deadline(&operation, self.query_timeout, self.transport.call(call))
            .await;

        if let Err(err) = &result {
            if !matches!(err, LedgerError::NotFound(_)) {
                warn!(%contract, function, error = %err, "ledger query failed");
            }
        }
        result
    }

    /// Close the session; only the first call reaches the transport
    pub async fn close(&self) -> Result<(), LedgerError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(LedgerError::Closed);
        }
        info!("closing ledger session");
        self.transport.close().await
    }

    fn ensure_open(&self) -> Result<(), LedgerError> {
        if self.is_closed() {
            Err(LedgerError::Closed)
        } else {
            Ok(())
        }
    }

    async fn with_deadline<T, F>(
        &self,
        operation: &str,
        limit: Duration,
        fut: F,
    ) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, after_ms = limit.as_millis() as u64, "ledger call timed out");
                Err(LedgerError::Timeout {
                    operation: operation.to_string(),
                    after_ms: limit.as_millis() as u64,
                })
            }
        }
    }
}

fn outcome_from_receipt(
    contract: &ContractRef,
    function: &str,
    receipt: TransactionReceipt,
) -> Result<ExecutionOutcome, LedgerError> {
    if receipt.status.is_success() {
        info!(
            %contract,
            function,
            transaction_id = %receipt.transaction_id,
            gas_used = receipt.gas_used,
            "transaction succeeded"
        );
        return Ok(ExecutionOutcome {
            transaction_id: receipt.transaction_id,
            status: receipt.status,
            gas_used: receipt.gas_used,
            result: receipt.result,
        });
    }

    let message = receipt
        .message
        .unwrap_or_else(|| format!("transaction {} failed", receipt.transaction_id));
    warn!(
        %contract,
        function,
        transaction_id = %receipt.transaction_id,
        status = %receipt.status,
        %message,
        "transaction rejected"
    );
    Err(LedgerError::Rejected {
        status: receipt.status,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi;
    use crate::memory::{InMemoryLedger, InjectedFault};
    use crate::transaction::LedgerContracts;
    use mycelix_health_shared::{PatientIdentity, SystemClock};

    fn credentials() -> OperatorCredentials {
        OperatorCredentials {
            account_id: "0.0.1001".to_string(),
            private_key: "0a".repeat(32),
        }
    }

    fn contracts() -> LedgerContracts {
        LedgerContracts::new("0.0.2001", "0.0.2002", "0.0.2003")
    }

    fn setup() -> (Arc<InMemoryLedger>, LedgerGateway) {
        let ledger = Arc::new(InMemoryLedger::new(contracts(), Arc::new(SystemClock)));
        let gateway = LedgerGateway::new(ledger.clone(), Some(&credentials()), &TimeoutConfig::default()).unwrap();
        ledger.register_account(gateway.operator_account().clone(), gateway.operator_key());
        (ledger, gateway)
    }

    fn register_params() -> serde_json::Value {
        let signer = TransactionSigner::generate_custodial().unwrap();
        abi::params(&abi::identity::RegisterPatient {
            encrypted_personal_data: "v1:00:00".to_string(),
            metadata_hash: "ab".repeat(32),
            wallet_address: signer.account().clone(),
        })
        .unwrap()
    }

    #[test]
    fn test_missing_credentials_is_fatal() {
        let ledger = Arc::new(InMemoryLedger::new(contracts(), Arc::new(SystemClock)));
        let result = LedgerGateway::new(ledger, None, &TimeoutConfig::default());
        assert!(matches!(result, Err(LedgerError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_execute_returns_transaction_id_and_result() {
        let (_ledger, gateway) = setup();
        let outcome = gateway
            .execute(&contracts().identity, abi::identity::REGISTER_PATIENT, register_params(), 300_000)
            .await
            .unwrap();

        assert!(outcome.transaction_id.starts_with("0.0.1001@"));
        assert_eq!(outcome.status, ReceiptStatus::Success);
        let registered: abi::identity::Registered = outcome.decode().unwrap();

        let identity: PatientIdentity = gateway
            .query(
                &contracts().identity,
                abi::identity::GET_PATIENT,
                serde_json::json!({ "patientId": registered.patient_id }),
            )
            .await
            .unwrap();
        assert_eq!(identity.patient_id, registered.patient_id);
    }

    #[tokio::test]
    async fn test_insufficient_gas_is_rejection() {
        let (_ledger, gateway) = setup();
        let err = gateway
            .execute(&contracts().identity, abi::identity::REGISTER_PATIENT, register_params(), 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rejected { status: ReceiptStatus::InsufficientGas, .. }
        ));
    }

    #[tokio::test]
    async fn test_query_missing_entity_is_not_found() {
        let (_ledger, gateway) = setup();
        let err = gateway
            .query_value(
                &contracts().medical_records,
                abi::records::GET_RECORD,
                serde_json::json!({ "recordId": 999_999 }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_query_times_out() {
        let (ledger, gateway) = setup();
        ledger.inject(InjectedFault::Stall);

        let err = gateway
            .query_value(
                &contracts().identity,
                abi::identity::GET_PATIENT,
                serde_json::json!({ "patientId": 1 }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Timeout { after_ms: 5000, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_transaction_uses_longer_deadline() {
        let (ledger, gateway) = setup();
        ledger.inject(InjectedFault::Stall);

        let err = gateway
            .execute(&contracts().identity, abi::identity::REGISTER_PATIENT, register_params(), 300_000)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Timeout { after_ms: 30_000, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_is_surfaced() {
        let (ledger, gateway) = setup();
        ledger.inject(InjectedFault::Unreachable);
        let err = gateway
            .execute(&contracts().identity, abi::identity::REGISTER_PATIENT, register_params(), 300_000)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_close_is_exactly_once() {
        let (_ledger, gateway) = setup();
        assert!(gateway.close().await.is_ok());
        assert_eq!(gateway.close().await, Err(LedgerError::Closed));

        let err = gateway
            .query_value(&contracts().identity, abi::identity::GET_PATIENT, serde_json::json!({ "patientId": 1 }))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::Closed);
    }
}
