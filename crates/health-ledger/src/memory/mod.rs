//! In-process ledger simulator
//!
//! Executes the identity, access-control and medical-records contracts
//! against in-memory state. It behaves like the network where the core can
//! observe it:
//! - signatures are verified and the payer must own the signing key
//! - replayed transaction ids are refused
//! - gas is charged per function; an undersized limit fails the receipt
//! - identifiers are assigned by the ledger, starting at 1
//!
//! Faults can be queued with [`InMemoryLedger::inject`] to exercise
//! unreachable, stalled and reverting networks.

mod access;
mod identity;
mod records;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ed25519_dalek::VerifyingKey;
use mycelix_health_shared::{Address, Clock};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::LedgerError;
use crate::receipt::{ReceiptStatus, TransactionReceipt};
use crate::signer::{verify_transaction, wallet_address};
use crate::transaction::{ContractCall, ContractRef, LedgerContracts, SignedTransaction};
use crate::transport::LedgerTransport;

use access::AccessContract;
use identity::IdentityContract;
use records::RecordsContract;

/// Gas charged when a transaction fails before execution
const BASE_GAS: u64 = 1_000;

/// A failure to apply to the next submission or call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InjectedFault {
    /// The network cannot be reached
    Unreachable,
    /// The network never answers
    Stall,
    /// The next submission reverts with this reason
    Revert(String),
}

/// Entry of the simulator's transaction log
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggedTransaction {
    pub transaction_id: String,
    pub contract: ContractRef,
    pub function: String,
    pub payer: Address,
    pub status: ReceiptStatus,
}

/// Execution context handed to contract functions
pub(crate) struct CallContext {
    pub sender: Address,
    pub now: DateTime<Utc>,
}

/// A contract the simulator can execute
pub(crate) trait SimulatedContract {
    /// Gas cost of a state-changing function, `None` if the function does not exist
    fn gas_cost(&self, function: &str) -> Option<u64>;

    fn execute(
        &mut self,
        ctx: &CallContext,
        function: &str,
        params: serde_json::Value,
    ) -> Result<Option<serde_json::Value>, LedgerError>;

    fn query(&self, function: &str, params: serde_json::Value) -> Result<serde_json::Value, LedgerError>;
}

/// Decode call parameters, reverting on a shape mismatch
pub(crate) fn decode_params<T: DeserializeOwned>(
    function: &str,
    params: serde_json::Value,
) -> Result<T, LedgerError> {
    serde_json::from_value(params)
        .map_err(|e| LedgerError::reverted(format!("invalid parameters for {}: {}", function, e)))
}

pub(crate) fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, LedgerError> {
    Ok(serde_json::to_value(value)?)
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Address, VerifyingKey>,
    seen: HashSet<String>,
    faults: VecDeque<InjectedFault>,
    log: Vec<LoggedTransaction>,
    identity: IdentityContract,
    access: AccessContract,
    records: RecordsContract,
}

impl LedgerState {
    fn contract_mut(
        &mut self,
        contracts: &LedgerContracts,
        target: &ContractRef,
    ) -> Option<&mut dyn SimulatedContract> {
        if target == &contracts.identity {
            Some(&mut self.identity)
        } else if target == &contracts.access_control {
            Some(&mut self.access)
        } else if target == &contracts.medical_records {
            Some(&mut self.records)
        } else {
            None
        }
    }

    fn contract(&self, contracts: &LedgerContracts, target: &ContractRef) -> Option<&dyn SimulatedContract> {
        if target == &contracts.identity {
            Some(&self.identity)
        } else if target == &contracts.access_control {
            Some(&self.access)
        } else if target == &contracts.medical_records {
            Some(&self.records)
        } else {
            None
        }
    }

    /// Check that the signer is allowed to pay for the transaction
    fn authorize_payer(&self, tx: &SignedTransaction, key: &VerifyingKey) -> Result<(), String> {
        let payer = &tx.body.payer;
        if let Some(registered) = self.accounts.get(payer) {
            return if registered == key {
                Ok(())
            } else {
                Err(format!("key does not belong to account {}", payer))
            };
        }
        match wallet_address(key) {
            Ok(derived) if &derived == payer => Ok(()),
            _ => Err(format!("unknown payer account {}", payer)),
        }
    }
}

pub struct InMemoryLedger {
    contracts: LedgerContracts,
    clock: Arc<dyn Clock>,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(contracts: LedgerContracts, clock: Arc<dyn Clock>) -> Self {
        Self {
            contracts,
            clock,
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn contracts(&self) -> &LedgerContracts {
        &self.contracts
    }

    /// Register a named account (e.g. the operator) and its signing key
    pub fn register_account(&self, account: Address, key: VerifyingKey) {
        self.lock().accounts.insert(account, key);
    }

    /// Queue a fault for the next submission or call
    pub fn inject(&self, fault: InjectedFault) {
        self.lock().faults.push_back(fault);
    }

    /// Every submission that produced a receipt, in order
    pub fn transaction_log(&self) -> Vec<LoggedTransaction> {
        self.lock().log.clone()
    }

    /// Number of submissions that invoked `function`
    pub fn submissions_of(&self, function: &str) -> usize {
        self.lock().log.iter().filter(|t| t.function == function).count()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_fault(&self) -> Option<InjectedFault> {
        self.lock().faults.pop_front()
    }

    fn apply(&self, tx: SignedTransaction) -> TransactionReceipt {
        let transaction_id = tx.transaction_id();
        let mut state = self.lock();

        let authorized = verify_transaction(&tx)
            .map_err(|e| e.to_string())
            .and_then(|key| state.authorize_payer(&tx, &key));

        let receipt = match authorized {
            Err(reason) => TransactionReceipt::failure(
                transaction_id.clone(),
                ReceiptStatus::InvalidSignature,
                0,
                reason,
            ),
            Ok(()) => {
                if state.seen.insert(transaction_id.clone()) {
                    self.run(&mut state, &tx, transaction_id.clone())
                } else {
                    TransactionReceipt::failure(
                        transaction_id.clone(),
                        ReceiptStatus::DuplicateTransaction,
                        0,
                        "transaction id already used",
                    )
                }
            }
        };

        state.log.push(LoggedTransaction {
            transaction_id,
            contract: tx.body.contract.clone(),
            function: tx.body.function.clone(),
            payer: tx.body.payer.clone(),
            status: receipt.status,
        });
        receipt
    }

    fn run(&self, state: &mut LedgerState, tx: &SignedTransaction, transaction_id: String) -> TransactionReceipt {
        let body = &tx.body;
        let Some(contract) = state.contract_mut(&self.contracts, &body.contract) else {
            return TransactionReceipt::failure(
                transaction_id,
                ReceiptStatus::Reverted,
                BASE_GAS,
                format!("no contract deployed at {}", body.contract),
            );
        };

        let Some(cost) = contract.gas_cost(&body.function) else {
            return TransactionReceipt::failure(
                transaction_id,
                ReceiptStatus::Reverted,
                BASE_GAS,
                format!("unknown function {}", body.function),
            );
        };
        if body.gas_limit < cost {
            return TransactionReceipt::failure(
                transaction_id,
                ReceiptStatus::InsufficientGas,
                body.gas_limit,
                format!("{} needs {} gas, limit was {}", body.function, cost, body.gas_limit),
            );
        }

        let ctx = CallContext {
            sender: body.payer.clone(),
            now: self.clock.now(),
        };
        match contract.execute(&ctx, &body.function, body.params.clone()) {
            Ok(result) => TransactionReceipt::success(transaction_id, cost, result),
            Err(LedgerError::Rejected { status, message }) => {
                TransactionReceipt::failure(transaction_id, status, cost, message)
            }
            Err(other) => {
                TransactionReceipt::failure(transaction_id, ReceiptStatus::Reverted, cost, other.to_string())
            }
        }
    }
}

#[async_trait]
impl LedgerTransport for InMemoryLedger {
    async fn submit(&self, tx: SignedTransaction) -> Result<TransactionReceipt, LedgerError> {
        match self.next_fault() {
            Some(InjectedFault::Unreachable) => {
                return Err(LedgerError::Unreachable("simulated network partition".to_string()))
            }
            Some(InjectedFault::Stall) => std::future::pending::<()>().await,
            Some(InjectedFault::Revert(reason)) => {
                let transaction_id = tx.transaction_id();
                self.lock().log.push(LoggedTransaction {
                    transaction_id: transaction_id.clone(),
                    contract: tx.body.contract.clone(),
                    function: tx.body.function.clone(),
                    payer: tx.body.payer.clone(),
                    status: ReceiptStatus::Reverted,
                });
                return Ok(TransactionReceipt::failure(
                    transaction_id,
                    ReceiptStatus::Reverted,
                    BASE_GAS,
                    reason,
                ));
            }
            None => {}
        }

        let receipt = self.apply(tx);
        debug!(transaction_id = %receipt.transaction_id, status = %receipt.status, "simulated receipt");
        Ok(receipt)
    }

    async fn call(&self, call: ContractCall) -> Result<serde_json::Value, LedgerError> {
        match self.next_fault() {
            Some(InjectedFault::Unreachable) => {
                return Err(LedgerError::Unreachable("simulated network partition".to_string()))
            }
            Some(InjectedFault::Stall) => std::future::pending::<()>().await,
            Some(InjectedFault::Revert(reason)) => return Err(LedgerError::reverted(reason)),
            None => {}
        }

        let state = self.lock();
        let contract = state
            .contract(&self.contracts, &call.contract)
            .ok_or_else(|| LedgerError::reverted(format!("no contract deployed at {}", call.contract)))?;
        contract.query(&call.function, call.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi;
    use crate::signer::TransactionSigner;
    use ed25519_dalek::SigningKey;
    use mycelix_health_shared::SystemClock;

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(
            LedgerContracts::new("0.0.2001", "0.0.2002", "0.0.2003"),
            Arc::new(SystemClock),
        )
    }

    fn register_tx(signer: &TransactionSigner, owner: &TransactionSigner) -> SignedTransaction {
        let params = abi::params(&abi::identity::RegisterPatient {
            encrypted_personal_data: "v1:aa:bb".to_string(),
            metadata_hash: "cd".repeat(32),
            wallet_address: owner.account().clone(),
        })
        .unwrap();
        signer
            .sign_call(&ContractRef::new("0.0.2001"), abi::identity::REGISTER_PATIENT, params, 300_000)
            .unwrap()
    }

    #[tokio::test]
    async fn test_replay_is_rejected() {
        let ledger = ledger();
        let wallet = TransactionSigner::generate_custodial().unwrap();
        let tx = register_tx(&wallet, &wallet);

        let first = ledger.submit(tx.clone()).await.unwrap();
        assert_eq!(first.status, ReceiptStatus::Success);
        let second = ledger.submit(tx).await.unwrap();
        assert_eq!(second.status, ReceiptStatus::DuplicateTransaction);
    }

    #[tokio::test]
    async fn test_unknown_payer_is_invalid_signature() {
        let ledger = ledger();
        let owner = TransactionSigner::generate_custodial().unwrap();
        let impostor = TransactionSigner::new(
            Address::parse("0.0.9999").unwrap(),
            SigningKey::from_bytes(&[9u8; 32]),
        );

        let receipt = ledger.submit(register_tx(&impostor, &owner)).await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::InvalidSignature);
    }

    #[tokio::test]
    async fn test_registered_account_must_use_its_key() {
        let ledger = ledger();
        let real = TransactionSigner::generate_custodial().unwrap();
        let operator = Address::parse("0.0.1001").unwrap();
        ledger.register_account(operator.clone(), real.verifying_key());

        let forged = TransactionSigner::new(operator, SigningKey::from_bytes(&[9u8; 32]));
        let receipt = ledger.submit(register_tx(&forged, &real)).await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::InvalidSignature);
    }

    #[tokio::test]
    async fn test_unknown_contract_and_function_revert() {
        let ledger = ledger();
        let wallet = TransactionSigner::generate_custodial().unwrap();

        let tx = wallet
            .sign_call(&ContractRef::new("0.0.7777"), "anything", serde_json::json!({}), 1_000_000)
            .unwrap();
        assert_eq!(ledger.submit(tx).await.unwrap().status, ReceiptStatus::Reverted);

        let tx = wallet
            .sign_call(&ContractRef::new("0.0.2001"), "self_destruct", serde_json::json!({}), 1_000_000)
            .unwrap();
        assert_eq!(ledger.submit(tx).await.unwrap().status, ReceiptStatus::Reverted);
    }

    #[tokio::test]
    async fn test_injected_revert_is_logged() {
        let ledger = ledger();
        ledger.inject(InjectedFault::Revert("paused".to_string()));
        let wallet = TransactionSigner::generate_custodial().unwrap();

        let receipt = ledger.submit(register_tx(&wallet, &wallet)).await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Reverted);
        assert_eq!(receipt.message.as_deref(), Some("paused"));
        assert_eq!(ledger.submissions_of(abi::identity::REGISTER_PATIENT), 1);

        // Fault is consumed
        let receipt = ledger.submit(register_tx(&wallet, &wallet)).await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Success);
    }
}
