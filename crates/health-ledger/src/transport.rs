//! Network seam of the gateway

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::receipt::TransactionReceipt;
use crate::transaction::{ContractCall, SignedTransaction};

/// Anything that can submit signed transactions and answer read-only calls
///
/// `submit` resolves once the network reports a terminal receipt. Deadlines
/// are applied by the gateway, so implementations may wait indefinitely.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    async fn submit(&self, tx: SignedTransaction) -> Result<TransactionReceipt, LedgerError>;

    /// Read-only call; an absent entity is [`LedgerError::NotFound`]
    async fn call(&self, call: ContractCall) -> Result<serde_json::Value, LedgerError>;

    /// Release network resources
    async fn close(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}
