//! Mycelix-Health Ledger Execution Gateway
//!
//! The only component that talks to the ledger network. Everything that
//! leaves the core as a state change is an ed25519-signed [`TransactionBody`]
//! submitted through a [`LedgerTransport`]; the [`LedgerGateway`] wraps each
//! submission and query in a deadline and turns receipts into
//! `Result<_, LedgerError>`.
//!
//! Two transports ship with the crate:
//! - [`JsonRpcTransport`] for a real network endpoint
//! - [`InMemoryLedger`], an in-process simulator of the identity,
//!   access-control and medical-records contracts
//!
//! The typed call surface of those contracts lives in [`abi`].

pub mod abi;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod receipt;
pub mod rpc;
pub mod signer;
pub mod transaction;
pub mod transport;

pub use error::LedgerError;
pub use gateway::{ExecutionOutcome, LedgerGateway};
pub use memory::{InMemoryLedger, InjectedFault};
pub use receipt::{ReceiptStatus, TransactionReceipt};
pub use rpc::JsonRpcTransport;
pub use signer::{wallet_address, TransactionSigner};
pub use transaction::{ContractCall, ContractRef, LedgerContracts, SignedTransaction, TransactionBody};
pub use transport::LedgerTransport;
