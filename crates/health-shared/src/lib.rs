//! Mycelix-Health Shared Utilities
//!
//! This crate provides common functionality for every Mycelix-Health core crate:
//! - Domain enums and identifiers (roles, record types, record status)
//! - Ledger entry types (participants, identities, grants, records, access logs)
//! - Error taxonomy and the success/failure response envelope
//! - Configuration loading
//! - Clock abstraction
//! - Tracing setup

pub mod clock;
pub mod config;
pub mod entries;
pub mod error;
pub mod response;
pub mod telemetry;
pub mod types;

// Re-export commonly used items
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{HealthConfig, LedgerNetwork, LogFormat, RecordPolicy};
pub use entries::*;
pub use error::{ErrorKind, HealthError, HealthResult};
pub use response::{ServiceResponse, TransactionResult};
pub use types::*;
