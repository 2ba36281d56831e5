//! Identity & Custodial Key Manager
//!
//! Registers patient identities on the ledger and holds one ed25519 wallet per
//! patient on their behalf. The private key is sealed into a [`KeyVault`] and
//! the public wallet data into a [`WalletDirectory`], both only after the
//! ledger has confirmed the registration.
//!
//! - [`integrity`]: personal data, wallet records and their validation
//! - [`store`]: key vault and wallet directory backends
//! - [`coordinator`]: the [`IdentityManager`] operations

pub mod coordinator;
pub mod integrity;
pub mod store;

pub use coordinator::{IdentityManager, PatientRegistration};
pub use integrity::{PersonalData, WalletRecord};
pub use store::{
    FileKeyVault, FileWalletDirectory, KeyVault, MemoryKeyVault, MemoryWalletDirectory, StoreError,
    WalletDirectory,
};
