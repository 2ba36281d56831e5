//! Medical Record Lifecycle Manager
//!
//! Creates encrypted medical records, walks them through their status
//! lifecycle, records justified amendments and manages per-record viewers.

pub mod lifecycle;
pub mod manager;

pub use lifecycle::{NewRecord, RecordCreated, MIN_AMENDMENT_REASON};
pub use manager::RecordManager;
