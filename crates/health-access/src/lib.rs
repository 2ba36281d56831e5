//! Access Control Authority
//!
//! Participant registry, time-bounded permission grants, permission
//! evaluation and the append-only access log.
//!
//! - [`decision`]: pure evaluation of one access attempt
//! - [`authority`]: the [`AccessAuthority`] operations

pub mod authority;
pub mod decision;

pub use authority::{AccessAuthority, PermissionGranted};
pub use decision::AccessDecision;
