//! Common types used across the core crates

use serde::{Deserialize, Serialize};

use crate::error::HealthError;

/// Ledger-assigned patient identifier
pub type PatientId = u64;

/// Ledger-assigned medical record identifier
pub type RecordId = u64;

/// Ledger-assigned permission grant identifier
pub type PermissionId = u64;

/// A ledger account or wallet address
///
/// Accepts any non-empty token without whitespace: `0x`-prefixed wallet
/// addresses, `0.0.1234` style account ids, and so on.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(raw: impl Into<String>) -> Result<Self, HealthError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(HealthError::Validation("Address cannot be empty".to_string()));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(HealthError::Validation(format!(
                "Address '{}' contains whitespace",
                raw
            )));
        }
        if raw.len() > 128 {
            return Err(HealthError::Validation("Address is too long".to_string()));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = HealthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Declares a small-integer enum that crosses the ledger boundary as its code
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        pub enum $name {
            $($(#[$vmeta])* $variant = $code),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(self) -> u8 {
                self as u8
            }

            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = String;

            fn try_from(code: u8) -> Result<Self, Self::Error> {
                Self::from_code(code)
                    .ok_or_else(|| format!("invalid {} code: {}", stringify!($name), code))
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value.code()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $($name::$variant => f.write_str(stringify!($variant)),)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = HealthError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if let Ok(code) = s.parse::<u8>() {
                    return Self::from_code(code).ok_or_else(|| {
                        HealthError::Validation(format!("invalid {} code: {}", stringify!($name), code))
                    });
                }
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.to_string().eq_ignore_ascii_case(s))
                    .ok_or_else(|| {
                        HealthError::Validation(format!("unknown {}: {}", stringify!($name), s))
                    })
            }
        }
    };
}

coded_enum! {
    /// Role types for role-based access control
    pub enum Role {
        Patient = 0,
        Doctor = 1,
        Admin = 2,
        Nurse = 3,
        Pharmacist = 4,
    }
}

impl Role {
    /// Roles expected to carry a professional license number
    pub fn is_clinical(self) -> bool {
        matches!(self, Role::Doctor | Role::Nurse | Role::Pharmacist)
    }
}

coded_enum! {
    /// Kind of clinical encounter a record documents
    pub enum RecordType {
        Consultation = 0,
        Diagnosis = 1,
        Prescription = 2,
        LabResult = 3,
        Imaging = 4,
        Surgery = 5,
        Vaccination = 6,
        Emergency = 7,
        Other = 8,
    }
}

coded_enum! {
    /// Lifecycle status of a medical record
    pub enum RecordStatus {
        Draft = 0,
        Finalized = 1,
        Amended = 2,
        Cancelled = 3,
    }
}

impl RecordStatus {
    /// Whether the state machine allows moving from `self` to `next`
    ///
    /// Draft -> Finalized -> Amended (-> Amended), any non-cancelled -> Cancelled.
    pub fn can_transition_to(self, next: RecordStatus) -> bool {
        use RecordStatus::*;
        matches!(
            (self, next),
            (Draft, Finalized)
                | (Finalized, Amended)
                | (Amended, Amended)
                | (Draft, Cancelled)
                | (Finalized, Cancelled)
                | (Amended, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RecordStatus::Cancelled)
    }
}

/// Well-known action names used in permission grants
///
/// Grants carry free-form action strings; these are the ones the core itself
/// checks. Actions are compared case-insensitively (stored upper-case).
pub mod actions {
    pub const READ: &str = "READ";
    pub const WRITE: &str = "WRITE";
    pub const AMEND: &str = "AMEND";
    pub const SHARE: &str = "SHARE";
    pub const EXPORT: &str = "EXPORT";

    /// Canonical form of an action name
    pub fn normalize(action: &str) -> String {
        action.trim().to_ascii_uppercase()
    }
}
