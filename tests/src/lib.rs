//! Mycelix-Health Test Suite
//!
//! Cross-crate scenarios run against a core assembled exactly as the binary
//! assembles it, on the `local` network:
//! - End-to-end patient / doctor / record flow
//! - Failure surfacing through the response envelope
//! - Concurrent operations on the same subject
//! - Encryption and custody regressions

#[cfg(test)]
mod harness;

#[cfg(test)]
mod concurrency;
#[cfg(test)]
mod custody;
#[cfg(test)]
mod failures;
#[cfg(test)]
mod scenario;
