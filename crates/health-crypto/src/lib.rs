//! Mycelix-Health Crypto
//!
//! Everything that protects a payload before it leaves the service boundary:
//! - Authenticated payload encryption ([`RecordCodec`])
//! - Key-independent integrity digests ([`sha256_hex`])
//! - Sealing of custodial wallet keys at rest ([`KeySealer`])
//! - Purpose-bound subkey derivation ([`derive_subkey`])
//!
//! # Encryption scheme
//!
//! Payloads are encrypted with XChaCha20-Poly1305 under a process-wide key.
//! Every call draws a fresh 192-bit nonce from the OS entropy source, so the
//! same plaintext never produces the same ciphertext twice. The envelope is a
//! printable string:
//!
//! ```text
//! v1:<hex nonce (24 bytes)>:<hex ciphertext || tag>
//! ```
//!
//! # Example
//!
//! ```rust
//! use mycelix_health_crypto::{RecordCodec, SymmetricKey};
//!
//! let codec = RecordCodec::new(SymmetricKey::generate().unwrap());
//! let a = codec.encrypt(b"blood type: O+").unwrap();
//! let b = codec.encrypt(b"blood type: O+").unwrap();
//! assert_ne!(a, b);
//! assert_eq!(codec.decrypt(&a).unwrap(), b"blood type: O+");
//! ```

pub mod codec;
pub mod key;
pub mod sealing;

pub use codec::{sha256_hex, RecordCodec, ENVELOPE_PREFIX};
pub use key::{derive_subkey, SecretBytes, SymmetricKey, KEY_LENGTH};
pub use sealing::{KeySealer, SealedKey};

use thiserror::Error;

/// Nonce length for XChaCha20-Poly1305
pub const NONCE_LENGTH: usize = 24;

/// Errors produced by the codec, key handling and sealing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Key material had the wrong length or encoding
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The OS entropy source failed
    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    /// Envelope could not be parsed
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Authentication tag did not verify (wrong key, wrong binding or tampering)
    #[error("integrity check failed - data may have been tampered with")]
    IntegrityCheckFailed,

    /// The AEAD primitive refused to encrypt
    #[error("encryption failed")]
    EncryptionFailed,
}

/// Fill `buffer` with cryptographically secure random bytes
pub fn random_bytes(buffer: &mut [u8]) -> Result<(), CodecError> {
    getrandom::fill(buffer).map_err(|e| CodecError::Entropy(format!("{:?}", e)))
}
