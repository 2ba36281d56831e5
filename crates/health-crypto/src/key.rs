//! Key material wrappers
//!
//! Key bytes never appear in `Debug` output and are overwritten on drop.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{random_bytes, CodecError};

/// Length of every symmetric key in this crate
pub const KEY_LENGTH: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Owned secret bytes (private keys, unsealed material)
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the secret bytes (use carefully)
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED; {}])", self.0.len())
    }
}

/// 256-bit symmetric key
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    key_material: [u8; KEY_LENGTH],
}

impl SymmetricKey {
    /// Create a key from raw bytes
    pub fn new(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key_material: bytes }
    }

    /// Generate a fresh random key
    pub fn generate() -> Result<Self, CodecError> {
        let mut key = [0u8; KEY_LENGTH];
        random_bytes(&mut key)?;
        Ok(Self::new(key))
    }

    /// Parse a hex-encoded key (64 hex characters, optional `0x` prefix)
    pub fn from_hex(encoded: &str) -> Result<Self, CodecError> {
        let trimmed = encoded.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(trimmed)
            .map_err(|e| CodecError::InvalidKey(format!("not valid hex: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// Build a key from a byte slice that must be exactly 32 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let key_material: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            CodecError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self { key_material })
    }

    /// Get the key bytes (use carefully)
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key_material
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Derive a purpose-bound subkey from a master secret
///
/// `HMAC-SHA256(master, "mycelix-health/" || label)`. Different labels give
/// independent keys, so a single configured secret can feed the payload codec
/// and the key vault without the two ever sharing key material.
pub fn derive_subkey(master: &SymmetricKey, label: &str) -> Result<SymmetricKey, CodecError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(master.as_bytes())
        .map_err(|e| CodecError::InvalidKey(e.to_string()))?;
    mac.update(b"mycelix-health/");
    mac.update(label.as_bytes());
    SymmetricKey::from_slice(&mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex_accepts_prefix_and_whitespace() {
        let hex = format!("0x{}\n", "ab".repeat(32));
        let key = SymmetricKey::from_hex(&hex).unwrap();
        assert_eq!(key.as_bytes(), &[0xab; 32]);
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        let err = SymmetricKey::from_hex(&"ab".repeat(16)).unwrap_err();
        assert!(matches!(err, CodecError::InvalidKey(_)));
        assert!(SymmetricKey::from_hex("zz").is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SymmetricKey::new([7u8; 32]);
        let secret = SecretBytes::new(vec![1, 2, 3]);
        assert_eq!(format!("{:?}", key), "SymmetricKey([REDACTED])");
        assert_eq!(format!("{:?}", secret), "SecretBytes([REDACTED; 3])");
    }

    #[test]
    fn test_key_material_is_wiped() {
        let mut key = SymmetricKey::new([7u8; 32]);
        key.zeroize();
        assert_eq!(key.as_bytes(), &[0u8; KEY_LENGTH]);

        let mut secret = SecretBytes::new(vec![9; 16]);
        secret.zeroize();
        assert!(secret.is_empty());
    }

    #[test]
    fn test_subkeys_are_label_bound() {
        let master = SymmetricKey::new([1u8; 32]);
        let a = derive_subkey(&master, "payload").unwrap();
        let b = derive_subkey(&master, "key-vault").unwrap();
        let a_again = derive_subkey(&master, "payload").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a_again);
        assert_ne!(a.as_bytes(), master.as_bytes());
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = SymmetricKey::generate().unwrap();
        let b = SymmetricKey::generate().unwrap();
        assert_ne!(a, b);
    }
}
