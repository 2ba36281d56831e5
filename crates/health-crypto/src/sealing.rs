//! Sealing of custodial wallet keys at rest
//!
//! A sealed key is bound to the identity it belongs to: the binding string
//! (the patient id) is authenticated as associated data, so a sealed key
//! copied under another patient's name fails to unseal.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use serde::{Deserialize, Serialize};

use crate::{random_bytes, CodecError, SecretBytes, SymmetricKey, NONCE_LENGTH};

/// Current sealing format version
pub const SEAL_VERSION: u8 = 1;

/// A private key encrypted under the vault key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    pub version: u8,
    /// Hex-encoded 24-byte nonce
    pub nonce: String,
    /// Hex-encoded ciphertext with tag
    pub ciphertext: String,
}

/// Seals and unseals custodial keys with the key-vault secret
#[derive(Clone, Debug)]
pub struct KeySealer {
    key: SymmetricKey,
}

impl KeySealer {
    pub fn new(key: SymmetricKey) -> Self {
        Self { key }
    }

    /// Seal `secret`, binding it to `binding`
    pub fn seal(&self, secret: &SecretBytes, binding: &str) -> Result<SealedKey, CodecError> {
        let mut nonce = [0u8; NONCE_LENGTH];
        random_bytes(&mut nonce)?;

        let cipher = XChaCha20Poly1305::new(Key::from_slice(self.key.as_bytes()));
        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: secret.expose(),
                    aad: binding.as_bytes(),
                },
            )
            .map_err(|_| CodecError::EncryptionFailed)?;

        Ok(SealedKey {
            version: SEAL_VERSION,
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(ciphertext),
        })
    }

    /// Unseal a key sealed for `binding`
    pub fn unseal(&self, sealed: &SealedKey, binding: &str) -> Result<SecretBytes, CodecError> {
        if sealed.version != SEAL_VERSION {
            return Err(CodecError::MalformedEnvelope(format!(
                "unsupported seal version {}",
                sealed.version
            )));
        }

        let nonce: [u8; NONCE_LENGTH] = hex::decode(&sealed.nonce)
            .map_err(|e| CodecError::MalformedEnvelope(format!("nonce: {}", e)))?
            .try_into()
            .map_err(|_| CodecError::MalformedEnvelope("invalid nonce length".to_string()))?;
        let ciphertext = hex::decode(&sealed.ciphertext)
            .map_err(|e| CodecError::MalformedEnvelope(format!("ciphertext: {}", e)))?;

        let cipher = XChaCha20Poly1305::new(Key::from_slice(self.key.as_bytes()));
        let plaintext = cipher
            .decrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: binding.as_bytes(),
                },
            )
            .map_err(|_| CodecError::IntegrityCheckFailed)?;

        Ok(SecretBytes::new(plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealer() -> KeySealer {
        KeySealer::new(SymmetricKey::new([9u8; 32]))
    }

    #[test]
    fn test_seal_unseal() {
        let secret = SecretBytes::new(vec![5u8; 32]);
        let sealed = sealer().seal(&secret, "patient-17").unwrap();
        assert_eq!(sealed.version, SEAL_VERSION);
        assert_eq!(sealer().unseal(&sealed, "patient-17").unwrap(), secret);
    }

    #[test]
    fn test_binding_mismatch_fails() {
        let sealed = sealer()
            .seal(&SecretBytes::new(vec![5u8; 32]), "patient-17")
            .unwrap();
        assert_eq!(
            sealer().unseal(&sealed, "patient-18"),
            Err(CodecError::IntegrityCheckFailed)
        );
    }

    #[test]
    fn test_sealed_key_never_contains_plaintext() {
        let secret = SecretBytes::new(vec![0xEE; 32]);
        let sealed = sealer().seal(&secret, "p").unwrap();
        assert!(!sealed.ciphertext.contains(&hex::encode([0xEEu8; 32])));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut sealed = sealer().seal(&SecretBytes::new(vec![1]), "p").unwrap();
        sealed.version = 99;
        assert!(matches!(
            sealer().unseal(&sealed, "p"),
            Err(CodecError::MalformedEnvelope(_))
        ));
    }
}
