//! Payload codec: authenticated encryption and integrity digests

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use sha2::{Digest, Sha256};

use crate::{random_bytes, CodecError, SymmetricKey, NONCE_LENGTH};

/// Version tag at the start of every envelope
pub const ENVELOPE_PREFIX: &str = "v1";

/// Encrypts payloads under the process-wide data key
///
/// Built once at startup and shared as `Arc<RecordCodec>`.
#[derive(Clone, Debug)]
pub struct RecordCodec {
    key: SymmetricKey,
}

impl RecordCodec {
    pub fn new(key: SymmetricKey) -> Self {
        Self { key }
    }

    /// Encrypt a payload into a `v1:<nonce>:<ciphertext>` envelope
    ///
    /// A new random nonce is drawn for every call.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CodecError> {
        let mut nonce = [0u8; NONCE_LENGTH];
        random_bytes(&mut nonce)?;

        let cipher = XChaCha20Poly1305::new(Key::from_slice(self.key.as_bytes()));
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| CodecError::EncryptionFailed)?;

        Ok(format!(
            "{}:{}:{}",
            ENVELOPE_PREFIX,
            hex::encode(nonce),
            hex::encode(ciphertext)
        ))
    }

    /// Serialize `value` as JSON and encrypt it
    pub fn encrypt_json<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| CodecError::MalformedEnvelope(format!("payload encoding: {}", e)))?;
        self.encrypt(&bytes)
    }

    /// Decrypt an envelope produced by [`RecordCodec::encrypt`]
    pub fn decrypt(&self, envelope: &str) -> Result<Vec<u8>, CodecError> {
        let (nonce, ciphertext) = parse_envelope(envelope)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(self.key.as_bytes()));
        cipher
            .decrypt(XNonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| CodecError::IntegrityCheckFailed)
    }

    /// Integrity digest of a payload (SHA-256, hex)
    ///
    /// Independent of the encryption key: two services with different keys
    /// agree on the digest of the same plaintext.
    pub fn hash(payload: &[u8]) -> String {
        sha256_hex(payload)
    }
}

/// SHA-256 of `data`, lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub(crate) fn parse_envelope(envelope: &str) -> Result<([u8; NONCE_LENGTH], Vec<u8>), CodecError> {
    let mut parts = envelope.splitn(3, ':');
    let (version, nonce_hex, body_hex) = match (parts.next(), parts.next(), parts.next()) {
        (Some(v), Some(n), Some(b)) => (v, n, b),
        _ => {
            return Err(CodecError::MalformedEnvelope(
                "expected version:nonce:ciphertext".to_string(),
            ))
        }
    };

    if version != ENVELOPE_PREFIX {
        return Err(CodecError::MalformedEnvelope(format!(
            "unsupported envelope version '{}'",
            version
        )));
    }

    let nonce_bytes = hex::decode(nonce_hex)
        .map_err(|e| CodecError::MalformedEnvelope(format!("nonce: {}", e)))?;
    let nonce: [u8; NONCE_LENGTH] = nonce_bytes
        .try_into()
        .map_err(|_| CodecError::MalformedEnvelope("invalid nonce length".to_string()))?;

    let ciphertext = hex::decode(body_hex)
        .map_err(|e| CodecError::MalformedEnvelope(format!("ciphertext: {}", e)))?;
    if ciphertext.len() < 16 {
        return Err(CodecError::MalformedEnvelope("ciphertext too short".to_string()));
    }

    Ok((nonce, ciphertext))
}
