//! Transaction signing keys
//!
//! Operator accounts are configured with an account id and a hex secret key.
//! Custodial wallets are self-certifying: their address is derived from the
//! public key, so the ledger can check the payer without a prior account
//! registration.

use chrono::Utc;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use mycelix_health_crypto::{random_bytes, SecretBytes};
use mycelix_health_shared::{config::OperatorCredentials, Address};
use sha2::{Digest, Sha256};

use crate::error::LedgerError;
use crate::transaction::{ContractRef, SignedTransaction, TransactionBody};

/// Length of the address part derived from a public key hash
const ADDRESS_BYTES: usize = 20;

/// `0x` + hex of the first 20 bytes of SHA-256(public key)
pub fn wallet_address(public_key: &VerifyingKey) -> Result<Address, LedgerError> {
    let digest = Sha256::digest(public_key.as_bytes());
    Address::parse(format!("0x{}", hex::encode(&digest[..ADDRESS_BYTES])))
        .map_err(|e| LedgerError::Signing(e.to_string()))
}

/// Key that signs transactions for one payer account
pub struct TransactionSigner {
    account: Address,
    key: SigningKey,
}

impl TransactionSigner {
    pub fn new(account: Address, key: SigningKey) -> Self {
        Self { account, key }
    }

    /// Operator signer from configured credentials
    pub fn from_operator(credentials: &OperatorCredentials) -> Result<Self, LedgerError> {
        let account = Address::parse(credentials.account_id.trim())
            .map_err(|e| LedgerError::InvalidCredentials(e.to_string()))?;
        let raw = hex::decode(credentials.private_key.trim().trim_start_matches("0x"))
            .map_err(|e| LedgerError::InvalidCredentials(format!("operator key is not hex: {}", e)))?;
        let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
            LedgerError::InvalidCredentials(format!(
                "operator key must be 32 bytes, got {}",
                raw.len()
            ))
        })?;
        Ok(Self::new(account, SigningKey::from_bytes(&bytes)))
    }

    /// Fresh custodial wallet keypair
    pub fn generate_custodial() -> Result<Self, LedgerError> {
        let mut seed = [0u8; 32];
        random_bytes(&mut seed).map_err(|e| LedgerError::Signing(e.to_string()))?;
        let key = SigningKey::from_bytes(&seed);
        seed.fill(0);
        Self::custodial(key)
    }

    /// Custodial signer restored from an unsealed secret key
    pub fn from_custodial_secret(secret: &SecretBytes) -> Result<Self, LedgerError> {
        let bytes: [u8; 32] = secret
            .expose()
            .try_into()
            .map_err(|_| LedgerError::Signing("custodial key must be 32 bytes".to_string()))?;
        Self::custodial(SigningKey::from_bytes(&bytes))
    }

    fn custodial(key: SigningKey) -> Result<Self, LedgerError> {
        let account = wallet_address(&key.verifying_key())?;
        Ok(Self { account, key })
    }

    pub fn account(&self) -> &Address {
        &self.account
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.key.verifying_key().as_bytes())
    }

    /// Secret key bytes, for sealing into the key vault
    pub fn secret(&self) -> SecretBytes {
        SecretBytes::new(self.key.to_bytes().to_vec())
    }

    /// Build and sign a transaction with a fresh nonce
    pub fn sign_call(
        &self,
        contract: &ContractRef,
        function: &str,
        params: serde_json::Value,
        gas_limit: u64,
    ) -> Result<SignedTransaction, LedgerError> {
        let mut nonce = [0u8; 16];
        random_bytes(&mut nonce).map_err(|e| LedgerError::Signing(e.to_string()))?;

        let body = TransactionBody {
            contract: contract.clone(),
            function: function.to_string(),
            params,
            gas_limit,
            payer: self.account.clone(),
            nonce: hex::encode(nonce),
            valid_start: Utc::now(),
        };
        self.sign(body)
    }

    pub fn sign(&self, body: TransactionBody) -> Result<SignedTransaction, LedgerError> {
        let signature = self.key.sign(&body.canonical_bytes()?);
        Ok(SignedTransaction {
            body,
            public_key: self.public_key_hex(),
            signature: hex::encode(signature.to_bytes()),
        })
    }
}

impl std::fmt::Debug for TransactionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSigner")
            .field("account", &self.account)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Verify the signature of a transaction and return the signer's key
pub fn verify_transaction(tx: &SignedTransaction) -> Result<VerifyingKey, LedgerError> {
    let key_bytes: [u8; 32] = hex::decode(&tx.public_key)
        .map_err(|e| LedgerError::Signing(format!("public key is not hex: {}", e)))?
        .as_slice()
        .try_into()
        .map_err(|_| LedgerError::Signing("public key must be 32 bytes".to_string()))?;
    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| LedgerError::Signing(format!("invalid public key: {}", e)))?;

    let sig_bytes: [u8; 64] = hex::decode(&tx.signature)
        .map_err(|e| LedgerError::Signing(format!("signature is not hex: {}", e)))?
        .as_slice()
        .try_into()
        .map_err(|_| LedgerError::Signing("signature must be 64 bytes".to_string()))?;
    let signature = Signature::from_bytes(&sig_bytes);

    key.verify(&tx.body.canonical_bytes()?, &signature)
        .map_err(|_| LedgerError::Signing("signature does not match transaction body".to_string()))?;
    Ok(key)
}
