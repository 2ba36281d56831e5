//! Runtime configuration
//!
//! Loaded from an optional JSON file, then overridden by `MYCELIX_HEALTH_*`
//! environment variables. Secrets are hex strings and are only turned into key
//! material through the accessor methods, which report missing or malformed
//! values as [`HealthError::Precondition`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use mycelix_health_crypto::SymmetricKey;
use serde::{Deserialize, Serialize};

use crate::error::{HealthError, HealthResult};

/// Prefix of every environment variable read by [`HealthConfig::apply_env`]
pub const ENV_PREFIX: &str = "MYCELIX_HEALTH_";

/// Which ledger network to talk to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerNetwork {
    Mainnet,
    #[default]
    Testnet,
    Previewnet,
    /// In-process ledger simulator (development only)
    Local,
}

impl LedgerNetwork {
    /// Default JSON-RPC endpoint for the network, if it has one
    pub fn default_rpc_url(self) -> Option<&'static str> {
        match self {
            LedgerNetwork::Mainnet => Some("https://mainnet.ledger.mycelix.net/rpc"),
            LedgerNetwork::Testnet => Some("https://testnet.ledger.mycelix.net/rpc"),
            LedgerNetwork::Previewnet => Some("https://previewnet.ledger.mycelix.net/rpc"),
            LedgerNetwork::Local => None,
        }
    }
}

impl std::str::FromStr for LedgerNetwork {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(LedgerNetwork::Mainnet),
            "testnet" => Ok(LedgerNetwork::Testnet),
            "previewnet" => Ok(LedgerNetwork::Previewnet),
            "local" => Ok(LedgerNetwork::Local),
            other => Err(HealthError::Precondition(format!(
                "unknown ledger network '{}'",
                other
            ))),
        }
    }
}

/// Whether a record author must hold a valid grant before creating a record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPolicy {
    /// Any registered author may create records (ledger-side checks only)
    #[default]
    Permissive,
    /// The author needs a valid WRITE grant for the patient
    RequireAuthorGrant,
}

impl std::str::FromStr for RecordPolicy {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(RecordPolicy::Permissive),
            "require_author_grant" | "strict" => Ok(RecordPolicy::RequireAuthorGrant),
            other => Err(HealthError::Precondition(format!(
                "unknown record policy '{}'",
                other
            ))),
        }
    }
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(HealthError::Precondition(format!(
                "unknown log format '{}'",
                other
            ))),
        }
    }
}

/// Operator account that pays for and signs platform transactions
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorCredentials {
    pub account_id: String,
    /// Hex-encoded 32-byte ed25519 secret key
    pub private_key: String,
}

impl std::fmt::Debug for OperatorCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorCredentials")
            .field("account_id", &self.account_id)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// References of the three deployed contracts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractConfig {
    pub identity: Option<String>,
    pub access_control: Option<String>,
    pub medical_records: Option<String>,
}

/// Local custodial storage locations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Public wallet records (one JSON document per patient)
    pub wallet_dir: PathBuf,
    /// Sealed private keys; keep on a volume with its own access controls
    pub key_vault_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            wallet_dir: PathBuf::from("data/wallets"),
            key_vault_dir: PathBuf::from("secrets/key-vault"),
        }
    }
}

/// Per-call deadlines (milliseconds)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeoutConfig {
    pub query_ms: u64,
    pub transaction_ms: u64,
    pub receipt_poll_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            query_ms: 5_000,
            transaction_ms: 30_000,
            receipt_poll_ms: 250,
        }
    }
}

impl TimeoutConfig {
    pub fn query(&self) -> Duration {
        Duration::from_millis(self.query_ms)
    }

    pub fn transaction(&self) -> Duration {
        Duration::from_millis(self.transaction_ms)
    }

    pub fn receipt_poll(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }
}

/// Gas limits per contract family
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GasConfig {
    pub identity: u64,
    pub access_control: u64,
    pub medical_records: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            identity: 300_000,
            access_control: 200_000,
            medical_records: 400_000,
        }
    }
}

/// Complete configuration of a core instance
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthConfig {
    pub network: LedgerNetwork,
    pub rpc_url: Option<String>,
    pub operator: Option<OperatorCredentials>,
    pub contracts: ContractConfig,
    /// Hex-encoded 32-byte payload encryption key
    pub encryption_key: Option<String>,
    /// Hex-encoded 32-byte key-vault secret (independent of `encryption_key`)
    pub key_vault_secret: Option<String>,
    pub storage: StorageConfig,
    pub timeouts: TimeoutConfig,
    pub gas: GasConfig,
    pub record_policy: RecordPolicy,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for HealthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("HealthConfig")
            .field("network", &self.network)
            .field("rpc_url", &self.rpc_url)
            .field("operator", &self.operator)
            .field("contracts", &self.contracts)
            .field("encryption_key", &redact(&self.encryption_key))
            .field("key_vault_secret", &redact(&self.key_vault_secret))
            .field("storage", &self.storage)
            .field("timeouts", &self.timeouts)
            .field("gas", &self.gas)
            .field("record_policy", &self.record_policy)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl HealthConfig {
    /// Read a JSON configuration file
    pub fn from_file(path: &Path) -> HealthResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HealthError::Precondition(format!("cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            HealthError::Precondition(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> HealthResult<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `MYCELIX_HEALTH_*` overrides obtained through `lookup`
    ///
    /// `lookup` receives the full variable name. Taking a closure instead of
    /// reading `std::env` directly keeps this testable without mutating the
    /// process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> HealthResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(network) = get("NETWORK") {
            self.network = network.parse()?;
        }
        if let Some(url) = get("RPC_URL") {
            self.rpc_url = Some(url);
        }

        let operator_id = get("OPERATOR_ID");
        let operator_key = get("OPERATOR_KEY");
        if operator_id.is_some() || operator_key.is_some() {
            let mut operator = self.operator.clone().unwrap_or_default();
            if let Some(id) = operator_id {
                operator.account_id = id;
            }
            if let Some(key) = operator_key {
                operator.private_key = key;
            }
            self.operator = Some(operator);
        }

        if let Some(contract) = get("IDENTITY_CONTRACT") {
            self.contracts.identity = Some(contract);
        }
        if let Some(contract) = get("ACCESS_CONTRACT") {
            self.contracts.access_control = Some(contract);
        }
        if let Some(contract) = get("RECORDS_CONTRACT") {
            self.contracts.medical_records = Some(contract);
        }

        if let Some(key) = get("ENCRYPTION_KEY") {
            self.encryption_key = Some(key);
        }
        if let Some(secret) = get("KEY_VAULT_SECRET") {
            self.key_vault_secret = Some(secret);
        }
        if let Some(dir) = get("WALLET_DIR") {
            self.storage.wallet_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("KEY_VAULT_DIR") {
            self.storage.key_vault_dir = PathBuf::from(dir);
        }

        if let Some(ms) = get("QUERY_TIMEOUT_MS") {
            self.timeouts.query_ms = parse_millis("QUERY_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = get("TX_TIMEOUT_MS") {
            self.timeouts.transaction_ms = parse_millis("TX_TIMEOUT_MS", &ms)?;
        }
        if let Some(policy) = get("RECORD_POLICY") {
            self.record_policy = policy.parse()?;
        }
        if let Some(format) = get("LOG_FORMAT") {
            self.log_format = format.parse()?;
        }

        Ok(())
    }

    /// Operator credentials, required before any traffic is served
    pub fn operator(&self) -> HealthResult<&OperatorCredentials> {
        let operator = self.operator.as_ref().ok_or_else(|| {
            HealthError::Precondition(
                "operator credentials are not configured (MYCELIX_HEALTH_OPERATOR_ID / MYCELIX_HEALTH_OPERATOR_KEY)"
                    .to_string(),
            )
        })?;
        if operator.account_id.trim().is_empty() {
            return Err(HealthError::Precondition(
                "operator account id is empty".to_string(),
            ));
        }
        if operator.private_key.trim().is_empty() {
            return Err(HealthError::Precondition(
                "operator private key is empty".to_string(),
            ));
        }
        Ok(operator)
    }

    /// Payload encryption key
    pub fn encryption_key(&self) -> HealthResult<SymmetricKey> {
        parse_secret("encryption key", self.encryption_key.as_deref())
    }

    /// Key-vault sealing key
    pub fn key_vault_key(&self) -> HealthResult<SymmetricKey> {
        let key = parse_secret("key vault secret", self.key_vault_secret.as_deref())?;
        if self.encryption_key.is_some() && Some(&key) == self.encryption_key().ok().as_ref() {
            return Err(HealthError::Precondition(
                "key vault secret must differ from the payload encryption key".to_string(),
            ));
        }
        Ok(key)
    }

    /// `(identity, access_control, medical_records)` contract references
    pub fn contract_refs(&self) -> HealthResult<(String, String, String)> {
        let require = |name: &str, value: &Option<String>| {
            value.clone().ok_or_else(|| {
                HealthError::Precondition(format!("{} contract reference is not configured", name))
            })
        };
        Ok((
            require("identity", &self.contracts.identity)?,
            require("access-control", &self.contracts.access_control)?,
            require("medical-records", &self.contracts.medical_records)?,
        ))
    }

    /// JSON-RPC endpoint: explicit URL, else the network default
    pub fn resolved_rpc_url(&self) -> Option<String> {
        self.rpc_url
            .clone()
            .or_else(|| self.network.default_rpc_url().map(str::to_string))
    }

    /// Check every precondition at once
    pub fn validate(&self) -> HealthResult<()> {
        self.operator()?;
        self.contract_refs()?;
        self.encryption_key()?;
        self.key_vault_key()?;
        if self.network != LedgerNetwork::Local && self.resolved_rpc_url().is_none() {
            return Err(HealthError::Precondition("no RPC endpoint configured".to_string()));
        }
        if self.timeouts.query_ms == 0 || self.timeouts.transaction_ms == 0 {
            return Err(HealthError::Precondition("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn parse_secret(name: &str, value: Option<&str>) -> HealthResult<SymmetricKey> {
    let raw = value.ok_or_else(|| HealthError::Precondition(format!("{} is not configured", name)))?;
    SymmetricKey::from_hex(raw).map_err(|e| HealthError::Precondition(format!("{}: {}", name, e)))
}

fn parse_millis(name: &str, raw: &str) -> HealthResult<u64> {
    raw.parse::<u64>().map_err(|_| {
        HealthError::Precondition(format!("{}{} must be an integer, got '{}'", ENV_PREFIX, name, raw))
    })
}
