//! Mycelix-Health node: wires the core components from configuration
//!
//! [`HealthCore`] is the composition root. It builds one ledger gateway and
//! hands it to the identity manager, the access authority and the record
//! manager. The `local` network runs against the in-process ledger simulator
//! with in-memory stores; every other network goes through JSON-RPC with
//! file-backed stores.

use std::sync::Arc;

use mycelix_health_access::AccessAuthority;
use mycelix_health_crypto::{KeySealer, RecordCodec};
use mycelix_health_identity::{
    FileKeyVault, FileWalletDirectory, IdentityManager, KeyVault, MemoryKeyVault, MemoryWalletDirectory,
    WalletDirectory,
};
use mycelix_health_ledger::{InMemoryLedger, JsonRpcTransport, LedgerContracts, LedgerGateway, LedgerTransport};
use mycelix_health_records::RecordManager;
use mycelix_health_shared::{HealthConfig, HealthError, HealthResult, LedgerNetwork, RecordPolicy, SystemClock};
use tracing::info;

pub struct HealthCore {
    gateway: Arc<LedgerGateway>,
    identity: IdentityManager,
    access: Arc<AccessAuthority>,
    records: RecordManager,
    local_ledger: Option<Arc<InMemoryLedger>>,
}

impl HealthCore {
    /// Build every component from a validated configuration
    ///
    /// Fails with [`HealthError::Precondition`] when credentials, keys or
    /// contract references are missing.
    pub fn from_config(config: &HealthConfig) -> HealthResult<Self> {
        config.validate()?;
        let (identity, access_control, medical_records) = config.contract_refs()?;
        let contracts = LedgerContracts::new(&identity, &access_control, &medical_records);

        match config.network {
            LedgerNetwork::Local => {
                let ledger = Arc::new(InMemoryLedger::new(contracts.clone(), Arc::new(SystemClock)));
                let core = Self::assemble(
                    config,
                    contracts,
                    ledger.clone(),
                    Arc::new(MemoryKeyVault::new()),
                    Arc::new(MemoryWalletDirectory::new()),
                )?;
                ledger.register_account(core.gateway.operator_account().clone(), core.gateway.operator_key());
                Ok(Self {
                    local_ledger: Some(ledger),
                    ..core
                })
            }
            network => {
                let endpoint = config
                    .resolved_rpc_url()
                    .ok_or_else(|| HealthError::Precondition("no RPC endpoint configured".to_string()))?;
                info!(?network, %endpoint, "connecting to ledger network");
                let transport = Arc::new(JsonRpcTransport::new(endpoint, config.timeouts.receipt_poll())?);
                Self::assemble(
                    config,
                    contracts,
                    transport,
                    Arc::new(FileKeyVault::new(&config.storage.key_vault_dir)),
                    Arc::new(FileWalletDirectory::new(&config.storage.wallet_dir)),
                )
            }
        }
    }

    fn assemble(
        config: &HealthConfig,
        contracts: LedgerContracts,
        transport: Arc<dyn LedgerTransport>,
        vault: Arc<dyn KeyVault>,
        wallets: Arc<dyn WalletDirectory>,
    ) -> HealthResult<Self> {
        let gateway = Arc::new(LedgerGateway::new(
            transport,
            Some(config.operator()?),
            &config.timeouts,
        )?);
        let codec = Arc::new(RecordCodec::new(config.encryption_key()?));

        let identity = IdentityManager::new(
            gateway.clone(),
            contracts.identity.clone(),
            codec.clone(),
            KeySealer::new(config.key_vault_key()?),
            vault,
            wallets,
        )
        .with_gas_limit(config.gas.identity);

        let access = Arc::new(
            AccessAuthority::new(gateway.clone(), contracts.access_control.clone(), contracts.identity.clone())
                .with_gas_limit(config.gas.access_control),
        );

        let mut records = RecordManager::new(gateway.clone(), contracts.medical_records.clone(), codec)
            .with_gas_limit(config.gas.medical_records);
        if config.record_policy == RecordPolicy::RequireAuthorGrant {
            records = records.with_author_grant_check(access.clone());
        }

        info!(
            operator = %gateway.operator_account(),
            policy = ?config.record_policy,
            "health core assembled"
        );
        Ok(Self {
            gateway,
            identity,
            access,
            records,
            local_ledger: None,
        })
    }

    pub fn identity(&self) -> &IdentityManager {
        &self.identity
    }

    pub fn access(&self) -> &AccessAuthority {
        &self.access
    }

    pub fn records(&self) -> &RecordManager {
        &self.records
    }

    pub fn gateway(&self) -> &Arc<LedgerGateway> {
        &self.gateway
    }

    /// The in-process ledger when running on the `local` network
    pub fn local_ledger(&self) -> Option<&Arc<InMemoryLedger>> {
        self.local_ledger.as_ref()
    }

    /// Close the ledger session; later calls on any component fail
    pub async fn shutdown(&self) -> HealthResult<()> {
        self.gateway.close().await?;
        info!("health core shut down");
        Ok(())
    }
}
