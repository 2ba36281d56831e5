//! Local core fixture

use std::sync::Arc;

use mycelix_health_ledger::InMemoryLedger;
use mycelix_health_node::HealthCore;
use mycelix_health_shared::config::OperatorCredentials;
use mycelix_health_shared::{Address, HealthConfig, LedgerNetwork, RecordPolicy, Role};

pub struct Fixture {
    pub core: HealthCore,
    pub ledger: Arc<InMemoryLedger>,
}

pub fn local_config(policy: RecordPolicy) -> HealthConfig {
    let mut config = HealthConfig {
        network: LedgerNetwork::Local,
        operator: Some(OperatorCredentials {
            account_id: "0.0.1001".to_string(),
            private_key: "0b".repeat(32),
        }),
        encryption_key: Some("11".repeat(32)),
        key_vault_secret: Some("22".repeat(32)),
        record_policy: policy,
        ..HealthConfig::default()
    };
    config.contracts.identity = Some("0.0.2001".to_string());
    config.contracts.access_control = Some("0.0.2002".to_string());
    config.contracts.medical_records = Some("0.0.2003".to_string());
    config
}

pub fn fixture_with(policy: RecordPolicy) -> Fixture {
    let core = HealthCore::from_config(&local_config(policy)).unwrap();
    let ledger = core.local_ledger().unwrap().clone();
    Fixture { core, ledger }
}

pub fn fixture() -> Fixture {
    fixture_with(RecordPolicy::Permissive)
}

pub fn doctor() -> Address {
    Address::parse("0xd0c7a11ce").unwrap()
}

pub async fn register_doctor(core: &HealthCore, address: &Address) {
    core.access()
        .register_user(address, Role::Doctor, &"ab".repeat(32), Some("KMPDC-0001".to_string()))
        .await
        .unwrap();
}
