//! Concurrent operations on the same subject
//!
//! No locking is applied above the ledger; the ledger's ordering is the only
//! serialization point.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use mycelix_health_identity::PersonalData;
use mycelix_health_records::NewRecord;
use mycelix_health_shared::{Address, RecordType};
use serde_json::json;

use crate::harness::{doctor, fixture, register_doctor};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_grants_produce_two_grants() {
    let f = fixture();
    register_doctor(&f.core, &doctor()).await;
    let core = Arc::new(f.core);
    let grantor = Address::parse("0xpa71e47").unwrap();

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let core = core.clone();
            let grantor = grantor.clone();
            tokio::spawn(async move {
                core.access()
                    .grant_permission(&grantor, &doctor(), 1, Utc::now() + Duration::days(1), &["READ"])
                    .await
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap().unwrap().permission_id);
    }
    assert_eq!(ids.len(), 2);
    assert_eq!(core.access().patient_permissions(1).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_creates_produce_two_records() {
    let f = fixture();
    let core = Arc::new(f.core);

    let tasks: Vec<_> = (0..2)
        .map(|i| {
            let core = core.clone();
            tokio::spawn(async move {
                core.records()
                    .create(NewRecord::new(1, doctor(), RecordType::Vaccination, json!({"dose": i})))
                    .await
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap().unwrap().record_id);
    }
    assert_eq!(ids.len(), 2);
    assert_eq!(core.records().patient_history(1).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_get_distinct_ids_and_wallets() {
    let f = fixture();
    let core = Arc::new(f.core);

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let core = core.clone();
            tokio::spawn(async move {
                core.identity()
                    .register(PersonalData::new(format!("Patient {}", i), "1990-01-01"))
                    .await
            })
        })
        .collect();

    let mut patient_ids = HashSet::new();
    let mut wallets = HashSet::new();
    for task in tasks {
        let registration = task.await.unwrap().unwrap();
        patient_ids.insert(registration.patient_id);
        wallets.insert(registration.wallet_address);
    }
    assert_eq!(patient_ids.len(), 8);
    assert_eq!(wallets.len(), 8);
    assert_eq!(f.ledger.transaction_log().len(), 8);
}
