//! End-to-end patient / doctor / record flow

use chrono::{Duration, Utc};
use mycelix_health_identity::PersonalData;
use mycelix_health_records::NewRecord;
use mycelix_health_shared::{actions, RecordPolicy, RecordStatus, RecordType, ServiceResponse};
use serde_json::json;

use crate::harness::{doctor, fixture, fixture_with, register_doctor};

#[tokio::test]
async fn test_register_grant_write_revoke() {
    let f = fixture();
    let core = &f.core;

    let patient = core
        .identity()
        .register(PersonalData::new("Amina Odhiambo", "1990-04-12"))
        .await
        .unwrap();
    register_doctor(core, &doctor()).await;

    let granted = core
        .access()
        .grant_permission(
            &patient.wallet_address,
            &doctor(),
            patient.patient_id,
            Utc::now() + Duration::days(30),
            &[actions::READ],
        )
        .await
        .unwrap();
    assert!(core
        .access()
        .has_permission(&doctor(), patient.patient_id, actions::READ)
        .await
        .unwrap());

    let created = core
        .records()
        .create(NewRecord::new(
            patient.patient_id,
            doctor(),
            RecordType::Diagnosis,
            json!({"icd10": "J20.9", "note": "acute bronchitis"}),
        ))
        .await
        .unwrap();
    let history = core.records().patient_history(patient.patient_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].record_id, created.record_id);

    core.access().revoke_permission(granted.permission_id).await.unwrap();
    assert!(!core
        .access()
        .has_permission(&doctor(), patient.patient_id, actions::READ)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_record_lifecycle_through_core() {
    let f = fixture();
    let records = f.core.records();

    let created = records
        .create(NewRecord::new(1, doctor(), RecordType::LabResult, json!({"hb": 13.1})))
        .await
        .unwrap();
    records
        .update_status(created.record_id, RecordStatus::Finalized)
        .await
        .unwrap();
    records
        .amend(created.record_id, "Lab corrected haemoglobin value", &json!({"hb": 12.4}))
        .await
        .unwrap();

    let record = records.get_record(created.record_id).await.unwrap();
    assert_eq!(record.status, RecordStatus::Amended);
    assert_eq!(record.record_id, created.record_id);
    assert_eq!(record.patient_id, 1);
    assert_ne!(record.encrypted_data_hash, created.encrypted_data_hash);

    // Amended never reverts
    assert!(records
        .update_status(created.record_id, RecordStatus::Draft)
        .await
        .is_err());
    records
        .update_status(created.record_id, RecordStatus::Cancelled)
        .await
        .unwrap();
    assert!(records
        .amend(created.record_id, "Too late for another change", &json!({}))
        .await
        .is_err());
}

#[tokio::test]
async fn test_strict_policy_requires_author_grant() {
    let f = fixture_with(RecordPolicy::RequireAuthorGrant);
    let core = &f.core;
    let patient = core
        .identity()
        .register(PersonalData::new("Baraka Mwangi", "1985-11-02"))
        .await
        .unwrap();
    register_doctor(core, &doctor()).await;

    let record = NewRecord::new(patient.patient_id, doctor(), RecordType::Prescription, json!({"rx": "amoxicillin"}));
    let denied = ServiceResponse::from(core.records().create(record.clone()).await).to_json();
    assert_eq!(denied["success"], false);
    assert_eq!(denied["errorKind"], "permission_denied");

    core.access()
        .grant_permission(
            &patient.wallet_address,
            &doctor(),
            patient.patient_id,
            Utc::now() + Duration::days(1),
            &[actions::READ, actions::WRITE],
        )
        .await
        .unwrap();
    let created = ServiceResponse::from(core.records().create(record).await).to_json();
    assert_eq!(created["success"], true);
    assert!(created["recordId"].as_u64().is_some());
    assert!(created["transactionId"].as_str().is_some());
}

#[tokio::test]
async fn test_coarse_toggle_interplay() {
    let f = fixture();
    let core = &f.core;
    let patient = core
        .identity()
        .register(PersonalData::new("Chao Wen", "1979-02-28"))
        .await
        .unwrap();
    register_doctor(core, &doctor()).await;

    core.identity().grant_access(patient.patient_id, &doctor()).await.unwrap();
    let access = core.access();
    assert!(access.has_permission(&doctor(), patient.patient_id, "READ").await.unwrap());
    assert!(!access.has_permission(&doctor(), patient.patient_id, "WRITE").await.unwrap());

    access
        .grant_permission(
            &patient.wallet_address,
            &doctor(),
            patient.patient_id,
            Utc::now() + Duration::days(1),
            &["WRITE"],
        )
        .await
        .unwrap();
    assert!(access.has_permission(&doctor(), patient.patient_id, "WRITE").await.unwrap());

    core.identity().revoke_access(patient.patient_id, &doctor()).await.unwrap();
    assert!(!access.has_permission(&doctor(), patient.patient_id, "READ").await.unwrap());
    assert!(!access.has_permission(&doctor(), patient.patient_id, "WRITE").await.unwrap());
}
