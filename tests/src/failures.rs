//! Failure surfacing through the response envelope

use mycelix_health_identity::PersonalData;
use mycelix_health_ledger::InjectedFault;
use mycelix_health_shared::{ErrorKind, ServiceResponse};

use crate::harness::fixture;

#[tokio::test]
async fn test_unknown_record_is_reported_not_found() {
    let f = fixture();
    let response = ServiceResponse::from(f.core.records().get_record(999_999).await).to_json();

    assert_eq!(response["success"], false);
    assert_eq!(response["errorKind"], "not_found");
    assert!(!response["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_patient_is_reported_not_found() {
    let f = fixture();
    let err = f.core.identity().get_patient(42).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_submission_times_out() {
    let f = fixture();
    f.ledger.inject(InjectedFault::Stall);

    let err = f
        .core
        .identity()
        .register(PersonalData::new("Amina Odhiambo", "1990-04-12"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_query_times_out() {
    let f = fixture();
    f.ledger.inject(InjectedFault::Stall);

    let err = f.core.records().patient_history(1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_unreachable_network() {
    let f = fixture();
    f.ledger.inject(InjectedFault::Unreachable);

    let response = ServiceResponse::from(f.core.records().get_record(1).await).to_json();
    assert_eq!(response["success"], false);
    assert_eq!(response["errorKind"], "unreachable");
}

#[tokio::test]
async fn test_rejected_registration_keeps_no_key() {
    let f = fixture();
    f.ledger.inject(InjectedFault::Revert("contract paused".to_string()));

    let err = f
        .core
        .identity()
        .register(PersonalData::new("Amina Odhiambo", "1990-04-12"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LedgerRejection);
    assert!(f.core.identity().wallet(1).unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_calls_after_shutdown_fail() {
    let f = fixture();
    f.core.shutdown().await.unwrap();

    let err = f
        .core
        .identity()
        .register(PersonalData::new("Amina Odhiambo", "1990-04-12"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unreachable);
    assert!(f.ledger.transaction_log().is_empty());
}
