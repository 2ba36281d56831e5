//! Encryption and custodial wallet regressions

use mycelix_health_crypto::{RecordCodec, SymmetricKey};
use mycelix_health_identity::PersonalData;
use mycelix_health_ledger::abi::identity;
use mycelix_health_records::NewRecord;
use mycelix_health_shared::RecordType;
use proptest::prelude::*;
use serde_json::json;

use crate::harness::{doctor, fixture};

#[tokio::test]
async fn test_each_patient_gets_own_wallet() {
    let f = fixture();
    let identity = f.core.identity();

    let a = identity.register(PersonalData::new("Amina Odhiambo", "1990-04-12")).await.unwrap();
    let b = identity.register(PersonalData::new("Baraka Mwangi", "1985-11-02")).await.unwrap();

    assert_ne!(a.patient_id, b.patient_id);
    assert_ne!(a.wallet_address, b.wallet_address);
    assert_ne!(
        identity.wallet(a.patient_id).unwrap().public_key,
        identity.wallet(b.patient_id).unwrap().public_key
    );
}

#[tokio::test]
async fn test_get_patient_is_idempotent() {
    let f = fixture();
    let identity = f.core.identity();
    let registration = identity.register(PersonalData::new("Amina Odhiambo", "1990-04-12")).await.unwrap();

    let first = identity.get_patient(registration.patient_id).await.unwrap();
    let second = identity.get_patient(registration.patient_id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_owner_operations_are_signed_by_custodial_wallet() {
    let f = fixture();
    let identity = f.core.identity();
    let registration = identity.register(PersonalData::new("Amina Odhiambo", "1990-04-12")).await.unwrap();

    identity.deactivate_patient(registration.patient_id).await.unwrap();

    let log = f.ledger.transaction_log();
    let register = log.iter().find(|t| t.function == identity::REGISTER_PATIENT).unwrap();
    let deactivate = log.iter().find(|t| t.function == identity::DEACTIVATE_PATIENT).unwrap();
    assert_eq!(&register.payer, f.core.gateway().operator_account());
    assert_eq!(deactivate.payer, registration.wallet_address);
}

#[tokio::test]
async fn test_identical_payloads_encrypt_differently() {
    let f = fixture();
    let records = f.core.records();
    let payload = json!({"complaint": "headache"});

    let a = records
        .create(NewRecord::new(1, doctor(), RecordType::Consultation, payload.clone()))
        .await
        .unwrap();
    let b = records
        .create(NewRecord::new(1, doctor(), RecordType::Consultation, payload))
        .await
        .unwrap();

    assert_ne!(a.encrypted_data_hash, b.encrypted_data_hash);
    let ra = records.get_record(a.record_id).await.unwrap();
    let rb = records.get_record(b.record_id).await.unwrap();
    assert_eq!(ra.original_data_hash, rb.original_data_hash);
}

proptest! {
    #[test]
    fn prop_codec_never_repeats_ciphertext(payload in prop::collection::vec(any::<u8>(), 0..256)) {
        let codec = RecordCodec::new(SymmetricKey::new([7u8; 32]));
        let first = codec.encrypt(&payload).unwrap();
        let second = codec.encrypt(&payload).unwrap();
        prop_assert_ne!(&first, &second);
        prop_assert_eq!(codec.decrypt(&first).unwrap(), payload);
    }
}
