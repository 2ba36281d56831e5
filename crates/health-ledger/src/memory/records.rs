//! Simulated medical-records contract
//!
//! Status changes are accepted as submitted; transition rules are enforced by
//! the record manager before anything is sent.

use std::collections::{BTreeMap, HashMap};

use mycelix_health_crypto::sha256_hex;
use mycelix_health_shared::{MedicalRecord, RecordId, RecordStatus};

use super::{decode_params, encode, CallContext, SimulatedContract};
use crate::abi::records::*;
use crate::error::LedgerError;

/// Minimum length of an amendment justification
const MIN_REASON_LENGTH: usize = 10;

#[derive(Default)]
pub(crate) struct RecordsContract {
    next_record_id: RecordId,
    records: BTreeMap<RecordId, MedicalRecord>,
    history: HashMap<RecordId, Vec<Revision>>,
}

fn check_digest(encrypted_data: &str, claimed: &str) -> Result<(), LedgerError> {
    if sha256_hex(encrypted_data.as_bytes()) != claimed {
        return Err(LedgerError::reverted("encrypted data does not match its digest"));
    }
    Ok(())
}

impl RecordsContract {
    fn record_mut(&mut self, record_id: RecordId) -> Result<&mut MedicalRecord, LedgerError> {
        self.records
            .get_mut(&record_id)
            .ok_or_else(|| LedgerError::reverted(format!("unknown record {}", record_id)))
    }

    fn create(&mut self, ctx: &CallContext, input: CreateRecord) -> Result<RecordId, LedgerError> {
        check_digest(&input.encrypted_data, &input.encrypted_data_hash)?;

        self.next_record_id += 1;
        let record_id = self.next_record_id;
        self.history.entry(record_id).or_default().push(Revision {
            encrypted_data: input.encrypted_data,
            encrypted_data_hash: input.encrypted_data_hash.clone(),
            reason: None,
            recorded_at: ctx.now,
        });
        self.records.insert(
            record_id,
            MedicalRecord {
                record_id,
                patient_id: input.patient_id,
                doctor_address: input.doctor_address,
                record_type: input.record_type,
                status: RecordStatus::Draft,
                encrypted_data_hash: input.encrypted_data_hash,
                original_data_hash: input.original_data_hash,
                attachment_hashes: input.attachment_hashes,
                authorized_viewers: input.authorized_viewers,
                is_emergency: input.is_emergency,
                metadata: input.metadata,
                timestamp: ctx.now,
                last_modified: ctx.now,
            },
        );
        Ok(record_id)
    }

    fn update_status(&mut self, ctx: &CallContext, input: UpdateStatus) -> Result<(), LedgerError> {
        let record = self.record_mut(input.record_id)?;
        record.status = input.status;
        record.last_modified = ctx.now;
        Ok(())
    }

    fn amend(&mut self, ctx: &CallContext, input: AmendRecord) -> Result<(), LedgerError> {
        if input.reason.trim().chars().count() < MIN_REASON_LENGTH {
            return Err(LedgerError::reverted("amendment reason is too short"));
        }
        check_digest(&input.encrypted_data, &input.encrypted_data_hash)?;

        let record = self.record_mut(input.record_id)?;
        if record.status == RecordStatus::Cancelled {
            return Err(LedgerError::reverted(format!("record {} is cancelled", input.record_id)));
        }
        record.status = RecordStatus::Amended;
        record.encrypted_data_hash = input.encrypted_data_hash.clone();
        record.original_data_hash = input.original_data_hash;
        record.last_modified = ctx.now;

        self.history.entry(input.record_id).or_default().push(Revision {
            encrypted_data: input.encrypted_data,
            encrypted_data_hash: input.encrypted_data_hash,
            reason: Some(input.reason),
            recorded_at: ctx.now,
        });
        Ok(())
    }

    fn authorize_viewer(&mut self, ctx: &CallContext, input: AuthorizeViewer) -> Result<(), LedgerError> {
        let record = self.record_mut(input.record_id)?;
        if !record.is_viewer(&input.viewer_address) {
            record.authorized_viewers.push(input.viewer_address);
            record.last_modified = ctx.now;
        }
        Ok(())
    }
}

impl SimulatedContract for RecordsContract {
    fn gas_cost(&self, function: &str) -> Option<u64> {
        match function {
            CREATE_RECORD => Some(250_000),
            UPDATE_RECORD_STATUS => Some(40_000),
            AMEND_RECORD => Some(200_000),
            AUTHORIZE_VIEWER => Some(35_000),
            _ => None,
        }
    }

    fn execute(
        &mut self,
        ctx: &CallContext,
        function: &str,
        params: serde_json::Value,
    ) -> Result<Option<serde_json::Value>, LedgerError> {
        match function {
            CREATE_RECORD => {
                let record_id = self.create(ctx, decode_params(function, params)?)?;
                Ok(Some(encode(&Created { record_id })?))
            }
            UPDATE_RECORD_STATUS => self.update_status(ctx, decode_params(function, params)?).map(|_| None),
            AMEND_RECORD => self.amend(ctx, decode_params(function, params)?).map(|_| None),
            AUTHORIZE_VIEWER => self
                .authorize_viewer(ctx, decode_params(function, params)?)
                .map(|_| None),
            other => Err(LedgerError::reverted(format!("unknown function {}", other))),
        }
    }

    fn query(&self, function: &str, params: serde_json::Value) -> Result<serde_json::Value, LedgerError> {
        match function {
            GET_RECORD => {
                let input: RecordRef = decode_params(function, params)?;
                let record = self
                    .records
                    .get(&input.record_id)
                    .ok_or_else(|| LedgerError::NotFound(format!("Record {}", input.record_id)))?;
                encode(record)
            }
            GET_PATIENT_RECORDS => {
                let input: PatientRef = decode_params(function, params)?;
                let records: Vec<&MedicalRecord> = self
                    .records
                    .values()
                    .filter(|r| r.patient_id == input.patient_id)
                    .collect();
                encode(&records)
            }
            GET_RECORD_REVISIONS => {
                let input: RecordRef = decode_params(function, params)?;
                let revisions = self
                    .history
                    .get(&input.record_id)
                    .ok_or_else(|| LedgerError::NotFound(format!("Record {}", input.record_id)))?;
                encode(revisions)
            }
            other => Err(LedgerError::reverted(format!("unknown query {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mycelix_health_shared::{Address, RecordType};

    fn ctx() -> CallContext {
        CallContext {
            sender: Address::parse("0.0.1001").unwrap(),
            now: Utc::now(),
        }
    }

    fn create_input(ciphertext: &str) -> CreateRecord {
        CreateRecord {
            patient_id: 1,
            doctor_address: Address::parse("0xdoc").unwrap(),
            record_type: RecordType::Consultation,
            encrypted_data: ciphertext.to_string(),
            encrypted_data_hash: sha256_hex(ciphertext.as_bytes()),
            original_data_hash: "00".repeat(32),
            attachment_hashes: vec![],
            metadata: Default::default(),
            is_emergency: false,
            authorized_viewers: vec![],
        }
    }

    #[test]
    fn test_create_checks_ciphertext_digest() {
        let mut contract = RecordsContract::default();
        let mut input = create_input("v1:aa:bb");
        input.encrypted_data_hash = "11".repeat(32);
        assert!(contract.create(&ctx(), input).is_err());

        let id = contract.create(&ctx(), create_input("v1:aa:bb")).unwrap();
        assert_eq!(contract.records[&id].status, RecordStatus::Draft);
    }

    #[test]
    fn test_amend_keeps_history() {
        let mut contract = RecordsContract::default();
        let id = contract.create(&ctx(), create_input("v1:aa:bb")).unwrap();
        let before = contract.records[&id].encrypted_data_hash.clone();

        contract
            .amend(
                &ctx(),
                AmendRecord {
                    record_id: id,
                    reason: "corrected dosage units".to_string(),
                    encrypted_data: "v1:cc:dd".to_string(),
                    encrypted_data_hash: sha256_hex(b"v1:cc:dd"),
                    original_data_hash: "01".repeat(32),
                },
            )
            .unwrap();

        let record = &contract.records[&id];
        assert_eq!(record.status, RecordStatus::Amended);
        assert_ne!(record.encrypted_data_hash, before);
        let revisions: Vec<Revision> = serde_json::from_value(
            contract
                .query(GET_RECORD_REVISIONS, serde_json::json!({ "recordId": id }))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0].reason, None);
        assert_eq!(revisions[1].encrypted_data, "v1:cc:dd");
    }

    #[test]
    fn test_viewer_list_has_no_duplicates() {
        let mut contract = RecordsContract::default();
        let id = contract.create(&ctx(), create_input("v1:aa:bb")).unwrap();
        let input = AuthorizeViewer {
            record_id: id,
            viewer_address: Address::parse("0xnurse").unwrap(),
        };
        contract.authorize_viewer(&ctx(), input.clone()).unwrap();
        contract.authorize_viewer(&ctx(), input).unwrap();
        assert_eq!(contract.records[&id].authorized_viewers.len(), 1);
    }
}
