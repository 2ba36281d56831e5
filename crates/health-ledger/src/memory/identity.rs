//! Simulated identity contract

use std::collections::{BTreeMap, HashMap, HashSet};

use mycelix_health_shared::{Address, CoarseAccess, PatientId, PatientIdentity};

use super::{decode_params, encode, CallContext, SimulatedContract};
use crate::abi::identity::*;
use crate::error::LedgerError;

#[derive(Default)]
pub(crate) struct IdentityContract {
    next_patient_id: PatientId,
    patients: BTreeMap<PatientId, PatientIdentity>,
    wallets: HashSet<Address>,
    access: HashMap<(PatientId, Address), CoarseAccess>,
}

impl IdentityContract {
    fn patient_mut(&mut self, patient_id: PatientId) -> Result<&mut PatientIdentity, LedgerError> {
        self.patients
            .get_mut(&patient_id)
            .ok_or_else(|| LedgerError::reverted(format!("unknown patient {}", patient_id)))
    }

    fn require_owner(patient: &PatientIdentity, sender: &Address) -> Result<(), LedgerError> {
        if &patient.wallet_address != sender {
            return Err(LedgerError::reverted(format!(
                "only the owning wallet may modify patient {}",
                patient.patient_id
            )));
        }
        Ok(())
    }

    fn register(&mut self, ctx: &CallContext, input: RegisterPatient) -> Result<PatientId, LedgerError> {
        if input.metadata_hash.is_empty() || input.encrypted_personal_data.is_empty() {
            return Err(LedgerError::reverted("personal data and metadata hash are required"));
        }
        if self.wallets.contains(&input.wallet_address) {
            return Err(LedgerError::reverted(format!(
                "wallet {} already owns an identity",
                input.wallet_address
            )));
        }

        self.next_patient_id += 1;
        let patient_id = self.next_patient_id;
        self.wallets.insert(input.wallet_address.clone());
        self.patients.insert(
            patient_id,
            PatientIdentity {
                patient_id,
                encrypted_personal_data: input.encrypted_personal_data,
                wallet_address: input.wallet_address,
                is_active: true,
                creation_date: ctx.now,
                metadata_hash: input.metadata_hash,
            },
        );
        Ok(patient_id)
    }

    fn update(&mut self, ctx: &CallContext, input: UpdatePatientData) -> Result<(), LedgerError> {
        let patient = self.patient_mut(input.patient_id)?;
        Self::require_owner(patient, &ctx.sender)?;
        if !patient.is_active {
            return Err(LedgerError::reverted(format!("patient {} is deactivated", input.patient_id)));
        }
        patient.encrypted_personal_data = input.encrypted_personal_data;
        patient.metadata_hash = input.metadata_hash;
        Ok(())
    }

    fn set_access(&mut self, input: DoctorAccess, state: CoarseAccess) -> Result<(), LedgerError> {
        self.patient_mut(input.patient_id)?;
        self.access.insert((input.patient_id, input.doctor_address), state);
        Ok(())
    }

    fn deactivate(&mut self, ctx: &CallContext, input: PatientRef) -> Result<(), LedgerError> {
        let patient = self.patient_mut(input.patient_id)?;
        Self::require_owner(patient, &ctx.sender)?;
        patient.is_active = false;
        Ok(())
    }
}

impl SimulatedContract for IdentityContract {
    fn gas_cost(&self, function: &str) -> Option<u64> {
        match function {
            REGISTER_PATIENT => Some(120_000),
            UPDATE_PATIENT_DATA => Some(80_000),
            GRANT_ACCESS | REVOKE_ACCESS => Some(40_000),
            DEACTIVATE_PATIENT => Some(30_000),
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
            REGISTER_PATIENT => {
                let patient_id = self.register(ctx, decode_params(function, params)?)?;
                Ok(Some(encode(&Registered { patient_id })?))
            }
            UPDATE_PATIENT_DATA => self.update(ctx, decode_params(function, params)?).map(|_| None),
            GRANT_ACCESS => self
                .set_access(decode_params(function, params)?, CoarseAccess::Granted)
                .map(|_| None),
            REVOKE_ACCESS => self
                .set_access(decode_params(function, params)?, CoarseAccess::Revoked)
                .map(|_| None),
            DEACTIVATE_PATIENT => self.deactivate(ctx, decode_params(function, params)?).map(|_| None),
            other => Err(LedgerError::reverted(format!("unknown function {}", other))),
        }
    }

    fn query(&self, function: &str, params: serde_json::Value) -> Result<serde_json::Value, LedgerError> {
        match function {
            GET_PATIENT => {
                let input: PatientRef = decode_params(function, params)?;
                let patient = self
                    .patients
                    .get(&input.patient_id)
                    .ok_or_else(|| LedgerError::NotFound(format!("Patient {}", input.patient_id)))?;
                encode(patient)
            }
            GET_ACCESS_STATE => {
                let input: DoctorAccess = decode_params(function, params)?;
                if !self.patients.contains_key(&input.patient_id) {
                    return Err(LedgerError::NotFound(format!("Patient {}", input.patient_id)));
                }
                let state = self
                    .access
                    .get(&(input.patient_id, input.doctor_address))
                    .copied()
                    .unwrap_or_default();
                encode(&state)
            }
            other => Err(LedgerError::reverted(format!("unknown query {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ctx(sender: &str) -> CallContext {
        CallContext {
            sender: Address::parse(sender).unwrap(),
            now: Utc::now(),
        }
    }

    fn register(contract: &mut IdentityContract, wallet: &str) -> Result<PatientId, LedgerError> {
        contract.register(
            &ctx("0.0.1001"),
            RegisterPatient {
                encrypted_personal_data: "v1:00:11".to_string(),
                metadata_hash: "ff".repeat(32),
                wallet_address: Address::parse(wallet).unwrap(),
            },
        )
    }

    #[test]
    fn test_ids_are_sequential_and_wallets_unique() {
        let mut contract = IdentityContract::default();
        assert_eq!(register(&mut contract, "0xaaa").unwrap(), 1);
        assert_eq!(register(&mut contract, "0xbbb").unwrap(), 2);
        assert!(register(&mut contract, "0xaaa").is_err());
    }

    #[test]
    fn test_only_owner_updates() {
        let mut contract = IdentityContract::default();
        let id = register(&mut contract, "0xowner").unwrap();
        let update = UpdatePatientData {
            patient_id: id,
            encrypted_personal_data: "v1:22:33".to_string(),
            metadata_hash: "ee".repeat(32),
        };
        assert!(contract.update(&ctx("0.0.1001"), update.clone()).is_err());
        assert!(contract.update(&ctx("0xowner"), update).is_ok());
        assert_eq!(contract.patients[&id].encrypted_personal_data, "v1:22:33");
    }

    #[test]
    fn test_coarse_access_defaults_to_unset() {
        let mut contract = IdentityContract::default();
        let id = register(&mut contract, "0xowner").unwrap();
        let params = serde_json::json!({ "patientId": id, "doctorAddress": "0xdoc" });

        let state: CoarseAccess =
            serde_json::from_value(contract.query(GET_ACCESS_STATE, params.clone()).unwrap()).unwrap();
        assert_eq!(state, CoarseAccess::Unset);

        contract.execute(&ctx("0.0.1001"), REVOKE_ACCESS, params.clone()).unwrap();
        let state: CoarseAccess =
            serde_json::from_value(contract.query(GET_ACCESS_STATE, params).unwrap()).unwrap();
        assert_eq!(state, CoarseAccess::Revoked);
    }

    #[test]
    fn test_missing_patient_query_is_not_found() {
        let contract = IdentityContract::default();
        let err = contract
            .query(GET_PATIENT, serde_json::json!({ "patientId": 42 }))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
