//! Simulated access-control contract

use std::collections::BTreeMap;

use mycelix_health_shared::{actions, AccessLogEntry, Address, Participant, PermissionGrant, PermissionId};

use super::{decode_params, encode, CallContext, SimulatedContract};
use crate::abi::access::*;
use crate::error::LedgerError;

#[derive(Default)]
pub(crate) struct AccessContract {
    users: BTreeMap<Address, Participant>,
    next_permission_id: PermissionId,
    permissions: BTreeMap<PermissionId, PermissionGrant>,
    logs: Vec<AccessLogEntry>,
}

impl AccessContract {
    fn register_user(&mut self, ctx: &CallContext, input: RegisterUser) -> Result<(), LedgerError> {
        if self.users.contains_key(&input.address) {
            return Err(LedgerError::reverted(format!("user {} already registered", input.address)));
        }
        if input.public_key.trim().is_empty() {
            return Err(LedgerError::reverted("public key is required"));
        }
        self.users.insert(
            input.address.clone(),
            Participant {
                address: input.address,
                role: input.role,
                public_key: input.public_key,
                professional_id: input.professional_id,
                is_active: true,
                registration_date: ctx.now,
            },
        );
        Ok(())
    }

    fn deactivate_user(&mut self, input: UserRef) -> Result<(), LedgerError> {
        let user = self
            .users
            .get_mut(&input.address)
            .ok_or_else(|| LedgerError::reverted(format!("unknown user {}", input.address)))?;
        user.is_active = false;
        Ok(())
    }

    fn grant(&mut self, ctx: &CallContext, input: GrantPermission) -> Result<PermissionId, LedgerError> {
        match self.users.get(&input.grantee) {
            Some(user) if user.is_active => {}
            Some(_) => {
                return Err(LedgerError::reverted(format!("grantee {} is deactivated", input.grantee)))
            }
            None => {
                return Err(LedgerError::reverted(format!("grantee {} is not registered", input.grantee)))
            }
        }
        if input.expiration_date <= ctx.now {
            return Err(LedgerError::reverted("expiration date must be in the future"));
        }
        let allowed_actions: std::collections::BTreeSet<String> = input
            .allowed_actions
            .iter()
            .map(|a| actions::normalize(a))
            .filter(|a| !a.is_empty())
            .collect();
        if allowed_actions.is_empty() {
            return Err(LedgerError::reverted("at least one action is required"));
        }

        self.next_permission_id += 1;
        let id = self.next_permission_id;
        self.permissions.insert(
            id,
            PermissionGrant {
                id,
                grantor: input.grantor,
                grantee: input.grantee,
                patient_id: input.patient_id,
                allowed_actions,
                expiration_date: input.expiration_date,
                is_active: true,
            },
        );
        Ok(id)
    }

    fn revoke(&mut self, input: PermissionRef) -> Result<(), LedgerError> {
        let grant = self
            .permissions
            .get_mut(&input.permission_id)
            .ok_or_else(|| LedgerError::reverted(format!("unknown permission {}", input.permission_id)))?;
        if !grant.is_active {
            return Err(LedgerError::reverted(format!(
                "permission {} is already revoked",
                input.permission_id
            )));
        }
        grant.is_active = false;
        Ok(())
    }

    fn log(&mut self, ctx: &CallContext, input: LogAccess) {
        self.logs.push(AccessLogEntry {
            accessor: input.accessor,
            patient_id: input.patient_id,
            action: input.action,
            success: input.success,
            details: input.details,
            timestamp: ctx.now,
        });
    }
}

impl SimulatedContract for AccessContract {
    fn gas_cost(&self, function: &str) -> Option<u64> {
        match function {
            REGISTER_USER => Some(60_000),
            DEACTIVATE_USER => Some(20_000),
            GRANT_PERMISSION => Some(90_000),
            REVOKE_PERMISSION => Some(30_000),
            LOG_ACCESS => Some(25_000),
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
            REGISTER_USER => self.register_user(ctx, decode_params(function, params)?).map(|_| None),
            DEACTIVATE_USER => self.deactivate_user(decode_params(function, params)?).map(|_| None),
            GRANT_PERMISSION => {
                let permission_id = self.grant(ctx, decode_params(function, params)?)?;
                Ok(Some(encode(&Granted { permission_id })?))
            }
            REVOKE_PERMISSION => self.revoke(decode_params(function, params)?).map(|_| None),
            LOG_ACCESS => {
                self.log(ctx, decode_params(function, params)?);
                Ok(None)
            }
            other => Err(LedgerError::reverted(format!("unknown function {}", other))),
        }
    }

    fn query(&self, function: &str, params: serde_json::Value) -> Result<serde_json::Value, LedgerError> {
        match function {
            GET_USER => {
                let input: UserRef = decode_params(function, params)?;
                let user = self
                    .users
                    .get(&input.address)
                    .ok_or_else(|| LedgerError::NotFound(format!("User {}", input.address)))?;
                encode(user)
            }
            GET_PERMISSION => {
                let input: PermissionRef = decode_params(function, params)?;
                let grant = self
                    .permissions
                    .get(&input.permission_id)
                    .ok_or_else(|| LedgerError::NotFound(format!("Permission {}", input.permission_id)))?;
                encode(grant)
            }
            GET_PATIENT_PERMISSIONS => {
                let input: PatientRef = decode_params(function, params)?;
                let grants: Vec<&PermissionGrant> = self
                    .permissions
                    .values()
                    .filter(|g| g.patient_id == input.patient_id)
                    .collect();
                encode(&grants)
            }
            GET_ACCESS_LOGS => {
                let input: PatientRef = decode_params(function, params)?;
                let entries: Vec<&AccessLogEntry> = self
                    .logs
                    .iter()
                    .filter(|e| e.patient_id == input.patient_id)
                    .collect();
                encode(&entries)
            }
            other => Err(LedgerError::reverted(format!("unknown query {}", other))),
        }
    }
}
