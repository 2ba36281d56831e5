//! Access decision evaluation
//!
//! Pure function of the participant, the coarse toggle, the patient's grants
//! and the current time. Two mechanisms are combined:
//! - a coarse `Revoked` toggle denies every action for the pair
//! - a coarse `Granted` toggle allows `READ` only
//! - anything else needs a valid fine-grained grant

use chrono::{DateTime, Utc};
use mycelix_health_shared::{actions, Address, CoarseAccess, Participant, PatientId, PermissionGrant, PermissionId};
use serde::{Deserialize, Serialize};

/// Outcome of an access check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    /// Whether access is authorized
    pub authorized: bool,
    /// Grant that authorized the access, if any
    pub permission_id: Option<PermissionId>,
    /// Reason for the authorization decision
    pub reason: String,
    /// Transaction that recorded the decision in the access log
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_transaction_id: Option<String>,
}

impl AccessDecision {
    fn allow(reason: impl Into<String>, permission_id: Option<PermissionId>) -> Self {
        Self {
            authorized: true,
            permission_id,
            reason: reason.into(),
            log_transaction_id: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            authorized: false,
            permission_id: None,
            reason: reason.into(),
            log_transaction_id: None,
        }
    }
}

/// Everything the evaluation looks at
pub struct AccessContext<'a> {
    pub user: &'a Address,
    /// `None` when the user is not registered
    pub participant: Option<&'a Participant>,
    pub patient_id: PatientId,
    pub coarse: CoarseAccess,
    pub grants: &'a [PermissionGrant],
    pub now: DateTime<Utc>,
}

pub fn evaluate(ctx: &AccessContext<'_>, action: &str) -> AccessDecision {
    let action = actions::normalize(action);

    match ctx.participant {
        None => return AccessDecision::deny(format!("{} is not a registered user", ctx.user)),
        Some(p) if !p.is_active => return AccessDecision::deny(format!("{} is deactivated", ctx.user)),
        Some(_) => {}
    }

    // Coarse revocation vetoes any grant
    if ctx.coarse == CoarseAccess::Revoked {
        return AccessDecision::deny("Patient revoked access for this user");
    }

    let grant = ctx
        .grants
        .iter()
        .find(|g| g.authorizes(ctx.user, ctx.patient_id, &action, ctx.now));
    if let Some(grant) = grant {
        return AccessDecision::allow(format!("Permission {} allows {}", grant.id, action), Some(grant.id));
    }

    if ctx.coarse == CoarseAccess::Granted && action == actions::READ {
        return AccessDecision::allow("Patient granted read access", None);
    }

    AccessDecision::deny(format!("No valid permission for {}", action))
}
