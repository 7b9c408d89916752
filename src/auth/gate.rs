//! Role gates.
//!
//! Every route declares the set of roles allowed through it. The three
//! standard gates nest (admin ⊂ supervisor-or-above ⊂ technician-or-above);
//! report creation uses its own technician-only set.

use super::{claims::SubjectId, error::AuthError, principal::Principal, roles::Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleGate {
    pub name: &'static str,
    pub allowed: &'static [Role],
}

pub const ADMIN_ONLY: RoleGate = RoleGate {
    name: "admin_only",
    allowed: &[Role::Administrator],
};

pub const SUPERVISOR_OR_ABOVE: RoleGate = RoleGate {
    name: "supervisor_or_above",
    allowed: &[Role::Administrator, Role::Supervisor],
};

pub const TECHNICIAN_OR_ABOVE: RoleGate = RoleGate {
    name: "technician_or_above",
    allowed: &[Role::Administrator, Role::Supervisor, Role::Technician],
};

pub const TECHNICIAN_ONLY: RoleGate = RoleGate {
    name: "technician_only",
    allowed: &[Role::Technician],
};

impl RoleGate {
    pub fn permits(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }

    pub fn authorize(&self, principal: &Principal) -> Result<(), AuthError> {
        if self.permits(principal.role) {
            Ok(())
        } else {
            Err(AuthError::Denied { gate: self.name, role: principal.role })
        }
    }
}

/// Technicians may only touch rows they own; other roles pass.
///
/// Applied after a gate. `owner` is `None` when the row has no usable owner
/// column, which a technician can never satisfy.
pub fn ensure_owner(principal: &Principal, owner: Option<SubjectId>) -> Result<(), AuthError> {
    if principal.role != Role::Technician || owner == Some(principal.subject_id) {
        Ok(())
    } else {
        Err(AuthError::NotOwner { subject: principal.subject_id, owner })
    }
}
