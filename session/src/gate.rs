//! Session role gate.
//!
//! The gate decides UI visibility only. It trusts a locally cached role that
//! is never re-validated with the auth service, so it is NOT a security
//! control: anyone can edit the cached role. Data access is enforced by the
//! document store's own access rules.

use serde::Serialize;
use shared::counter;
use std::fmt;

use crate::identity::Role;
use crate::metrics_defs::GATE_DENIED;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No role is cached: nobody is signed in.
    Unauthenticated,
    /// A role is cached but the screen does not admit it.
    WrongRole,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Unauthenticated => f.write_str("not signed in"),
            DenyReason::WrongRole => f.write_str("not available for this role"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny(DenyReason),
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allow)
    }
}

/// Checks a cached role against the roles a screen admits.
pub fn check(cached_role: Option<Role>, required_roles: &[Role]) -> Access {
    let access = match cached_role {
        None => Access::Deny(DenyReason::Unauthenticated),
        Some(role) if required_roles.contains(&role) => Access::Allow,
        Some(_) => Access::Deny(DenyReason::WrongRole),
    };

    if let Access::Deny(reason) = access {
        tracing::debug!(?cached_role, ?required_roles, %reason, "Role gate denied");
        counter!(GATE_DENIED).increment(1);
    }
    access
}
