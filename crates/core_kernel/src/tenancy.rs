//! Tenancy types
//!
//! Every query and mutation in the ledger is scoped by the owning company's
//! code. The auth collaborator hands the core an [`Actor`]; the core trusts
//! the tuple and compares its tenant against every record it touches.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Company code that owns a set of accounts (the tenant key)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant id from a company code
    ///
    /// # Errors
    ///
    /// Returns a validation error if the code is blank
    pub fn new(code: impl Into<String>) -> Result<Self, CoreError> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(CoreError::validation("company code must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the company code
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of the acting user as reported by the auth collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// Company owner / administrator
    Admin,
    /// Employee account
    Employee,
}

/// The identity every core operation runs under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub tenant: TenantId,
    pub actor_id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(tenant: TenantId, actor_id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            tenant,
            actor_id: actor_id.into(),
            role,
        }
    }
}
