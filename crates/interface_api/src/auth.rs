//! Authentication
//!
//! Tokens are issued by the external auth service; this module only decodes
//! them into the [`Actor`] every ledger operation runs under. `create_token`
//! exists for local tooling and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::{Actor, ActorRole, TenantId};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (actor ID)
    pub sub: String,
    /// Tenant the actor belongs to
    pub company_code: String,
    pub role: ActorRole,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// Converts verified claims into the acting identity
    pub fn actor(&self) -> Result<Actor, AuthError> {
        let tenant = TenantId::new(self.company_code.clone()).map_err(|_| AuthError::MissingTenant)?;
        Ok(Actor::new(tenant, self.sub.clone(), self.role))
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token carries no company code")]
    MissingTenant,
}

/// Creates a signed token for an actor
pub fn create_token(actor: &Actor, secret: &str, expiration_secs: u64) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: actor.actor_id.clone(),
        company_code: actor.tenant.as_str().to_string(),
        role: actor.role,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a token and returns its claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}
