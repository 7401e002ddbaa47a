//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{info, warn};

use core_kernel::{Actor, OperationMetadata};

use crate::auth::validate_token;
use crate::error::ApiError;
use crate::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Authentication middleware
///
/// Validates the bearer token and stores the resulting [`Actor`] in the
/// request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| {
            warn!("Missing or invalid Authorization header");
            ApiError::Unauthorized("missing bearer token".to_string())
        })?;

    let actor = validate_token(token, &state.config.jwt_secret)
        .and_then(|claims| claims.actor())
        .map_err(|e| {
            warn!(error = %e, "Token validation failed");
            ApiError::from(e)
        })?;

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

/// Audit logging middleware
///
/// Attaches an [`OperationMetadata`] to the request and logs every call with
/// the acting identity.
pub async fn audit_middleware(
    State(_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let correlation_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let actor = request.extensions().get::<Actor>().cloned();
    let (actor_id, tenant, role) = match &actor {
        Some(a) => (a.actor_id.clone(), a.tenant.to_string(), format!("{:?}", a.role)),
        None => ("anonymous".to_string(), "-".to_string(), "-".to_string()),
    };

    let metadata = OperationMetadata::with_correlation_id(correlation_id.clone())
        .initiated_by(actor_id.clone())
        .with_context("tenant", tenant.clone())
        .with_context("role", role.clone());
    request.extensions_mut().insert(metadata);

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        actor = %actor_id,
        tenant = %tenant,
        role = %role,
        request_id = %correlation_id,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
