//! API error handling
//!
//! Every failure leaves the API as `{"error": <kind>, "message": ..., "details"?}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use domain_ledger::LedgerError;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Malformed or invalid request input
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Ledger(e) => {
                let status = match e {
                    LedgerError::Validation(_)
                    | LedgerError::Overpayment { .. }
                    | LedgerError::OverReturn { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
                    LedgerError::Conflict(_) => StatusCode::CONFLICT,
                    LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
                    LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.kind())
            }
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Ledger(LedgerError::Overpayment { amount, unallocated }) => Some(json!({
                "amount": amount,
                "unallocated": unallocated,
            })),
            ApiError::Ledger(LedgerError::OverReturn {
                original_serial,
                requested,
                available,
            }) => Some(json!({
                "original_serial": original_serial,
                "requested": requested,
                "available": available,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        // Adapter failures are logged in full but not echoed to the caller
        let message = match &self {
            ApiError::Ledger(LedgerError::Storage(e)) => {
                error!(error = %e, "Storage failure");
                "storage failure".to_string()
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: kind.to_string(),
            message,
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reasons: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, reasons.join(", "))
            })
            .collect();
        if fields.is_empty() {
            fields.push(errors.to_string());
        }
        fields.sort();
        ApiError::Validation(fields.join("; "))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}
