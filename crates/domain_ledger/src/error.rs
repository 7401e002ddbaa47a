//! Ledger domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{CoreError, MoneyError, PortError};

/// Errors that can occur in the ledger domain
///
/// Every variant aborts the whole unit of work it was raised in; nothing is
/// partially persisted and nothing is retried on the caller's behalf.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Bad or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown account or transaction
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Operation conflicts with stored state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payment exceeds what the targeted invoices still owe
    #[error(
        "Overpayment: payment of {amount} leaves {unallocated} unallocated after exhausting the target invoices"
    )]
    Overpayment { amount: Decimal, unallocated: Decimal },

    /// Return exceeds the original amount net of prior returns
    #[error(
        "Over-return: returning {requested} against {original_serial} exceeds the {available} still returnable"
    )]
    OverReturn {
        original_serial: String,
        requested: Decimal,
        available: Decimal,
    },

    /// Tenant mismatch
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Adapter failure (connection, query, serialization)
    #[error("Storage error: {0}")]
    Storage(PortError),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        LedgerError::Conflict(message.into())
    }

    /// Stable machine-readable kind used in response envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation_error",
            LedgerError::NotFound { .. } => "not_found",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::Overpayment { .. } => "overpayment",
            LedgerError::OverReturn { .. } => "over_return",
            LedgerError::Forbidden(_) => "forbidden",
            LedgerError::Storage(_) => "storage_error",
        }
    }
}

impl From<PortError> for LedgerError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound { entity_type, id } => LedgerError::NotFound {
                entity: entity_type,
                id,
            },
            PortError::Validation { message, .. } => LedgerError::Validation(message),
            PortError::Conflict { message } => LedgerError::Conflict(message),
            other => LedgerError::Storage(other),
        }
    }
}

impl From<MoneyError> for LedgerError {
    fn from(error: MoneyError) -> Self {
        LedgerError::Validation(error.to_string())
    }
}

impl From<CoreError> for LedgerError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::NotFound(message) => LedgerError::NotFound {
                entity: "record".to_string(),
                id: message,
            },
            other => LedgerError::Validation(other.to_string()),
        }
    }
}
