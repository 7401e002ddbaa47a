//! HTTP request handlers

pub mod accounts;
pub mod billing;
pub mod health;
pub mod transactions;

use std::str::FromStr;

use core_kernel::AccountId;

use crate::error::ApiError;

/// Parses an account id path segment (`ACC-<uuid>` or a bare uuid)
pub(crate) fn parse_account_id(raw: &str) -> Result<AccountId, ApiError> {
    AccountId::from_str(raw).map_err(|_| ApiError::validation(format!("'{}' is not an account id", raw)))
}
