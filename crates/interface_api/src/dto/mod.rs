//! Request and query DTOs
//!
//! Responses serialize the domain types directly.

pub mod accounts;
pub mod billing;

use serde::Deserialize;

use domain_ledger::Page;

pub use accounts::{CreateAccountRequest, ListAccountsParams, UpdateAccountRequest};
pub use billing::{InvoiceRequest, PaymentRequest, ReturnRequest, SaleLine};

/// `?limit&offset` for log listings
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl From<PageParams> for Page {
    fn from(params: PageParams) -> Self {
        let default = Page::default();
        Page::new(
            params.limit.unwrap_or(default.limit),
            params.offset.unwrap_or(default.offset),
        )
    }
}
