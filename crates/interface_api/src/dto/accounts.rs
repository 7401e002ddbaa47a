//! Account DTOs

use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use domain_ledger::{AccountKind, AccountMetadataUpdate, AccountQuery, CreateAccount};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    pub kind: AccountKind,
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,
    #[serde(default)]
    pub opening_balance: Decimal,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 120))]
    pub region: Option<String>,
    #[validate(length(max = 40))]
    pub contact: Option<String>,
}

impl From<CreateAccountRequest> for CreateAccount {
    fn from(request: CreateAccountRequest) -> Self {
        CreateAccount {
            kind: request.kind,
            name: request.name,
            opening_balance: request.opening_balance,
            address: request.address,
            region: request.region,
            contact: request.contact,
        }
    }
}

/// Metadata changes; balances are never editable through this request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 120))]
    pub region: Option<String>,
    #[validate(length(max = 40))]
    pub contact: Option<String>,
}

impl From<UpdateAccountRequest> for AccountMetadataUpdate {
    fn from(request: UpdateAccountRequest) -> Self {
        AccountMetadataUpdate {
            name: request.name,
            address: request.address,
            region: request.region,
            contact: request.contact,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListAccountsParams {
    pub kind: Option<AccountKind>,
    /// Case-insensitive name fragment
    pub name: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl From<ListAccountsParams> for AccountQuery {
    fn from(params: ListAccountsParams) -> Self {
        AccountQuery {
            kind: params.kind,
            name_contains: params.name.filter(|n| !n.trim().is_empty()),
            limit: params.limit,
            offset: params.offset,
        }
    }
}
