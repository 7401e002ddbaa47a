//! Account model
//!
//! Ledger accounts (customers, suppliers) and subsidiary accounts (bank,
//! cash) share one shape. Only the [`ReconciliationEngine`](crate::ReconciliationEngine)
//! changes the financial fields; metadata edits go through
//! [`AccountMetadataUpdate`], which cannot express a balance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{money, AccountId, TenantId};

use crate::error::LedgerError;
use crate::transaction::TransactionKind;

/// Name of the lazily created per-tenant cash account
pub const CASH_IN_HAND: &str = "cashInHand";

/// Kind of account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Counterparty we sell to (receivable)
    Customer,
    /// Counterparty we buy from (payable)
    Supplier,
    /// Bank account
    Bank,
    /// Cash account
    Cash,
}

impl AccountKind {
    /// Customer and supplier accounts track counterparty balances
    pub fn is_ledger(&self) -> bool {
        matches!(self, AccountKind::Customer | AccountKind::Supplier)
    }

    /// Bank and cash accounts track payment instruments
    pub fn is_subsidiary(&self) -> bool {
        !self.is_ledger()
    }

    /// The invoice kind a return or payment defaults to for this account
    pub fn natural_invoice_kind(&self) -> Option<TransactionKind> {
        match self {
            AccountKind::Customer => Some(TransactionKind::Sale),
            AccountKind::Supplier => Some(TransactionKind::Purchase),
            AccountKind::Bank | AccountKind::Cash => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Customer => "customer",
            AccountKind::Supplier => "supplier",
            AccountKind::Bank => "bank",
            AccountKind::Cash => "cash",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(AccountKind::Customer),
            "supplier" => Ok(AccountKind::Supplier),
            "bank" => Ok(AccountKind::Bank),
            "cash" => Ok(AccountKind::Cash),
            other => Err(LedgerError::validation(format!("unknown account kind '{}'", other))),
        }
    }
}

/// A ledger, bank or cash account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,
    /// Owning company
    pub tenant: TenantId,
    /// Account kind
    pub kind: AccountKind,
    /// Display name
    pub name: String,
    /// Postal address
    pub address: Option<String>,
    /// Sales region / area
    pub region: Option<String>,
    /// Phone or email of the counterparty
    pub contact: Option<String>,
    /// Balance at creation, never changes afterwards
    pub opening_balance: Decimal,
    /// Running balance
    pub current_balance: Decimal,
    /// Sum of sale invoice totals
    pub sale_total: Decimal,
    /// Sum of purchase invoice totals
    pub purchase_total: Decimal,
    /// Sum settled against sales (at sale time or by later payments)
    pub deposited_sale_total: Decimal,
    /// Sum settled against purchases
    pub deposited_purchase_total: Decimal,
    /// Sum returned against sales
    pub sale_return_total: Decimal,
    /// Sum returned against purchases
    pub purchase_return_total: Decimal,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last change timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new account whose running balance starts at the opening balance
    pub fn new(
        tenant: TenantId,
        kind: AccountKind,
        name: impl Into<String>,
        opening_balance: Decimal,
    ) -> Self {
        let now = Utc::now();
        let opening_balance = money::normalize(opening_balance);

        Self {
            id: AccountId::new_v7(),
            tenant,
            kind,
            name: name.into(),
            address: None,
            region: None,
            contact: None,
            opening_balance,
            current_balance: opening_balance,
            sale_total: Decimal::ZERO,
            purchase_total: Decimal::ZERO,
            deposited_sale_total: Decimal::ZERO,
            deposited_purchase_total: Decimal::ZERO,
            sale_return_total: Decimal::ZERO,
            purchase_return_total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates the zero-balance cash-in-hand account for a tenant
    pub fn cash_in_hand(tenant: TenantId) -> Self {
        Self::new(tenant, AccountKind::Cash, CASH_IN_HAND, Decimal::ZERO)
    }

    /// Returns true for the tenant's lazily created cash account
    pub fn is_cash_in_hand(&self) -> bool {
        self.kind == AccountKind::Cash && self.name == CASH_IN_HAND
    }

    /// Fails with `Forbidden` when the account belongs to another tenant
    pub fn ensure_owned_by(&self, tenant: &TenantId) -> Result<(), LedgerError> {
        if &self.tenant != tenant {
            return Err(LedgerError::Forbidden(format!(
                "account {} does not belong to company {}",
                self.id, tenant
            )));
        }
        Ok(())
    }

    /// True when no net movement has happened since creation
    pub fn is_at_opening_balance(&self) -> bool {
        self.current_balance == self.opening_balance
    }

    pub(crate) fn apply_balance_change(&mut self, delta: Decimal) -> Result<(), LedgerError> {
        self.current_balance = money::checked_add("current_balance", self.current_balance, delta)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn add_invoice_totals(
        &mut self,
        kind: TransactionKind,
        total: Decimal,
        deposited: Decimal,
    ) -> Result<(), LedgerError> {
        match kind {
            TransactionKind::Sale => {
                self.sale_total = money::checked_add("sale_total", self.sale_total, total)?;
                self.deposited_sale_total =
                    money::checked_add("deposited_sale_total", self.deposited_sale_total, deposited)?;
            }
            TransactionKind::Purchase => {
                self.purchase_total = money::checked_add("purchase_total", self.purchase_total, total)?;
                self.deposited_purchase_total =
                    money::checked_add("deposited_purchase_total", self.deposited_purchase_total, deposited)?;
            }
            TransactionKind::Payment | TransactionKind::Return => {}
        }
        Ok(())
    }

    pub(crate) fn add_settled(&mut self, invoice_kind: TransactionKind, amount: Decimal) -> Result<(), LedgerError> {
        match invoice_kind {
            TransactionKind::Sale => {
                self.deposited_sale_total =
                    money::checked_add("deposited_sale_total", self.deposited_sale_total, amount)?;
            }
            TransactionKind::Purchase => {
                self.deposited_purchase_total =
                    money::checked_add("deposited_purchase_total", self.deposited_purchase_total, amount)?;
            }
            TransactionKind::Payment | TransactionKind::Return => {}
        }
        Ok(())
    }

    pub(crate) fn add_returned(&mut self, invoice_kind: TransactionKind, amount: Decimal) -> Result<(), LedgerError> {
        match invoice_kind {
            TransactionKind::Sale => {
                self.sale_return_total = money::checked_add("sale_return_total", self.sale_return_total, amount)?;
            }
            TransactionKind::Purchase => {
                self.purchase_return_total =
                    money::checked_add("purchase_return_total", self.purchase_return_total, amount)?;
            }
            TransactionKind::Payment | TransactionKind::Return => {}
        }
        Ok(())
    }

    fn apply_metadata(&mut self, update: AccountMetadataUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(address) = update.address {
            self.address = Some(address);
        }
        if let Some(region) = update.region {
            self.region = Some(region);
        }
        if let Some(contact) = update.contact {
            self.contact = Some(contact);
        }
        self.updated_at = Utc::now();
    }

    pub(crate) fn with_metadata(mut self, update: AccountMetadataUpdate) -> Self {
        self.apply_metadata(update);
        self
    }
}

/// Command for creating an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccount {
    pub kind: AccountKind,
    pub name: String,
    #[serde(default)]
    pub opening_balance: Decimal,
    pub address: Option<String>,
    pub region: Option<String>,
    pub contact: Option<String>,
}

impl CreateAccount {
    pub fn new(kind: AccountKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            opening_balance: Decimal::ZERO,
            address: None,
            region: None,
            contact: None,
        }
    }

    pub fn customer(name: impl Into<String>) -> Self {
        Self::new(AccountKind::Customer, name)
    }

    pub fn supplier(name: impl Into<String>) -> Self {
        Self::new(AccountKind::Supplier, name)
    }

    pub fn bank(name: impl Into<String>) -> Self {
        Self::new(AccountKind::Bank, name)
    }

    /// Sets the opening balance
    pub fn with_opening_balance(mut self, opening_balance: Decimal) -> Self {
        self.opening_balance = opening_balance;
        self
    }

    /// Sets the contact details
    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }
}

/// Non-financial fields an account owner may change
///
/// Balances and aggregate counters are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMetadataUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub region: Option<String>,
    pub contact: Option<String>,
}

impl AccountMetadataUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none() && self.region.is_none() && self.contact.is_none()
    }
}

/// Filter for listing accounts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountQuery {
    /// Filter by kind
    pub kind: Option<AccountKind>,
    /// Case-insensitive substring match on the name
    pub name_contains: Option<String>,
    /// Limit results
    pub limit: Option<u32>,
    /// Offset for pagination
    pub offset: Option<u32>,
}

impl AccountQuery {
    /// Creates a query filtering by kind
    pub fn by_kind(kind: AccountKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    /// Adds pagination to the query
    pub fn paginate(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Returns true if the account passes the filter (pagination aside)
    pub fn matches(&self, account: &Account) -> bool {
        if let Some(kind) = self.kind {
            if account.kind != kind {
                return false;
            }
        }
        if let Some(ref needle) = self.name_contains {
            if !account.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tenant() -> TenantId {
        TenantId::new("ACME01").unwrap()
    }

    #[test]
    fn test_new_account_starts_at_opening_balance() {
        let account = Account::new(tenant(), AccountKind::Customer, "Ravi Traders", dec!(250));
        assert_eq!(account.current_balance, dec!(250));
        assert!(account.is_at_opening_balance());
        assert_eq!(account.sale_total, Decimal::ZERO);
    }

    #[test]
    fn test_counters_refuse_to_leave_storable_range() {
        let mut account = Account::new(tenant(), AccountKind::Customer, "Ravi Traders", dec!(0));
        account.sale_total = core_kernel::MAX_BALANCE;
        account.current_balance = core_kernel::MAX_BALANCE;

        let result = account.add_invoice_totals(TransactionKind::Sale, dec!(1), dec!(0));
        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert_eq!(account.sale_total, core_kernel::MAX_BALANCE);

        assert!(matches!(account.apply_balance_change(dec!(1)), Err(LedgerError::Validation(_))));
        assert_eq!(account.current_balance, core_kernel::MAX_BALANCE);
        assert!(account.apply_balance_change(dec!(-1)).is_ok());

        account.sale_return_total = Decimal::MAX;
        assert!(account.add_returned(TransactionKind::Sale, dec!(1)).is_err());
        assert!(account.add_settled(TransactionKind::Return, Decimal::MAX).is_ok());
    }

    #[test]
    fn test_kind_classification() {
        assert!(AccountKind::Customer.is_ledger());
        assert!(AccountKind::Supplier.is_ledger());
        assert!(AccountKind::Bank.is_subsidiary());
        assert!(AccountKind::Cash.is_subsidiary());
        assert_eq!(AccountKind::Cash.natural_invoice_kind(), None);
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [AccountKind::Customer, AccountKind::Supplier, AccountKind::Bank, AccountKind::Cash] {
            assert_eq!(kind.as_str().parse::<AccountKind>().unwrap(), kind);
        }
        assert!("vendor".parse::<AccountKind>().is_err());
    }

    #[test]
    fn test_foreign_tenant_is_forbidden() {
        let account = Account::new(tenant(), AccountKind::Bank, "HDFC", dec!(0));
        let other = TenantId::new("OTHER").unwrap();
        assert!(matches!(account.ensure_owned_by(&other), Err(LedgerError::Forbidden(_))));
        assert!(account.ensure_owned_by(&tenant()).is_ok());
    }

    #[test]
    fn test_metadata_update_leaves_balances_alone() {
        let account = Account::new(tenant(), AccountKind::Customer, "Old", dec!(10));
        let updated = account.clone().with_metadata(AccountMetadataUpdate {
            name: Some("New".to_string()),
            region: Some("North".to_string()),
            ..Default::default()
        });
        assert_eq!(updated.name, "New");
        assert_eq!(updated.region.as_deref(), Some("North"));
        assert_eq!(updated.current_balance, account.current_balance);
        assert_eq!(updated.opening_balance, account.opening_balance);
    }

    #[test]
    fn test_query_matches_name_case_insensitively() {
        let account = Account::new(tenant(), AccountKind::Customer, "Ravi Traders", dec!(0));
        let query = AccountQuery {
            name_contains: Some("ravi".to_string()),
            ..Default::default()
        };
        assert!(query.matches(&account));
        assert!(!AccountQuery::by_kind(AccountKind::Supplier).matches(&account));
    }
}
