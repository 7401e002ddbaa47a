//! Test Data Builders
//!
//! Builders for account and invoice requests with sensible defaults, so tests
//! only spell out the fields they care about.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{AccountId, TenantId};
use domain_ledger::{
    Account, AccountKind, CreateAccount, LedgerError, Posted, RecordPurchase, RecordSale,
    TransactionKind, TransactionMeta,
};

use crate::fixtures::{DateFixtures, LedgerHarness};

/// Builder for account creation requests
pub struct AccountBuilder {
    request: CreateAccount,
}

impl AccountBuilder {
    pub fn customer() -> Self {
        Self::of(AccountKind::Customer, "Ravi Traders")
    }

    pub fn supplier() -> Self {
        Self::of(AccountKind::Supplier, "Sharma Wholesale")
    }

    pub fn bank() -> Self {
        Self::of(AccountKind::Bank, "State Bank Current")
    }

    pub fn of(kind: AccountKind, name: impl Into<String>) -> Self {
        Self {
            request: CreateAccount::new(kind, name),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.request.name = name.into();
        self
    }

    pub fn opening(mut self, amount: Decimal) -> Self {
        self.request.opening_balance = amount;
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.request.region = Some(region.into());
        self
    }

    pub fn contact(mut self, contact: impl Into<String>) -> Self {
        self.request.contact = Some(contact.into());
        self
    }

    /// Returns the request without persisting it
    pub fn build(self) -> CreateAccount {
        self.request
    }

    /// Creates the account through the harness's account store
    pub async fn create(self, harness: &LedgerHarness, tenant: &TenantId) -> Result<Account, LedgerError> {
        harness.accounts.create_account(tenant, self.request).await
    }
}

/// Builder for sale and purchase invoices
///
/// Defaults to an unpaid invoice of 1000.00 dated on the fixture business day.
pub struct InvoiceBuilder {
    kind: TransactionKind,
    account_id: AccountId,
    total: Decimal,
    deposited: Decimal,
    settle_via: Option<AccountId>,
    date: NaiveDate,
    note: Option<String>,
}

impl InvoiceBuilder {
    pub fn sale(account_id: AccountId) -> Self {
        Self::new(TransactionKind::Sale, account_id)
    }

    pub fn purchase(account_id: AccountId) -> Self {
        Self::new(TransactionKind::Purchase, account_id)
    }

    fn new(kind: TransactionKind, account_id: AccountId) -> Self {
        Self {
            kind,
            account_id,
            total: dec!(1000.00),
            deposited: Decimal::ZERO,
            settle_via: None,
            date: DateFixtures::business_day(),
            note: None,
        }
    }

    pub fn total(mut self, total: Decimal) -> Self {
        self.total = total;
        self
    }

    pub fn deposited(mut self, deposited: Decimal) -> Self {
        self.deposited = deposited;
        self
    }

    /// Walk-in invoice: deposited equals total
    pub fn paid_in_full(mut self) -> Self {
        self.deposited = self.total;
        self
    }

    pub fn settle_via(mut self, account_id: AccountId) -> Self {
        self.settle_via = Some(account_id);
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    fn meta(&self) -> TransactionMeta {
        let meta = TransactionMeta::on(self.date);
        match &self.note {
            Some(note) => meta.with_note(note.clone()),
            None => meta,
        }
    }

    pub fn build_sale(self) -> RecordSale {
        let mut cmd = RecordSale::new(self.account_id, self.total, self.deposited).with_meta(self.meta());
        if let Some(via) = self.settle_via {
            cmd = cmd.settle_via(via);
        }
        cmd
    }

    pub fn build_purchase(self) -> RecordPurchase {
        let mut cmd =
            RecordPurchase::new(self.account_id, self.total, self.deposited).with_meta(self.meta());
        if let Some(via) = self.settle_via {
            cmd = cmd.settle_via(via);
        }
        cmd
    }

    /// Records the invoice through the harness's engine
    pub async fn record(self, harness: &LedgerHarness, tenant: &TenantId) -> Result<Posted, LedgerError> {
        match self.kind {
            TransactionKind::Purchase => harness.engine.record_purchase(tenant, self.build_purchase()).await,
            _ => harness.engine.record_sale(tenant, self.build_sale()).await,
        }
    }
}
