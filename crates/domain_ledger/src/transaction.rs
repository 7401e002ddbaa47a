//! Transaction log types
//!
//! A [`Transaction`] is one row of the append-only log. Invoices (sales and
//! purchases) create debt; payments settle it; returns reverse part of it.
//! Settlement legs are ordinary rows on bank/cash accounts that carry a
//! pointer back to the ledger row they settle.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{money, AccountId, TenantId, TransactionId};

use crate::error::LedgerError;

/// Default page size for transaction listings
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: u32 = 500;

/// Kind of ledger event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sale,
    Purchase,
    Payment,
    Return,
}

impl TransactionKind {
    /// Sales and purchases are invoices; they carry debt that payments settle
    pub fn is_invoice(&self) -> bool {
        matches!(self, TransactionKind::Sale | TransactionKind::Purchase)
    }

    /// Invoice sign: sale = +1, purchase = -1
    ///
    /// # Errors
    ///
    /// Payments and returns have no sign of their own.
    pub fn invoice_sign(&self) -> Result<Decimal, LedgerError> {
        match self {
            TransactionKind::Sale => Ok(Decimal::ONE),
            TransactionKind::Purchase => Ok(Decimal::NEGATIVE_ONE),
            other => Err(LedgerError::validation(format!(
                "{} is not an invoice kind",
                other
            ))),
        }
    }

    /// Prefix used in generated serials
    pub fn serial_prefix(&self) -> &'static str {
        match self {
            TransactionKind::Sale => "SAL",
            TransactionKind::Purchase => "PUR",
            TransactionKind::Payment => "PAY",
            TransactionKind::Return => "RET",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Sale => "sale",
            TransactionKind::Purchase => "purchase",
            TransactionKind::Payment => "payment",
            TransactionKind::Return => "return",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(TransactionKind::Sale),
            "purchase" => Ok(TransactionKind::Purchase),
            "payment" => Ok(TransactionKind::Payment),
            "return" => Ok(TransactionKind::Return),
            other => Err(LedgerError::validation(format!("unknown transaction kind '{}'", other))),
        }
    }
}

/// One row of the append-only transaction log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Store-assigned row number
    pub id: TransactionId,
    /// Unique human-readable handle
    pub serial: String,
    /// Account the row belongs to
    pub account_id: AccountId,
    /// Owning company
    pub tenant: TenantId,
    /// Originating sale/purchase id from the billing collaborator
    pub origin_id: Option<Uuid>,
    pub kind: TransactionKind,
    pub total_amount: Decimal,
    pub deposited_amount: Decimal,
    /// Always `total_amount - deposited_amount`
    pub remaining_amount: Decimal,
    /// Signed delta applied to the account when the row was written
    pub balance_change: Decimal,
    /// Invoice a return was recorded against
    pub original_serial: Option<String>,
    /// For settlement legs, the ledger account on the other side
    pub counterpart_account_id: Option<AccountId>,
    /// For settlement legs, the serial of the ledger row being settled
    pub linked_serial: Option<String>,
    pub note: Option<String>,
    /// Event date
    pub date: NaiveDate,
    /// Record time
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// An invoice that still has something left to settle
    pub fn is_open_invoice(&self) -> bool {
        self.kind.is_invoice() && self.remaining_amount > Decimal::ZERO
    }

    /// True for rows written on a bank/cash account on behalf of a ledger row
    pub fn is_settlement_leg(&self) -> bool {
        self.linked_serial.is_some()
    }

    /// Checks `0 <= remaining <= total` and `deposited + remaining == total`
    ///
    /// Returns and payments carry a negative remaining by convention and are
    /// not subject to the bounds.
    pub fn satisfies_invoice_bounds(&self) -> bool {
        if !self.kind.is_invoice() {
            return true;
        }
        self.remaining_amount >= Decimal::ZERO
            && self.remaining_amount <= self.total_amount
            && self.deposited_amount + self.remaining_amount == self.total_amount
    }

    /// Moves `amount` from remaining to deposited
    ///
    /// # Errors
    ///
    /// Fails when the row is not an invoice or the amount exceeds what is
    /// still open.
    pub fn settle(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if !self.kind.is_invoice() {
            return Err(LedgerError::validation(format!(
                "{} is a {} and cannot be settled",
                self.serial, self.kind
            )));
        }
        if amount <= Decimal::ZERO || amount > self.remaining_amount {
            return Err(LedgerError::validation(format!(
                "cannot settle {} against {} with {} remaining",
                amount, self.serial, self.remaining_amount
            )));
        }
        let deposited = money::checked_add("deposited_amount", self.deposited_amount, amount)?;
        let remaining = money::checked_sub("remaining_amount", self.remaining_amount, amount)?;
        self.deposited_amount = deposited;
        self.remaining_amount = remaining;
        Ok(())
    }
}

/// Caller-supplied context for an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMeta {
    /// Event date; defaults to today
    pub date: Option<NaiveDate>,
    /// Originating sale/purchase id
    pub origin_id: Option<Uuid>,
    pub note: Option<String>,
}

impl TransactionMeta {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Default::default()
        }
    }

    pub fn with_origin(mut self, origin_id: Uuid) -> Self {
        self.origin_id = Some(origin_id);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A row waiting for a serial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub account_id: AccountId,
    pub tenant: TenantId,
    pub kind: TransactionKind,
    pub total_amount: Decimal,
    pub deposited_amount: Decimal,
    pub balance_change: Decimal,
    pub original_serial: Option<String>,
    pub counterpart_account_id: Option<AccountId>,
    pub linked_serial: Option<String>,
    pub meta: TransactionMeta,
}

impl TransactionDraft {
    pub fn new(
        account_id: AccountId,
        tenant: TenantId,
        kind: TransactionKind,
        total_amount: Decimal,
        deposited_amount: Decimal,
        balance_change: Decimal,
    ) -> Self {
        Self {
            account_id,
            tenant,
            kind,
            total_amount,
            deposited_amount,
            balance_change,
            original_serial: None,
            counterpart_account_id: None,
            linked_serial: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: TransactionMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn against(mut self, original_serial: impl Into<String>) -> Self {
        self.original_serial = Some(original_serial.into());
        self
    }

    /// Marks the draft as a settlement leg of `linked_serial` on `counterpart`
    pub fn settling(mut self, counterpart: AccountId, linked_serial: impl Into<String>) -> Self {
        self.counterpart_account_id = Some(counterpart);
        self.linked_serial = Some(linked_serial.into());
        self
    }

    /// Stamps the draft with a serial and record time
    pub fn stamp(&self, serial: String, now: DateTime<Utc>) -> NewTransaction {
        NewTransaction {
            serial,
            account_id: self.account_id,
            tenant: self.tenant.clone(),
            origin_id: self.meta.origin_id,
            kind: self.kind,
            total_amount: self.total_amount,
            deposited_amount: self.deposited_amount,
            remaining_amount: self.total_amount - self.deposited_amount,
            balance_change: self.balance_change,
            original_serial: self.original_serial.clone(),
            counterpart_account_id: self.counterpart_account_id,
            linked_serial: self.linked_serial.clone(),
            note: self.meta.note.clone(),
            date: self.meta.date.unwrap_or_else(|| now.date_naive()),
            created_at: now,
        }
    }
}

/// A fully stamped row handed to a [`LedgerUnit`](crate::LedgerUnit) for insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub serial: String,
    pub account_id: AccountId,
    pub tenant: TenantId,
    pub origin_id: Option<Uuid>,
    pub kind: TransactionKind,
    pub total_amount: Decimal,
    pub deposited_amount: Decimal,
    pub remaining_amount: Decimal,
    pub balance_change: Decimal,
    pub original_serial: Option<String>,
    pub counterpart_account_id: Option<AccountId>,
    pub linked_serial: Option<String>,
    pub note: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    /// Materializes the row once the store has assigned its id
    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            serial: self.serial,
            account_id: self.account_id,
            tenant: self.tenant,
            origin_id: self.origin_id,
            kind: self.kind,
            total_amount: self.total_amount,
            deposited_amount: self.deposited_amount,
            remaining_amount: self.remaining_amount,
            balance_change: self.balance_change,
            original_serial: self.original_serial,
            counterpart_account_id: self.counterpart_account_id,
            linked_serial: self.linked_serial,
            note: self.note,
            date: self.date,
            created_at: self.created_at,
        }
    }
}

/// Pagination window for log listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// Creates a page, clamping the limit to `1..=MAX_PAGE_SIZE`
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, 0)
    }
}

/// How much of a payment went to one invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedAllocation {
    pub invoice_id: TransactionId,
    pub invoice_serial: String,
    pub invoice_kind: TransactionKind,
    pub amount_applied: Decimal,
    /// Invoice remaining amount after this allocation
    pub remaining_after: Decimal,
}

/// A persisted allocation, as read back for audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub payment_id: TransactionId,
    pub payment_serial: String,
    pub invoice_id: TransactionId,
    pub invoice_serial: String,
    pub invoice_kind: TransactionKind,
    pub amount_applied: Decimal,
    pub remaining_after: Decimal,
    pub created_at: DateTime<Utc>,
}
