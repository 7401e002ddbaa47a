//! Canonical command objects, one per billing event
//!
//! Handlers normalize whatever shape arrives on the wire into these structs;
//! the engine never sees anything else.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{money, AccountId};

use crate::error::LedgerError;
use crate::transaction::TransactionMeta;

/// Invoice amounts after normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InvoiceAmounts {
    pub total: Decimal,
    pub deposited: Decimal,
}

fn invoice_amounts(total: Decimal, deposited: Decimal) -> Result<InvoiceAmounts, LedgerError> {
    let total = money::non_negative("total_amount", total)?;
    let deposited = money::non_negative("deposited_amount", deposited)?;
    let deposited = money::at_most("deposited_amount", deposited, total)?;
    Ok(InvoiceAmounts { total, deposited })
}

/// Record a sale against a customer (or walk-in against bank/cash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub account_id: AccountId,
    pub total_amount: Decimal,
    #[serde(default)]
    pub deposited_amount: Decimal,
    /// Bank/cash account receiving the deposit; defaults to cash in hand
    pub settle_via: Option<AccountId>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl RecordSale {
    pub fn new(account_id: AccountId, total_amount: Decimal, deposited_amount: Decimal) -> Self {
        Self {
            account_id,
            total_amount,
            deposited_amount,
            settle_via: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn settle_via(mut self, account_id: AccountId) -> Self {
        self.settle_via = Some(account_id);
        self
    }

    pub fn with_meta(mut self, meta: TransactionMeta) -> Self {
        self.meta = meta;
        self
    }

    pub(crate) fn amounts(&self) -> Result<InvoiceAmounts, LedgerError> {
        invoice_amounts(self.total_amount, self.deposited_amount)
    }
}

/// Record a purchase against a supplier (or walk-in against bank/cash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPurchase {
    pub account_id: AccountId,
    pub total_amount: Decimal,
    #[serde(default)]
    pub deposited_amount: Decimal,
    /// Bank/cash account paying the deposit; defaults to cash in hand
    pub settle_via: Option<AccountId>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl RecordPurchase {
    pub fn new(account_id: AccountId, total_amount: Decimal, deposited_amount: Decimal) -> Self {
        Self {
            account_id,
            total_amount,
            deposited_amount,
            settle_via: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn settle_via(mut self, account_id: AccountId) -> Self {
        self.settle_via = Some(account_id);
        self
    }

    pub fn with_meta(mut self, meta: TransactionMeta) -> Self {
        self.meta = meta;
        self
    }

    pub(crate) fn amounts(&self) -> Result<InvoiceAmounts, LedgerError> {
        invoice_amounts(self.total_amount, self.deposited_amount)
    }
}

/// Record a payment against open invoices of a ledger account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub account_id: AccountId,
    pub amount: Decimal,
    /// Invoice serials to settle, in order; empty means oldest open first
    #[serde(default)]
    pub target_invoices: Vec<String>,
    pub settle_via: Option<AccountId>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl RecordPayment {
    pub fn new(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            amount,
            target_invoices: Vec::new(),
            settle_via: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn targeting<I, S>(mut self, serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_invoices = serials.into_iter().map(Into::into).collect();
        self
    }

    pub fn settle_via(mut self, account_id: AccountId) -> Self {
        self.settle_via = Some(account_id);
        self
    }

    pub fn with_meta(mut self, meta: TransactionMeta) -> Self {
        self.meta = meta;
        self
    }

    pub(crate) fn normalized_amount(&self) -> Result<Decimal, LedgerError> {
        Ok(money::positive("amount", self.amount)?)
    }
}

/// Record a return, optionally against a specific invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReturn {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub original_serial: Option<String>,
    /// Bank/cash account the refund is paid from or into; none means no refund leg
    pub settle_via: Option<AccountId>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl RecordReturn {
    pub fn new(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            amount,
            original_serial: None,
            settle_via: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn against(mut self, original_serial: impl Into<String>) -> Self {
        self.original_serial = Some(original_serial.into());
        self
    }

    pub fn refund_via(mut self, account_id: AccountId) -> Self {
        self.settle_via = Some(account_id);
        self
    }

    pub fn with_meta(mut self, meta: TransactionMeta) -> Self {
        self.meta = meta;
        self
    }

    pub(crate) fn normalized_amount(&self) -> Result<Decimal, LedgerError> {
        Ok(money::positive("amount", self.amount)?)
    }
}
