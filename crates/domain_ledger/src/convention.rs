//! Sign convention
//!
//! Every balance delta the engine applies comes from this module. The invoice
//! sign is `+1` for a sale and `-1` for a purchase; the table below is derived
//! from it.
//!
//! | event                          | ledger account  | bank / cash     |
//! |--------------------------------|-----------------|-----------------|
//! | invoice of kind k, total T, deposit D | `+sign(k)·T` | `+sign(k)·D` |
//! | payment applying `a` to kind k | `-sign(k)·a`    | `+sign(k)·a`    |
//! | return of `r` against kind k   | `-sign(k)·r`    | `-sign(k)·r`    |
//!
//! The deposit on an invoice does not net the ledger balance; it is tracked
//! in the invoice's `remaining_amount` and the deposited counters.

use rust_decimal::Decimal;

use crate::error::LedgerError;
use crate::transaction::TransactionKind;

/// Balance effect of one event on both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    /// Delta on the customer/supplier account
    pub ledger: Decimal,
    /// Delta on the bank/cash account moving the money
    pub cash: Decimal,
}

/// Effect of recording an invoice
pub fn invoice(kind: TransactionKind, total: Decimal, deposited: Decimal) -> Result<Effect, LedgerError> {
    let sign = kind.invoice_sign()?;
    Ok(Effect {
        ledger: sign * total,
        cash: sign * deposited,
    })
}

/// Effect of applying `amount` of a payment to an invoice of `invoice_kind`
pub fn payment(invoice_kind: TransactionKind, amount: Decimal) -> Result<Effect, LedgerError> {
    let sign = invoice_kind.invoice_sign()?;
    Ok(Effect {
        ledger: -sign * amount,
        cash: sign * amount,
    })
}

/// Effect of returning `amount` against an invoice of `invoice_kind`
pub fn refund(invoice_kind: TransactionKind, amount: Decimal) -> Result<Effect, LedgerError> {
    let sign = invoice_kind.invoice_sign()?;
    Ok(Effect {
        ledger: -sign * amount,
        cash: -sign * amount,
    })
}
