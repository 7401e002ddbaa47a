//! Greedy payment allocation
//!
//! Walks candidate invoices in the order given and assigns
//! `min(remaining, left)` to each until the payment is used up. Whatever is
//! left after the walk is reported back; the caller decides whether that is an
//! overpayment.

use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::error::LedgerError;
use crate::transaction::{Transaction, TransactionKind};

/// One step of an allocation plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationStep {
    /// Index into the candidate slice
    pub index: usize,
    pub amount: Decimal,
}

/// Result of walking the candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    pub steps: Vec<AllocationStep>,
    pub unallocated: Decimal,
}

impl AllocationPlan {
    pub fn allocated(&self) -> Decimal {
        self.steps.iter().map(|step| step.amount).sum()
    }
}

/// Plans the allocation of `amount` across `candidates`
///
/// Invoices with nothing remaining are skipped. The plan never assigns more
/// to an invoice than its remaining amount.
pub fn plan(amount: Decimal, candidates: &[Transaction]) -> AllocationPlan {
    let mut left = amount;
    let mut steps = Vec::new();

    for (index, invoice) in candidates.iter().enumerate() {
        if left <= Decimal::ZERO {
            break;
        }
        if !invoice.is_open_invoice() {
            continue;
        }
        let applied = invoice.remaining_amount.min(left);
        left -= applied;
        steps.push(AllocationStep { index, amount: applied });
    }

    AllocationPlan {
        steps,
        unallocated: left,
    }
}

/// Returns the single invoice kind shared by `candidates`
///
/// A payment settles either receivables or payables, never both.
pub fn common_kind(candidates: &[Transaction]) -> Result<Option<TransactionKind>, LedgerError> {
    let mut kind = None;
    for invoice in candidates {
        if !invoice.kind.is_invoice() {
            return Err(LedgerError::validation(format!(
                "{} is a {}, payments can only target sales or purchases",
                invoice.serial, invoice.kind
            )));
        }
        match kind {
            None => kind = Some(invoice.kind),
            Some(existing) if existing != invoice.kind => {
                return Err(LedgerError::validation(
                    "a payment cannot target sales and purchases at the same time",
                ));
            }
            Some(_) => {}
        }
    }
    Ok(kind)
}

/// Rejects a target list naming the same serial twice
pub fn ensure_distinct(serials: &[String]) -> Result<(), LedgerError> {
    let mut seen = HashSet::with_capacity(serials.len());
    for serial in serials {
        if !seen.insert(serial.as_str()) {
            return Err(LedgerError::validation(format!(
                "invoice {} is targeted more than once",
                serial
            )));
        }
    }
    Ok(())
}
