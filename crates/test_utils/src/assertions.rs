//! Custom Test Assertions
//!
//! Assertion helpers for ledger types that give more meaningful failure
//! messages than a bare `assert_eq!` on whole structs.

use rust_decimal::Decimal;

use core_kernel::{AccountId, TenantId};
use domain_ledger::{
    Account, AppliedAllocation, Page, ReconciliationReport, Transaction, TransactionKind,
};

use crate::fixtures::LedgerHarness;

/// Asserts that two amounts are equal regardless of scale
///
/// # Panics
///
/// Panics with both values when they differ
pub fn assert_amount_eq(actual: Decimal, expected: Decimal) {
    assert_eq!(
        actual.normalize(),
        expected.normalize(),
        "Amounts differ: actual={}, expected={}",
        actual,
        expected
    );
}

/// Asserts the account's current balance
pub fn assert_balance(account: &Account, expected: Decimal) {
    assert_eq!(
        account.current_balance, expected,
        "Account '{}' ({}) balance is {}, expected {}",
        account.name, account.kind, account.current_balance, expected
    );
}

/// Asserts `0 <= remaining <= total` and `deposited + remaining == total`
///
/// # Panics
///
/// Panics if the transaction is not a sale or purchase, or if either bound fails
pub fn assert_invoice_bounds(invoice: &Transaction) {
    assert!(
        invoice.kind.is_invoice(),
        "{} is a {}, not an invoice",
        invoice.serial,
        invoice.kind
    );
    assert!(
        invoice.remaining_amount >= Decimal::ZERO && invoice.remaining_amount <= invoice.total_amount,
        "Invoice {} remaining {} outside [0, {}]",
        invoice.serial,
        invoice.remaining_amount,
        invoice.total_amount
    );
    assert_eq!(
        invoice.deposited_amount + invoice.remaining_amount,
        invoice.total_amount,
        "Invoice {} deposited {} + remaining {} != total {}",
        invoice.serial,
        invoice.deposited_amount,
        invoice.remaining_amount,
        invoice.total_amount
    );
}

/// Asserts that allocations sum to the payment amount
pub fn assert_allocations_sum(allocations: &[AppliedAllocation], amount: Decimal) {
    let applied: Decimal = allocations.iter().map(|a| a.amount_applied).sum();
    assert_eq!(
        applied,
        amount,
        "Allocations sum to {} across {} invoices, payment was {}",
        applied,
        allocations.len(),
        amount
    );
}

/// Asserts a clean reconciliation report
pub fn assert_report_ok(report: &ReconciliationReport) {
    assert!(
        report.ok,
        "Account {} drifted: current={}, expected={}, drift={}, invoice violations={}",
        report.account_id,
        report.current_balance,
        report.expected_balance,
        report.drift,
        report.invoice_violations
    );
}

/// Reconciles an account and checks every invoice on it
///
/// # Panics
///
/// Panics if reconciliation fails, reports drift, or any invoice is out of bounds
pub async fn assert_reconciled(harness: &LedgerHarness, tenant: &TenantId, account_id: AccountId) {
    let report = match harness.engine.reconcile(tenant, account_id).await {
        Ok(report) => report,
        Err(e) => panic!("reconcile({}) failed: {}", account_id, e),
    };
    assert_report_ok(&report);

    let rows = match harness
        .ledger
        .list_by_account(tenant, account_id, Page::new(500, 0))
        .await
    {
        Ok(rows) => rows,
        Err(e) => panic!("listing {} failed: {}", account_id, e),
    };
    rows.iter()
        .filter(|t| t.kind.is_invoice())
        .for_each(assert_invoice_bounds);
}

/// Asserts the kinds of a transaction list, in order
pub fn assert_kinds(rows: &[Transaction], expected: &[TransactionKind]) {
    let actual: Vec<TransactionKind> = rows.iter().map(|t| t.kind).collect();
    assert_eq!(actual, expected, "Unexpected transaction kinds");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_eq_ignores_scale() {
        assert_amount_eq(dec!(10.5000), dec!(10.5));
    }

    #[test]
    #[should_panic(expected = "Amounts differ")]
    fn test_amount_eq_panics_on_difference() {
        assert_amount_eq(dec!(10.5), dec!(10.4));
    }
}
