//! Transaction ledger
//!
//! The append-only log. Rows are only ever inserted, with one exception:
//! applying a payment moves money from `remaining_amount` to
//! `deposited_amount` on the earlier invoices it settles.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

use core_kernel::{money, AccountId, TenantId};

use crate::account::Account;
use crate::allocation;
use crate::error::LedgerError;
use crate::ports::{LedgerStore, LedgerUnit};
use crate::serial::{SerialGenerator, TimestampSerials};
use crate::transaction::{
    AllocationRecord, AppliedAllocation, Page, Transaction, TransactionDraft, TransactionKind,
};

/// Attempts at finding a free serial before giving up
pub const DEFAULT_SERIAL_ATTEMPTS: u32 = 5;

/// Append-only transaction log service
#[derive(Clone)]
pub struct TransactionLedger {
    store: Arc<dyn LedgerStore>,
    serials: Arc<dyn SerialGenerator>,
    max_serial_attempts: u32,
}

impl TransactionLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            serials: Arc::new(TimestampSerials),
            max_serial_attempts: DEFAULT_SERIAL_ATTEMPTS,
        }
    }

    /// Replaces the serial generator
    pub fn with_serials(mut self, serials: Arc<dyn SerialGenerator>) -> Self {
        self.serials = serials;
        self
    }

    /// Sets how many serials are tried before failing with `Conflict`
    pub fn with_max_serial_attempts(mut self, attempts: u32) -> Self {
        self.max_serial_attempts = attempts.max(1);
        self
    }

    /// Appends a row inside `unit`
    ///
    /// Validates the amounts, derives `remaining_amount`, and assigns a serial,
    /// retrying on collision.
    ///
    /// # Errors
    ///
    /// - `Validation` for negative amounts or an invoice deposit above its total
    /// - `Conflict` when every serial attempt collided
    pub async fn append(
        &self,
        unit: &mut dyn LedgerUnit,
        draft: TransactionDraft,
    ) -> Result<Transaction, LedgerError> {
        money::non_negative("total_amount", draft.total_amount)?;
        money::non_negative("deposited_amount", draft.deposited_amount)?;
        if draft.kind.is_invoice() {
            money::at_most("deposited_amount", draft.deposited_amount, draft.total_amount)?;
        }

        for attempt in 1..=self.max_serial_attempts {
            let now = Utc::now();
            let serial = self.serials.next_serial(draft.kind, now);
            let row = draft.stamp(serial, now);

            if let Some(txn) = unit.insert_transaction(&row).await? {
                debug!(serial = %txn.serial, kind = %txn.kind, "transaction appended");
                return Ok(txn);
            }
            warn!(serial = %row.serial, attempt, "serial collision, retrying");
        }

        Err(LedgerError::conflict(format!(
            "could not assign a unique serial after {} attempts",
            self.max_serial_attempts
        )))
    }

    /// Settles `amount` against the account's invoices inside `unit`
    ///
    /// With an empty `targets` list, the account's open invoices of its
    /// natural kind are used, oldest date first. Otherwise the serials are
    /// walked in the order given. Each invoice receives
    /// `min(remaining, left)`; settlements are written as they are made.
    ///
    /// # Errors
    ///
    /// - `NotFound` for a target that does not exist on this account
    /// - `Validation` for a non-invoice target, duplicate targets, or a target
    ///   set mixing sales and purchases
    /// - `Overpayment` if anything is left once the targets are exhausted; the
    ///   settlements already written are discarded with the unit
    pub async fn apply_payment(
        &self,
        unit: &mut dyn LedgerUnit,
        account: &Account,
        amount: Decimal,
        targets: &[String],
    ) -> Result<Vec<AppliedAllocation>, LedgerError> {
        let mut candidates = if targets.is_empty() {
            let natural = account.kind.natural_invoice_kind();
            unit.lock_open_invoices(account.id)
                .await?
                .into_iter()
                .filter(|t| Some(t.kind) == natural)
                .collect::<Vec<_>>()
        } else {
            allocation::ensure_distinct(targets)?;
            let mut locked = Vec::with_capacity(targets.len());
            for serial in targets {
                let invoice = unit
                    .lock_transaction(&account.tenant, serial)
                    .await?
                    .filter(|t| t.account_id == account.id)
                    .ok_or_else(|| LedgerError::not_found("Invoice", serial))?;
                locked.push(invoice);
            }
            locked
        };
        allocation::common_kind(&candidates)?;

        let plan = allocation::plan(amount, &candidates);
        let mut applied = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            let invoice = &mut candidates[step.index];
            invoice.settle(step.amount)?;
            unit.save_settlement(invoice).await?;
            applied.push(AppliedAllocation {
                invoice_id: invoice.id,
                invoice_serial: invoice.serial.clone(),
                invoice_kind: invoice.kind,
                amount_applied: step.amount,
                remaining_after: invoice.remaining_amount,
            });
        }

        if plan.unallocated > Decimal::ZERO {
            return Err(LedgerError::Overpayment {
                amount,
                unallocated: plan.unallocated,
            });
        }
        Ok(applied)
    }

    /// Persists the allocations of a payment row for audit
    pub async fn record_allocations(
        &self,
        unit: &mut dyn LedgerUnit,
        payment: &Transaction,
        allocations: &[AppliedAllocation],
    ) -> Result<(), LedgerError> {
        for allocation in allocations {
            unit.insert_allocation(payment, allocation).await?;
        }
        Ok(())
    }

    /// Lists an account's rows, newest event first
    pub async fn list_by_account(
        &self,
        tenant: &TenantId,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.owned_account(tenant, account_id).await?;
        Ok(self.store.list_transactions(account_id, page).await?)
    }

    /// Sum of `balance_change` over every row of the account
    pub async fn sum_balance_change(
        &self,
        tenant: &TenantId,
        account_id: AccountId,
    ) -> Result<Decimal, LedgerError> {
        self.owned_account(tenant, account_id).await?;
        Ok(self.store.sum_balance_change(account_id).await?)
    }

    /// Looks up a row by serial within the tenant
    pub async fn get_by_serial(&self, tenant: &TenantId, serial: &str) -> Result<Transaction, LedgerError> {
        self.store
            .find_transaction(tenant, serial)
            .await?
            .ok_or_else(|| LedgerError::not_found("Transaction", serial))
    }

    /// Allocations made by a payment
    pub async fn list_allocations(
        &self,
        tenant: &TenantId,
        payment_serial: &str,
    ) -> Result<Vec<AllocationRecord>, LedgerError> {
        let payment = self.get_by_serial(tenant, payment_serial).await?;
        if payment.kind != TransactionKind::Payment {
            return Err(LedgerError::validation(format!(
                "{} is a {}, only payments have allocations",
                payment_serial, payment.kind
            )));
        }
        Ok(self.store.list_allocations(payment.id).await?)
    }

    async fn owned_account(&self, tenant: &TenantId, account_id: AccountId) -> Result<Account, LedgerError> {
        let account = self
            .store
            .find_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Account", account_id))?;
        account.ensure_owned_by(tenant)?;
        Ok(account)
    }
}
