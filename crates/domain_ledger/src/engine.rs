//! Balance reconciliation engine
//!
//! The only component that changes `current_balance` or the aggregate
//! counters. Each operation opens one [`LedgerUnit`], locks the ledger account
//! first and any bank/cash account second, appends the log rows, writes the
//! balances and commits. Any error drops the unit, so nothing is persisted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{money, AccountId, TenantId};

use crate::account::Account;
use crate::commands::{InvoiceAmounts, RecordPayment, RecordPurchase, RecordReturn, RecordSale};
use crate::convention;
use crate::error::LedgerError;
use crate::journal::TransactionLedger;
use crate::ports::{LedgerStore, LedgerUnit, ReconciliationSnapshot};
use crate::store::{cash_in_hand_in, lock_owned};
use crate::transaction::{AppliedAllocation, Transaction, TransactionDraft, TransactionKind, TransactionMeta};

/// The bank/cash side of an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementLeg {
    pub account: Account,
    pub transaction: Transaction,
}

/// Outcome of a sale, purchase or return
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Posted {
    pub account: Account,
    pub transaction: Transaction,
    pub settlement: Option<SettlementLeg>,
}

/// Outcome of a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentPosted {
    pub account: Account,
    pub transaction: Transaction,
    pub allocations: Vec<AppliedAllocation>,
    pub settlement: Option<SettlementLeg>,
}

/// Result of checking one account against its log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub account_id: AccountId,
    pub tenant: TenantId,
    pub opening_balance: Decimal,
    pub current_balance: Decimal,
    /// `opening_balance + Σ balance_change`
    pub expected_balance: Decimal,
    /// `current_balance - expected_balance`
    pub drift: Decimal,
    pub transaction_count: u64,
    /// Invoices whose deposited/remaining amounts are out of bounds
    pub invoice_violations: u64,
    pub ok: bool,
    pub checked_at: DateTime<Utc>,
}

/// Applies billing events to accounts and the transaction log
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn LedgerStore>,
    ledger: TransactionLedger,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        let ledger = TransactionLedger::new(store.clone());
        Self { store, ledger }
    }

    /// Uses a preconfigured ledger (serial generator, retry limit)
    pub fn with_ledger(store: Arc<dyn LedgerStore>, ledger: TransactionLedger) -> Self {
        Self { store, ledger }
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    /// Records a sale
    ///
    /// On a customer account the receivable rises by the full total and the
    /// deposit, if any, lands on `settle_via` or the cash in hand. On a bank or
    /// cash account the sale is a walk-in and must be fully paid.
    #[instrument(skip(self, cmd), fields(account_id = %cmd.account_id, total = %cmd.total_amount))]
    pub async fn record_sale(&self, tenant: &TenantId, cmd: RecordSale) -> Result<Posted, LedgerError> {
        let amounts = cmd.amounts()?;
        self.record_invoice(tenant, TransactionKind::Sale, cmd.account_id, amounts, cmd.settle_via, cmd.meta)
            .await
    }

    /// Records a purchase; the mirror image of [`record_sale`](Self::record_sale)
    #[instrument(skip(self, cmd), fields(account_id = %cmd.account_id, total = %cmd.total_amount))]
    pub async fn record_purchase(&self, tenant: &TenantId, cmd: RecordPurchase) -> Result<Posted, LedgerError> {
        let amounts = cmd.amounts()?;
        self.record_invoice(tenant, TransactionKind::Purchase, cmd.account_id, amounts, cmd.settle_via, cmd.meta)
            .await
    }

    async fn record_invoice(
        &self,
        tenant: &TenantId,
        kind: TransactionKind,
        account_id: AccountId,
        amounts: InvoiceAmounts,
        settle_via: Option<AccountId>,
        meta: TransactionMeta,
    ) -> Result<Posted, LedgerError> {
        let InvoiceAmounts { total, deposited } = amounts;

        let mut unit = self.store.begin().await?;
        let mut account = lock_owned(unit.as_mut(), tenant, account_id).await?;

        if account.kind.is_subsidiary() {
            if settle_via.is_some() {
                return Err(LedgerError::validation(format!(
                    "a {} recorded on a {} account settles itself; settle_via is not allowed",
                    kind, account.kind
                )));
            }
            if deposited != total {
                return Err(LedgerError::validation(format!(
                    "a {} recorded on a {} account must be fully paid (total {}, deposited {})",
                    kind, account.kind, total, deposited
                )));
            }
        }

        let effect = convention::invoice(kind, total, deposited)?;
        let balance_change = if account.kind.is_ledger() {
            effect.ledger
        } else {
            effect.cash
        };

        let draft = TransactionDraft::new(account.id, tenant.clone(), kind, total, deposited, balance_change)
            .with_meta(meta.clone());
        let transaction = self.ledger.append(unit.as_mut(), draft).await?;

        account.apply_balance_change(balance_change)?;
        account.add_invoice_totals(kind, total, deposited)?;
        unit.save_balances(&account).await?;

        let settlement = if account.kind.is_ledger() && deposited > Decimal::ZERO {
            let subsidiary = resolve_settlement(unit.as_mut(), tenant, &account, settle_via, true).await?;
            match subsidiary {
                Some(mut subsidiary) => {
                    subsidiary.add_invoice_totals(kind, deposited, deposited)?;
                    let leg = self
                        .post_leg(unit.as_mut(), &mut subsidiary, &account, &transaction, kind, deposited, effect.cash, meta)
                        .await?;
                    Some(SettlementLeg {
                        account: subsidiary,
                        transaction: leg,
                    })
                }
                None => None,
            }
        } else {
            None
        };

        unit.commit().await?;

        info!(
            serial = %transaction.serial,
            balance_change = %balance_change,
            current_balance = %account.current_balance,
            "{} recorded",
            kind
        );
        Ok(Posted {
            account,
            transaction,
            settlement,
        })
    }

    /// Records a payment against a customer or supplier
    ///
    /// The amount is allocated across open invoices (see
    /// [`TransactionLedger::apply_payment`]); the account moves by the sum of
    /// the per-invoice effects and a payment row with zero total is appended.
    /// The cash moves through `settle_via` or the cash in hand.
    #[instrument(skip(self, cmd), fields(account_id = %cmd.account_id, amount = %cmd.amount))]
    pub async fn record_payment(&self, tenant: &TenantId, cmd: RecordPayment) -> Result<PaymentPosted, LedgerError> {
        let amount = cmd.normalized_amount()?;

        let mut unit = self.store.begin().await?;
        let mut account = lock_owned(unit.as_mut(), tenant, cmd.account_id).await?;
        if !account.kind.is_ledger() {
            return Err(LedgerError::validation(format!(
                "payments are recorded against customer or supplier accounts, not {}",
                account.kind
            )));
        }

        let allocations = self
            .ledger
            .apply_payment(unit.as_mut(), &account, amount, &cmd.target_invoices)
            .await?;

        let mut ledger_delta = Decimal::ZERO;
        let mut cash_delta = Decimal::ZERO;
        for allocation in &allocations {
            let effect = convention::payment(allocation.invoice_kind, allocation.amount_applied)?;
            ledger_delta = money::checked_add("balance_change", ledger_delta, effect.ledger)?;
            cash_delta = money::checked_add("balance_change", cash_delta, effect.cash)?;
        }

        let draft = TransactionDraft::new(
            account.id,
            tenant.clone(),
            TransactionKind::Payment,
            Decimal::ZERO,
            amount,
            ledger_delta,
        )
        .with_meta(cmd.meta.clone());
        let transaction = self.ledger.append(unit.as_mut(), draft).await?;
        self.ledger
            .record_allocations(unit.as_mut(), &transaction, &allocations)
            .await?;

        account.apply_balance_change(ledger_delta)?;
        for allocation in &allocations {
            account.add_settled(allocation.invoice_kind, allocation.amount_applied)?;
        }
        unit.save_balances(&account).await?;

        let settlement = match resolve_settlement(unit.as_mut(), tenant, &account, cmd.settle_via, true).await? {
            Some(mut subsidiary) => {
                for allocation in &allocations {
                    subsidiary.add_settled(allocation.invoice_kind, allocation.amount_applied)?;
                }
                let leg = self
                    .post_leg(
                        unit.as_mut(),
                        &mut subsidiary,
                        &account,
                        &transaction,
                        TransactionKind::Payment,
                        amount,
                        cash_delta,
                        cmd.meta,
                    )
                    .await?;
                Some(SettlementLeg {
                    account: subsidiary,
                    transaction: leg,
                })
            }
            None => None,
        };

        unit.commit().await?;

        info!(
            serial = %transaction.serial,
            invoices = allocations.len(),
            balance_change = %ledger_delta,
            current_balance = %account.current_balance,
            "payment recorded"
        );
        Ok(PaymentPosted {
            account,
            transaction,
            allocations,
            settlement,
        })
    }

    /// Records a return, optionally against a specific invoice
    ///
    /// Against an original, the cumulative returned amount may not exceed the
    /// original total. Without one, the account's natural invoice kind is
    /// assumed (sale for customers, purchase for suppliers). A refund leg is
    /// written only when `settle_via` names a bank/cash account.
    #[instrument(skip(self, cmd), fields(account_id = %cmd.account_id, amount = %cmd.amount))]
    pub async fn record_return(&self, tenant: &TenantId, cmd: RecordReturn) -> Result<Posted, LedgerError> {
        let amount = cmd.normalized_amount()?;

        let mut unit = self.store.begin().await?;
        let mut account = lock_owned(unit.as_mut(), tenant, cmd.account_id).await?;

        let invoice_kind = match cmd.original_serial.as_deref() {
            Some(serial) => {
                let original = unit
                    .lock_transaction(tenant, serial)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("Transaction", serial))?;
                if original.account_id != account.id {
                    return Err(LedgerError::validation(format!(
                        "{} belongs to a different account",
                        serial
                    )));
                }
                if !original.kind.is_invoice() {
                    return Err(LedgerError::validation(format!(
                        "{} is a {}, returns can only reference sales or purchases",
                        serial, original.kind
                    )));
                }

                let already = unit.returned_against(account.id, serial).await?;
                let available = original.total_amount - already;
                if amount > available {
                    return Err(LedgerError::OverReturn {
                        original_serial: serial.to_string(),
                        requested: amount,
                        available,
                    });
                }
                original.kind
            }
            None => account.kind.natural_invoice_kind().ok_or_else(|| {
                LedgerError::validation(format!(
                    "a return on a {} account must reference the original transaction",
                    account.kind
                ))
            })?,
        };

        if account.kind.is_subsidiary() && cmd.settle_via.is_some() {
            return Err(LedgerError::validation(format!(
                "a return on a {} account refunds itself; settle_via is not allowed",
                account.kind
            )));
        }

        let effect = convention::refund(invoice_kind, amount)?;
        let mut draft = TransactionDraft::new(
            account.id,
            tenant.clone(),
            TransactionKind::Return,
            Decimal::ZERO,
            amount,
            effect.ledger,
        )
        .with_meta(cmd.meta.clone());
        if let Some(ref serial) = cmd.original_serial {
            draft = draft.against(serial.clone());
        }
        let transaction = self.ledger.append(unit.as_mut(), draft).await?;

        account.apply_balance_change(effect.ledger)?;
        account.add_returned(invoice_kind, amount)?;
        unit.save_balances(&account).await?;

        let settlement = match resolve_settlement(unit.as_mut(), tenant, &account, cmd.settle_via, false).await? {
            Some(mut subsidiary) => {
                subsidiary.add_returned(invoice_kind, amount)?;
                let leg = self
                    .post_leg(
                        unit.as_mut(),
                        &mut subsidiary,
                        &account,
                        &transaction,
                        TransactionKind::Return,
                        amount,
                        effect.cash,
                        cmd.meta,
                    )
                    .await?;
                Some(SettlementLeg {
                    account: subsidiary,
                    transaction: leg,
                })
            }
            None => None,
        };

        unit.commit().await?;

        info!(
            serial = %transaction.serial,
            original = cmd.original_serial.as_deref().unwrap_or("-"),
            balance_change = %effect.ledger,
            "return recorded"
        );
        Ok(Posted {
            account,
            transaction,
            settlement,
        })
    }

    /// Recomputes an account's balance from its log and scans its invoices
    ///
    /// Reads one consistent snapshot without row locks, so a sweep never
    /// blocks writers.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, tenant: &TenantId, account_id: AccountId) -> Result<ReconciliationReport, LedgerError> {
        let ReconciliationSnapshot {
            account,
            balance_change_sum,
            transaction_count,
            invoice_violations,
        } = self
            .store
            .reconciliation_snapshot(account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Account", account_id))?;
        account.ensure_owned_by(tenant)?;

        let expected_balance = money::checked_add("expected_balance", account.opening_balance, balance_change_sum)?;
        let drift = account.current_balance - expected_balance;
        let ok = drift.is_zero() && invoice_violations == 0;

        if !ok {
            warn!(
                account_id = %account_id,
                tenant = %tenant,
                drift = %drift,
                invoice_violations,
                "account does not reconcile with its transaction log"
            );
        }

        Ok(ReconciliationReport {
            account_id,
            tenant: tenant.clone(),
            opening_balance: account.opening_balance,
            current_balance: account.current_balance,
            expected_balance,
            drift,
            transaction_count,
            invoice_violations,
            ok,
            checked_at: Utc::now(),
        })
    }

    /// Reconciles every account in the store
    ///
    /// Accounts deleted while the sweep runs are skipped.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<Vec<ReconciliationReport>, LedgerError> {
        let ids = self.store.list_account_ids().await?;
        let mut reports = Vec::with_capacity(ids.len());

        for (tenant, account_id) in ids {
            match self.reconcile(&tenant, account_id).await {
                Ok(report) => reports.push(report),
                Err(LedgerError::NotFound { .. }) => continue,
                Err(error) => return Err(error),
            }
        }

        let drifting = reports.iter().filter(|r| !r.ok).count();
        info!(accounts = reports.len(), drifting, "reconciliation sweep finished");
        Ok(reports)
    }

    #[allow(clippy::too_many_arguments)]
    async fn post_leg(
        &self,
        unit: &mut dyn LedgerUnit,
        subsidiary: &mut Account,
        counterpart: &Account,
        settles: &Transaction,
        kind: TransactionKind,
        amount: Decimal,
        balance_change: Decimal,
        meta: TransactionMeta,
    ) -> Result<Transaction, LedgerError> {
        let draft = TransactionDraft::new(subsidiary.id, subsidiary.tenant.clone(), kind, amount, amount, balance_change)
            .settling(counterpart.id, settles.serial.clone())
            .with_meta(meta);
        let leg = self.ledger.append(&mut *unit, draft).await?;

        subsidiary.apply_balance_change(balance_change)?;
        unit.save_balances(subsidiary).await?;
        Ok(leg)
    }
}

/// Picks and locks the bank/cash account for the cash side of an event
///
/// An explicit `settle_via` must be another bank/cash account of the tenant.
/// Without one, the tenant's cash in hand is used when `fallback` is set.
async fn resolve_settlement(
    unit: &mut dyn LedgerUnit,
    tenant: &TenantId,
    ledger_account: &Account,
    settle_via: Option<AccountId>,
    fallback: bool,
) -> Result<Option<Account>, LedgerError> {
    match settle_via {
        Some(id) => {
            if id == ledger_account.id {
                return Err(LedgerError::validation("an account cannot settle against itself"));
            }
            let subsidiary = lock_owned(unit, tenant, id).await?;
            if !subsidiary.kind.is_subsidiary() {
                return Err(LedgerError::validation(format!(
                    "settle_via must be a bank or cash account, {} is a {}",
                    id, subsidiary.kind
                )));
            }
            Ok(Some(subsidiary))
        }
        None if fallback => Ok(Some(cash_in_hand_in(unit, tenant).await?)),
        None => Ok(None),
    }
}
