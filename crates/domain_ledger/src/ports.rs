//! Ledger Domain Ports
//!
//! This module defines the storage interfaces the ledger services run on.
//!
//! # Architecture
//!
//! Reads go through [`LedgerStore`] directly and see committed state only.
//! Every mutation goes through a [`LedgerUnit`]: one atomic unit of work that
//! either commits as a whole or leaves no trace. Adapters map a unit onto
//! whatever gives them that guarantee:
//!
//! - **Postgres adapter** (`infra_db`): one `sqlx` transaction, with
//!   `SELECT ... FOR UPDATE` on every account and invoice row the unit touches
//! - **In-memory adapter** ([`memory::InMemoryLedgerStore`]): the unit owns the
//!   store's lock, writes in place and undoes its writes unless it commits
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut unit = store.begin().await?;
//! let account = unit.lock_account(id).await?.ok_or_else(...)?;
//! // ... read-modify-write through the unit ...
//! unit.commit().await?;
//! ```
//!
//! Dropping a unit without committing rolls it back.

use async_trait::async_trait;
use rust_decimal::Decimal;

use core_kernel::{AccountId, DomainPort, HealthCheckable, PortError, TenantId, TransactionId};

use crate::account::{Account, AccountQuery};
use crate::transaction::{AllocationRecord, AppliedAllocation, NewTransaction, Page, Transaction};

/// An open atomic unit of work
///
/// Methods named `lock_*` take a row lock held until commit or rollback.
/// Callers lock ledger accounts before subsidiary accounts.
#[async_trait]
pub trait LedgerUnit: Send {
    /// Locks and returns an account
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, PortError>;

    /// Locks and returns the tenant's cash-in-hand account, if it exists
    async fn find_cash_in_hand(&mut self, tenant: &TenantId) -> Result<Option<Account>, PortError>;

    /// Inserts an account
    ///
    /// # Returns
    ///
    /// `false` when a uniqueness rule (the per-tenant cash-in-hand singleton)
    /// rejected the row
    async fn insert_account(&mut self, account: &Account) -> Result<bool, PortError>;

    /// Persists name, address, region, contact and `updated_at`
    async fn save_metadata(&mut self, account: &Account) -> Result<(), PortError>;

    /// Persists `current_balance`, the aggregate counters and `updated_at`
    async fn save_balances(&mut self, account: &Account) -> Result<(), PortError>;

    async fn delete_account(&mut self, id: AccountId) -> Result<(), PortError>;

    /// Number of log rows referencing the account, as owner or counterpart
    async fn count_transactions(&mut self, account_id: AccountId) -> Result<u64, PortError>;

    /// Appends a row
    ///
    /// # Returns
    ///
    /// `None` when the serial is already taken
    async fn insert_transaction(&mut self, row: &NewTransaction) -> Result<Option<Transaction>, PortError>;

    /// Locks and returns a row by serial within a tenant
    async fn lock_transaction(
        &mut self,
        tenant: &TenantId,
        serial: &str,
    ) -> Result<Option<Transaction>, PortError>;

    /// Locks the account's invoices with something remaining, oldest date
    /// first, then oldest record time
    async fn lock_open_invoices(&mut self, account_id: AccountId) -> Result<Vec<Transaction>, PortError>;

    /// Persists the deposited and remaining amounts of an invoice
    async fn save_settlement(&mut self, invoice: &Transaction) -> Result<(), PortError>;

    /// Sum already returned against `original_serial` on the account
    async fn returned_against(
        &mut self,
        account_id: AccountId,
        original_serial: &str,
    ) -> Result<Decimal, PortError>;

    async fn insert_allocation(
        &mut self,
        payment: &Transaction,
        allocation: &AppliedAllocation,
    ) -> Result<(), PortError>;

    async fn commit(self: Box<Self>) -> Result<(), PortError>;

    async fn rollback(self: Box<Self>) -> Result<(), PortError>;
}

/// An account together with the log aggregates it must agree with
///
/// All fields come from the same committed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationSnapshot {
    pub account: Account,
    /// Sum of `balance_change` over the account's rows
    pub balance_change_sum: Decimal,
    pub transaction_count: u64,
    /// Invoices violating the remaining-amount bounds
    pub invoice_violations: u64,
}

/// Storage backing the account store, the transaction ledger and the engine
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    /// Opens an atomic unit of work
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, PortError>;

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, PortError>;

    /// Lists a tenant's accounts, newest first
    async fn list_accounts(&self, tenant: &TenantId, query: &AccountQuery) -> Result<Vec<Account>, PortError>;

    /// Every account in the store, for the reconciliation sweep
    async fn list_account_ids(&self) -> Result<Vec<(TenantId, AccountId)>, PortError>;

    async fn find_transaction(&self, tenant: &TenantId, serial: &str) -> Result<Option<Transaction>, PortError>;

    /// Lists an account's rows by event date descending, then record time descending
    async fn list_transactions(&self, account_id: AccountId, page: Page) -> Result<Vec<Transaction>, PortError>;

    async fn sum_balance_change(&self, account_id: AccountId) -> Result<Decimal, PortError>;

    /// Reads an account and its log aggregates without taking row locks
    async fn reconciliation_snapshot(&self, id: AccountId) -> Result<Option<ReconciliationSnapshot>, PortError>;

    /// Allocations recorded for a payment, in application order
    async fn list_allocations(&self, payment_id: TransactionId) -> Result<Vec<AllocationRecord>, PortError>;
}

pub mod memory {
    //! In-memory adapter for tests and single-process deployments

    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard};

    use core_kernel::{AdapterHealth, HealthCheckResult};

    #[derive(Debug, Default)]
    struct MemoryState {
        accounts: HashMap<AccountId, Account>,
        transactions: Vec<Transaction>,
        serials: HashMap<String, usize>,
        allocations: Vec<AllocationRecord>,
    }

    impl MemoryState {
        fn rows_for(&self, account_id: AccountId) -> impl Iterator<Item = &Transaction> {
            self.transactions.iter().filter(move |t| t.account_id == account_id)
        }

        fn by_serial(&self, tenant: &TenantId, serial: &str) -> Option<&Transaction> {
            self.serials
                .get(serial)
                .map(|&index| &self.transactions[index])
                .filter(|t| &t.tenant == tenant)
        }

        fn cash_in_hand(&self, tenant: &TenantId) -> Option<&Account> {
            self.accounts
                .values()
                .find(|a| &a.tenant == tenant && a.is_cash_in_hand())
        }
    }

    /// Ledger store held entirely in memory
    ///
    /// Units are exclusive: a unit holds the store lock from `begin` until it
    /// commits or is dropped, so mutations are fully serialized.
    #[derive(Debug, Clone, Default)]
    pub struct InMemoryLedgerStore {
        state: Arc<Mutex<MemoryState>>,
    }

    impl InMemoryLedgerStore {
        /// Creates an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with accounts for testing
        pub async fn with_accounts(accounts: Vec<Account>) -> Self {
            let store = Self::new();
            {
                let mut state = store.state.lock().await;
                for account in accounts {
                    state.accounts.insert(account.id, account);
                }
            }
            store
        }

        /// Overwrites a stored account without touching the log
        ///
        /// Only useful for simulating drift in tests.
        pub async fn overwrite_account(&self, account: Account) {
            self.state.lock().await.accounts.insert(account.id, account);
        }

        /// Total rows in the log across all tenants
        pub async fn transaction_count(&self) -> usize {
            self.state.lock().await.transactions.len()
        }
    }

    impl DomainPort for InMemoryLedgerStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryLedgerStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "memory-ledger-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("In-memory store always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    /// Exclusive write unit over the shared state
    ///
    /// Writes go straight into the locked state. The unit remembers the first
    /// version of every row it touches plus the log lengths at `begin`, and
    /// puts them back unless it commits.
    struct MemoryUnit {
        working: OwnedMutexGuard<MemoryState>,
        accounts_before: HashMap<AccountId, Option<Account>>,
        settlements_before: HashMap<usize, (Decimal, Decimal)>,
        transactions_len: usize,
        allocations_len: usize,
        committed: bool,
    }

    impl MemoryUnit {
        fn new(working: OwnedMutexGuard<MemoryState>) -> Self {
            let transactions_len = working.transactions.len();
            let allocations_len = working.allocations.len();
            Self {
                working,
                accounts_before: HashMap::new(),
                settlements_before: HashMap::new(),
                transactions_len,
                allocations_len,
                committed: false,
            }
        }

        fn touch_account(&mut self, id: AccountId) {
            if !self.accounts_before.contains_key(&id) {
                let before = self.working.accounts.get(&id).cloned();
                self.accounts_before.insert(id, before);
            }
        }

        fn undo(&mut self) {
            for (id, before) in self.accounts_before.drain() {
                match before {
                    Some(account) => {
                        self.working.accounts.insert(id, account);
                    }
                    None => {
                        self.working.accounts.remove(&id);
                    }
                }
            }
            for (index, (deposited, remaining)) in self.settlements_before.drain() {
                let row = &mut self.working.transactions[index];
                row.deposited_amount = deposited;
                row.remaining_amount = remaining;
            }
            let appended: Vec<String> = self.working.transactions[self.transactions_len..]
                .iter()
                .map(|t| t.serial.clone())
                .collect();
            for serial in appended {
                self.working.serials.remove(&serial);
            }
            let transactions_len = self.transactions_len;
            let allocations_len = self.allocations_len;
            self.working.transactions.truncate(transactions_len);
            self.working.allocations.truncate(allocations_len);
        }
    }

    impl Drop for MemoryUnit {
        fn drop(&mut self) {
            if !self.committed {
                self.undo();
            }
        }
    }

    #[async_trait]
    impl LedgerUnit for MemoryUnit {
        async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, PortError> {
            Ok(self.working.accounts.get(&id).cloned())
        }

        async fn find_cash_in_hand(&mut self, tenant: &TenantId) -> Result<Option<Account>, PortError> {
            Ok(self.working.cash_in_hand(tenant).cloned())
        }

        async fn insert_account(&mut self, account: &Account) -> Result<bool, PortError> {
            if self.working.accounts.contains_key(&account.id) {
                return Err(PortError::conflict(format!("account {} already exists", account.id)));
            }
            if account.is_cash_in_hand() && self.working.cash_in_hand(&account.tenant).is_some() {
                return Ok(false);
            }
            self.touch_account(account.id);
            self.working.accounts.insert(account.id, account.clone());
            Ok(true)
        }

        async fn save_metadata(&mut self, account: &Account) -> Result<(), PortError> {
            self.touch_account(account.id);
            let stored = self
                .working
                .accounts
                .get_mut(&account.id)
                .ok_or_else(|| PortError::not_found("Account", account.id))?;
            stored.name = account.name.clone();
            stored.address = account.address.clone();
            stored.region = account.region.clone();
            stored.contact = account.contact.clone();
            stored.updated_at = account.updated_at;
            Ok(())
        }

        async fn save_balances(&mut self, account: &Account) -> Result<(), PortError> {
            self.touch_account(account.id);
            let stored = self
                .working
                .accounts
                .get_mut(&account.id)
                .ok_or_else(|| PortError::not_found("Account", account.id))?;
            stored.current_balance = account.current_balance;
            stored.sale_total = account.sale_total;
            stored.purchase_total = account.purchase_total;
            stored.deposited_sale_total = account.deposited_sale_total;
            stored.deposited_purchase_total = account.deposited_purchase_total;
            stored.sale_return_total = account.sale_return_total;
            stored.purchase_return_total = account.purchase_return_total;
            stored.updated_at = account.updated_at;
            Ok(())
        }

        async fn delete_account(&mut self, id: AccountId) -> Result<(), PortError> {
            self.touch_account(id);
            self.working
                .accounts
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::not_found("Account", id))
        }

        async fn count_transactions(&mut self, account_id: AccountId) -> Result<u64, PortError> {
            Ok(self
                .working
                .transactions
                .iter()
                .filter(|t| t.account_id == account_id || t.counterpart_account_id == Some(account_id))
                .count() as u64)
        }

        async fn insert_transaction(&mut self, row: &NewTransaction) -> Result<Option<Transaction>, PortError> {
            if self.working.serials.contains_key(&row.serial) {
                return Ok(None);
            }
            let index = self.working.transactions.len();
            let txn = row.clone().into_transaction(TransactionId::new(index as i64 + 1));
            self.working.serials.insert(txn.serial.clone(), index);
            self.working.transactions.push(txn.clone());
            Ok(Some(txn))
        }

        async fn lock_transaction(
            &mut self,
            tenant: &TenantId,
            serial: &str,
        ) -> Result<Option<Transaction>, PortError> {
            Ok(self.working.by_serial(tenant, serial).cloned())
        }

        async fn lock_open_invoices(&mut self, account_id: AccountId) -> Result<Vec<Transaction>, PortError> {
            let mut open: Vec<Transaction> = self
                .working
                .rows_for(account_id)
                .filter(|t| t.is_open_invoice())
                .cloned()
                .collect();
            open.sort_by(|a, b| (a.date, a.created_at, a.id).cmp(&(b.date, b.created_at, b.id)));
            Ok(open)
        }

        async fn save_settlement(&mut self, invoice: &Transaction) -> Result<(), PortError> {
            let index = *self
                .working
                .serials
                .get(&invoice.serial)
                .ok_or_else(|| PortError::not_found("Transaction", &invoice.serial))?;
            let stored = &mut self.working.transactions[index];
            if index < self.transactions_len {
                self.settlements_before
                    .entry(index)
                    .or_insert((stored.deposited_amount, stored.remaining_amount));
            }
            stored.deposited_amount = invoice.deposited_amount;
            stored.remaining_amount = invoice.remaining_amount;
            Ok(())
        }

        async fn returned_against(
            &mut self,
            account_id: AccountId,
            original_serial: &str,
        ) -> Result<Decimal, PortError> {
            Ok(self
                .working
                .rows_for(account_id)
                .filter(|t| {
                    t.kind == crate::TransactionKind::Return
                        && t.original_serial.as_deref() == Some(original_serial)
                })
                .map(|t| t.deposited_amount)
                .sum())
        }

        async fn insert_allocation(
            &mut self,
            payment: &Transaction,
            allocation: &AppliedAllocation,
        ) -> Result<(), PortError> {
            self.working.allocations.push(AllocationRecord {
                payment_id: payment.id,
                payment_serial: payment.serial.clone(),
                invoice_id: allocation.invoice_id,
                invoice_serial: allocation.invoice_serial.clone(),
                invoice_kind: allocation.invoice_kind,
                amount_applied: allocation.amount_applied,
                remaining_after: allocation.remaining_after,
                created_at: payment.created_at,
            });
            Ok(())
        }

        async fn commit(mut self: Box<Self>) -> Result<(), PortError> {
            self.committed = true;
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<(), PortError> {
            Ok(())
        }
    }

    #[async_trait]
    impl LedgerStore for InMemoryLedgerStore {
        async fn begin(&self) -> Result<Box<dyn LedgerUnit>, PortError> {
            let guard = self.state.clone().lock_owned().await;
            Ok(Box::new(MemoryUnit::new(guard)))
        }

        async fn find_account(&self, id: AccountId) -> Result<Option<Account>, PortError> {
            Ok(self.state.lock().await.accounts.get(&id).cloned())
        }

        async fn list_accounts(&self, tenant: &TenantId, query: &AccountQuery) -> Result<Vec<Account>, PortError> {
            let state = self.state.lock().await;
            let mut results: Vec<Account> = state
                .accounts
                .values()
                .filter(|a| &a.tenant == tenant && query.matches(a))
                .cloned()
                .collect();
            results.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

            let offset = query.offset.unwrap_or(0) as usize;
            let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
            Ok(results.into_iter().skip(offset).take(limit).collect())
        }

        async fn list_account_ids(&self) -> Result<Vec<(TenantId, AccountId)>, PortError> {
            let state = self.state.lock().await;
            Ok(state
                .accounts
                .values()
                .map(|a| (a.tenant.clone(), a.id))
                .collect())
        }

        async fn find_transaction(&self, tenant: &TenantId, serial: &str) -> Result<Option<Transaction>, PortError> {
            Ok(self.state.lock().await.by_serial(tenant, serial).cloned())
        }

        async fn list_transactions(&self, account_id: AccountId, page: Page) -> Result<Vec<Transaction>, PortError> {
            let state = self.state.lock().await;
            let mut rows: Vec<Transaction> = state.rows_for(account_id).cloned().collect();
            rows.sort_by(|a, b| (b.date, b.created_at, b.id).cmp(&(a.date, a.created_at, a.id)));
            Ok(rows
                .into_iter()
                .skip(page.offset as usize)
                .take(page.limit as usize)
                .collect())
        }

        async fn sum_balance_change(&self, account_id: AccountId) -> Result<Decimal, PortError> {
            Ok(self
                .state
                .lock()
                .await
                .rows_for(account_id)
                .map(|t| t.balance_change)
                .sum())
        }

        async fn reconciliation_snapshot(&self, id: AccountId) -> Result<Option<ReconciliationSnapshot>, PortError> {
            let state = self.state.lock().await;
            let Some(account) = state.accounts.get(&id).cloned() else {
                return Ok(None);
            };
            let (balance_change_sum, transaction_count, invoice_violations) = state.rows_for(id).fold(
                (Decimal::ZERO, 0u64, 0u64),
                |(sum, count, violations), t| {
                    (
                        sum + t.balance_change,
                        count + 1,
                        violations + u64::from(!t.satisfies_invoice_bounds()),
                    )
                },
            );
            Ok(Some(ReconciliationSnapshot {
                account,
                balance_change_sum,
                transaction_count,
                invoice_violations,
            }))
        }

        async fn list_allocations(&self, payment_id: TransactionId) -> Result<Vec<AllocationRecord>, PortError> {
            Ok(self
                .state
                .lock()
                .await
                .allocations
                .iter()
                .filter(|a| a.payment_id == payment_id)
                .cloned()
                .collect())
        }
    }
}
