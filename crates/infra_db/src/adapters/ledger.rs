//! PostgreSQL Ledger Adapter
//!
//! Implements the ledger domain's [`LedgerStore`] and [`LedgerUnit`] ports on
//! top of [`LedgerRepository`].
//!
//! # Overview
//!
//! A [`LedgerUnit`] is one `sqlx` transaction. Account and invoice rows are
//! read with `SELECT ... FOR UPDATE`, so two units touching the same account
//! serialize on the row lock and neither can lose the other's update. The
//! engine takes locks in a fixed order (ledger account, then its invoices,
//! then the subsidiary account), which keeps concurrent units from
//! deadlocking on each other.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerStore;
//! use domain_ledger::{AccountStore, ReconciliationEngine};
//! use std::sync::Arc;
//!
//! let store = Arc::new(PostgresLedgerStore::new(pool));
//! let accounts = AccountStore::new(store.clone());
//! let engine = ReconciliationEngine::new(store);
//! ```

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};
use tracing::{debug, instrument};

use core_kernel::{
    AccountId, AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError, TenantId,
    TransactionId,
};
use domain_ledger::{
    Account, AccountKind, AccountQuery, AllocationRecord, AppliedAllocation, LedgerStore,
    LedgerUnit, NewTransaction, Page, ReconciliationSnapshot, Transaction, TransactionKind,
    CASH_IN_HAND,
};

use crate::error::DatabaseError;
use crate::repositories::ledger::{
    self as sql, AccountRow, AllocationRow, BalanceUpdate, LedgerRepository, NewAccount,
    NewTransactionRow, ReconciliationRow, TransactionRow,
};

const ADAPTER_ID: &str = "postgres-ledger-store";

/// PostgreSQL-backed ledger store
///
/// Cheap to clone; clones share the connection pool.
///
/// # Error Handling
///
/// Database errors are translated to `PortError` variants:
/// - `DatabaseError::NotFound` -> `PortError::NotFound`
/// - unique and foreign key violations -> `PortError::Conflict`
/// - connection problems -> `PortError::Connection`
/// - other errors -> `PortError::Internal`
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    repository: LedgerRepository,
}

impl PostgresLedgerStore {
    /// Creates a new store over the given pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: LedgerRepository::new(pool),
        }
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = self.repository.ping().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, PortError> {
        let tx = self.repository.begin().await?;
        Ok(Box::new(PgLedgerUnit { tx }))
    }

    #[instrument(skip(self), fields(account_id = %id))]
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, PortError> {
        debug!("Fetching account");
        let row = self.repository.find_account(id.into()).await?;
        Ok(row.map(account_from_row).transpose()?)
    }

    #[instrument(skip(self, query), fields(tenant = %tenant))]
    async fn list_accounts(&self, tenant: &TenantId, query: &AccountQuery) -> Result<Vec<Account>, PortError> {
        let rows = self
            .repository
            .list_accounts(
                tenant.as_str(),
                query.kind.map(|k| k.as_str()),
                query.name_contains.as_deref(),
                query.limit.map(i64::from),
                query.offset.map(i64::from).unwrap_or(0),
            )
            .await?;
        debug!(count = rows.len(), "Listed accounts");
        rows.into_iter()
            .map(|row| account_from_row(row).map_err(PortError::from))
            .collect()
    }

    async fn list_account_ids(&self) -> Result<Vec<(TenantId, AccountId)>, PortError> {
        let rows = self.repository.list_account_ids().await?;
        rows.into_iter()
            .map(|(company_code, account_id)| {
                let tenant = tenant_from_column(company_code)?;
                Ok::<_, PortError>((tenant, AccountId::from(account_id)))
            })
            .collect()
    }

    #[instrument(skip(self), fields(tenant = %tenant))]
    async fn find_transaction(&self, tenant: &TenantId, serial: &str) -> Result<Option<Transaction>, PortError> {
        let row = self.repository.find_transaction(tenant.as_str(), serial).await?;
        Ok(row.map(transaction_from_row).transpose()?)
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn list_transactions(&self, account_id: AccountId, page: Page) -> Result<Vec<Transaction>, PortError> {
        let rows = self
            .repository
            .list_transactions(account_id.into(), i64::from(page.limit), i64::from(page.offset))
            .await?;
        debug!(count = rows.len(), "Listed transactions");
        rows.into_iter()
            .map(|row| transaction_from_row(row).map_err(PortError::from))
            .collect()
    }

    async fn sum_balance_change(&self, account_id: AccountId) -> Result<Decimal, PortError> {
        Ok(self.repository.sum_balance_change(account_id.into()).await?)
    }

    #[instrument(skip(self), fields(account_id = %id))]
    async fn reconciliation_snapshot(&self, id: AccountId) -> Result<Option<ReconciliationSnapshot>, PortError> {
        let row = self.repository.find_reconciliation(id.into()).await?;
        Ok(row.map(snapshot_from_row).transpose()?)
    }

    async fn list_allocations(&self, payment_id: TransactionId) -> Result<Vec<AllocationRecord>, PortError> {
        let rows = self.repository.list_allocations(payment_id.value()).await?;
        rows.into_iter()
            .map(|row| allocation_from_row(row).map_err(PortError::from))
            .collect()
    }
}

/// One open database transaction
///
/// Dropping it without `commit` lets `sqlx` roll the transaction back.
pub struct PgLedgerUnit {
    tx: PgTransaction<'static, Postgres>,
}

#[async_trait]
impl LedgerUnit for PgLedgerUnit {
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, PortError> {
        let row = sql::tx_lock_account(&mut self.tx, id.into()).await?;
        Ok(row.map(account_from_row).transpose()?)
    }

    async fn find_cash_in_hand(&mut self, tenant: &TenantId) -> Result<Option<Account>, PortError> {
        let row = sql::tx_lock_cash_in_hand(&mut self.tx, tenant.as_str(), CASH_IN_HAND).await?;
        Ok(row.map(account_from_row).transpose()?)
    }

    async fn insert_account(&mut self, account: &Account) -> Result<bool, PortError> {
        let inserted = sql::tx_insert_account(
            &mut self.tx,
            NewAccount {
                account_id: account.id.into(),
                company_code: account.tenant.as_str(),
                kind: account.kind.as_str(),
                name: &account.name,
                address: account.address.as_deref(),
                region: account.region.as_deref(),
                contact: account.contact.as_deref(),
                opening_balance: account.opening_balance,
                created_at: account.created_at,
            },
        )
        .await?;
        Ok(inserted)
    }

    async fn save_metadata(&mut self, account: &Account) -> Result<(), PortError> {
        sql::tx_update_metadata(
            &mut self.tx,
            account.id.into(),
            &account.name,
            account.address.as_deref(),
            account.region.as_deref(),
            account.contact.as_deref(),
            account.updated_at,
        )
        .await?;
        Ok(())
    }

    async fn save_balances(&mut self, account: &Account) -> Result<(), PortError> {
        sql::tx_update_balances(
            &mut self.tx,
            account.id.into(),
            BalanceUpdate {
                current_balance: account.current_balance,
                sale_total: account.sale_total,
                purchase_total: account.purchase_total,
                deposited_sale_total: account.deposited_sale_total,
                deposited_purchase_total: account.deposited_purchase_total,
                sale_return_total: account.sale_return_total,
                purchase_return_total: account.purchase_return_total,
                updated_at: account.updated_at,
            },
        )
        .await?;
        Ok(())
    }

    async fn delete_account(&mut self, id: AccountId) -> Result<(), PortError> {
        sql::tx_delete_account(&mut self.tx, id.into()).await?;
        Ok(())
    }

    async fn count_transactions(&mut self, account_id: AccountId) -> Result<u64, PortError> {
        let count = sql::tx_count_references(&mut self.tx, account_id.into()).await?;
        Ok(count.max(0) as u64)
    }

    async fn insert_transaction(&mut self, row: &NewTransaction) -> Result<Option<Transaction>, PortError> {
        let inserted = sql::tx_insert_transaction(
            &mut self.tx,
            NewTransactionRow {
                serial: &row.serial,
                account_id: row.account_id.into(),
                company_code: row.tenant.as_str(),
                origin_id: row.origin_id,
                kind: row.kind.as_str(),
                total_amount: row.total_amount,
                deposited_amount: row.deposited_amount,
                remaining_amount: row.remaining_amount,
                balance_change: row.balance_change,
                original_serial: row.original_serial.as_deref(),
                counterpart_account_id: row.counterpart_account_id.map(Into::into),
                linked_serial: row.linked_serial.as_deref(),
                note: row.note.as_deref(),
                entry_date: row.date,
                created_at: row.created_at,
            },
        )
        .await?;
        Ok(inserted.map(transaction_from_row).transpose()?)
    }

    async fn lock_transaction(
        &mut self,
        tenant: &TenantId,
        serial: &str,
    ) -> Result<Option<Transaction>, PortError> {
        let row = sql::tx_lock_transaction(&mut self.tx, tenant.as_str(), serial).await?;
        Ok(row.map(transaction_from_row).transpose()?)
    }

    async fn lock_open_invoices(&mut self, account_id: AccountId) -> Result<Vec<Transaction>, PortError> {
        let rows = sql::tx_lock_open_invoices(&mut self.tx, account_id.into()).await?;
        rows.into_iter()
            .map(|row| transaction_from_row(row).map_err(PortError::from))
            .collect()
    }

    async fn save_settlement(&mut self, invoice: &Transaction) -> Result<(), PortError> {
        sql::tx_update_settlement(
            &mut self.tx,
            invoice.id.value(),
            invoice.deposited_amount,
            invoice.remaining_amount,
        )
        .await?;
        Ok(())
    }

    async fn returned_against(
        &mut self,
        account_id: AccountId,
        original_serial: &str,
    ) -> Result<Decimal, PortError> {
        Ok(sql::tx_returned_against(&mut self.tx, account_id.into(), original_serial).await?)
    }

    async fn insert_allocation(
        &mut self,
        payment: &Transaction,
        allocation: &AppliedAllocation,
    ) -> Result<(), PortError> {
        sql::tx_insert_allocation(
            &mut self.tx,
            payment.id.value(),
            allocation.invoice_id.value(),
            allocation.amount_applied,
            allocation.remaining_after,
            payment.created_at,
        )
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        let unit = *self;
        unit.tx
            .commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        let unit = *self;
        unit.tx
            .rollback()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }
}

fn tenant_from_column(company_code: String) -> Result<TenantId, DatabaseError> {
    TenantId::new(company_code).map_err(|e| DatabaseError::CorruptRow(e.to_string()))
}

fn account_from_row(row: AccountRow) -> Result<Account, DatabaseError> {
    let kind: AccountKind = row
        .kind
        .parse()
        .map_err(|e| DatabaseError::CorruptRow(format!("account {}: {}", row.account_id, e)))?;

    Ok(Account {
        id: AccountId::from(row.account_id),
        tenant: tenant_from_column(row.company_code)?,
        kind,
        name: row.name,
        address: row.address,
        region: row.region,
        contact: row.contact,
        opening_balance: row.opening_balance,
        current_balance: row.current_balance,
        sale_total: row.sale_total,
        purchase_total: row.purchase_total,
        deposited_sale_total: row.deposited_sale_total,
        deposited_purchase_total: row.deposited_purchase_total,
        sale_return_total: row.sale_return_total,
        purchase_return_total: row.purchase_return_total,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn snapshot_from_row(row: ReconciliationRow) -> Result<ReconciliationSnapshot, DatabaseError> {
    Ok(ReconciliationSnapshot {
        account: account_from_row(row.account)?,
        balance_change_sum: row.balance_change_sum,
        transaction_count: row.transaction_count.max(0) as u64,
        invoice_violations: row.invoice_violations.max(0) as u64,
    })
}

fn transaction_kind(value: &str, serial: &str) -> Result<TransactionKind, DatabaseError> {
    value
        .parse()
        .map_err(|e| DatabaseError::CorruptRow(format!("transaction {}: {}", serial, e)))
}

fn transaction_from_row(row: TransactionRow) -> Result<Transaction, DatabaseError> {
    let kind = transaction_kind(&row.kind, &row.serial)?;

    Ok(Transaction {
        id: TransactionId::new(row.transaction_id),
        serial: row.serial,
        account_id: AccountId::from(row.account_id),
        tenant: tenant_from_column(row.company_code)?,
        origin_id: row.origin_id,
        kind,
        total_amount: row.total_amount,
        deposited_amount: row.deposited_amount,
        remaining_amount: row.remaining_amount,
        balance_change: row.balance_change,
        original_serial: row.original_serial,
        counterpart_account_id: row.counterpart_account_id.map(AccountId::from),
        linked_serial: row.linked_serial,
        note: row.note,
        date: row.entry_date,
        created_at: row.created_at,
    })
}

fn allocation_from_row(row: AllocationRow) -> Result<AllocationRecord, DatabaseError> {
    let invoice_kind = transaction_kind(&row.invoice_kind, &row.invoice_serial)?;

    Ok(AllocationRecord {
        payment_id: TransactionId::new(row.payment_id),
        payment_serial: row.payment_serial,
        invoice_id: TransactionId::new(row.invoice_id),
        invoice_serial: row.invoice_serial,
        invoice_kind,
        amount_applied: row.amount_applied,
        remaining_after: row.remaining_after,
        created_at: row.created_at,
    })
}
