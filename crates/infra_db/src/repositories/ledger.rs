//! Ledger repository implementation
//!
//! Row types and SQL for accounts, the transaction log and payment
//! allocations. Reads against the pool live on [`LedgerRepository`]; the
//! `tx_*` functions run inside an open transaction and are what the adapter's
//! unit of work is built from.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DatabaseError;

const ACCOUNT_COLUMNS: &str = r#"
    account_id, company_code, kind, name, address, region, contact,
    opening_balance, current_balance,
    sale_total, purchase_total, deposited_sale_total, deposited_purchase_total,
    sale_return_total, purchase_return_total,
    created_at, updated_at
"#;

const TRANSACTION_COLUMNS: &str = r#"
    transaction_id, serial, account_id, company_code, origin_id, kind,
    total_amount, deposited_amount, remaining_amount, balance_change,
    original_serial, counterpart_account_id, linked_serial, note,
    entry_date, created_at
"#;

/// Database row for an account
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub account_id: Uuid,
    pub company_code: String,
    pub kind: String,
    pub name: String,
    pub address: Option<String>,
    pub region: Option<String>,
    pub contact: Option<String>,
    pub opening_balance: Decimal,
    pub current_balance: Decimal,
    pub sale_total: Decimal,
    pub purchase_total: Decimal,
    pub deposited_sale_total: Decimal,
    pub deposited_purchase_total: Decimal,
    pub sale_return_total: Decimal,
    pub purchase_return_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for a transaction log entry
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub transaction_id: i64,
    pub serial: String,
    pub account_id: Uuid,
    pub company_code: String,
    pub origin_id: Option<Uuid>,
    pub kind: String,
    pub total_amount: Decimal,
    pub deposited_amount: Decimal,
    pub remaining_amount: Decimal,
    pub balance_change: Decimal,
    pub original_serial: Option<String>,
    pub counterpart_account_id: Option<Uuid>,
    pub linked_serial: Option<String>,
    pub note: Option<String>,
    pub entry_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Allocation joined with the payment and invoice serials
#[derive(Debug, Clone, FromRow)]
pub struct AllocationRow {
    pub payment_id: i64,
    pub payment_serial: String,
    pub invoice_id: i64,
    pub invoice_serial: String,
    pub invoice_kind: String,
    pub amount_applied: Decimal,
    pub remaining_after: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Account row joined with the aggregates of its log
#[derive(Debug, Clone, FromRow)]
pub struct ReconciliationRow {
    #[sqlx(flatten)]
    pub account: AccountRow,
    pub balance_change_sum: Decimal,
    pub transaction_count: i64,
    pub invoice_violations: i64,
}

/// Data for inserting an account
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub account_id: Uuid,
    pub company_code: &'a str,
    pub kind: &'a str,
    pub name: &'a str,
    pub address: Option<&'a str>,
    pub region: Option<&'a str>,
    pub contact: Option<&'a str>,
    pub opening_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Balance columns written by the engine
#[derive(Debug, Clone, Copy)]
pub struct BalanceUpdate {
    pub current_balance: Decimal,
    pub sale_total: Decimal,
    pub purchase_total: Decimal,
    pub deposited_sale_total: Decimal,
    pub deposited_purchase_total: Decimal,
    pub sale_return_total: Decimal,
    pub purchase_return_total: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Data for appending a transaction row
#[derive(Debug, Clone)]
pub struct NewTransactionRow<'a> {
    pub serial: &'a str,
    pub account_id: Uuid,
    pub company_code: &'a str,
    pub origin_id: Option<Uuid>,
    pub kind: &'a str,
    pub total_amount: Decimal,
    pub deposited_amount: Decimal,
    pub remaining_amount: Decimal,
    pub balance_change: Decimal,
    pub original_serial: Option<&'a str>,
    pub counterpart_account_id: Option<Uuid>,
    pub linked_serial: Option<&'a str>,
    pub note: Option<&'a str>,
    pub entry_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Repository for committed ledger reads
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a database transaction
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
    }

    pub async fn find_account(&self, account_id: Uuid) -> Result<Option<AccountRow>, DatabaseError> {
        let sql = format!("SELECT {} FROM accounts WHERE account_id = $1", ACCOUNT_COLUMNS);
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Lists a company's accounts, newest first
    ///
    /// A `None` limit binds SQL `NULL`, which Postgres treats as `LIMIT ALL`.
    pub async fn list_accounts(
        &self,
        company_code: &str,
        kind: Option<&str>,
        name_contains: Option<&str>,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<AccountRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM accounts
            WHERE company_code = $1
              AND ($2::TEXT IS NULL OR kind = $2)
              AND ($3::TEXT IS NULL OR strpos(lower(name), lower($3)) > 0)
            ORDER BY created_at DESC, account_id DESC
            LIMIT $4 OFFSET $5
            "#,
            ACCOUNT_COLUMNS
        );
        let rows = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(company_code)
            .bind(kind)
            .bind(name_contains)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_account_ids(&self) -> Result<Vec<(String, Uuid)>, DatabaseError> {
        let rows = sqlx::query_as::<_, (String, Uuid)>(
            "SELECT company_code, account_id FROM accounts ORDER BY company_code, created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_transaction(
        &self,
        company_code: &str,
        serial: &str,
    ) -> Result<Option<TransactionRow>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM ledger_transactions WHERE company_code = $1 AND serial = $2",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(company_code)
            .bind(serial)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Lists an account's rows by event date, newest first
    pub async fn list_transactions(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TransactionRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM ledger_transactions
            WHERE account_id = $1
            ORDER BY entry_date DESC, created_at DESC, transaction_id DESC
            LIMIT $2 OFFSET $3
            "#,
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(account_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn sum_balance_change(&self, account_id: Uuid) -> Result<Decimal, DatabaseError> {
        let sum = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(balance_change), 0) FROM ledger_transactions WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum)
    }

    /// Reads the account and its log aggregates in one statement
    ///
    /// A single statement sees one snapshot, so the account and the sums
    /// agree without `FOR UPDATE`.
    pub async fn find_reconciliation(&self, account_id: Uuid) -> Result<Option<ReconciliationRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {}, log.balance_change_sum, log.transaction_count, log.invoice_violations
            FROM accounts
            CROSS JOIN LATERAL (
                SELECT
                    COALESCE(SUM(t.balance_change), 0) AS balance_change_sum,
                    COUNT(*) AS transaction_count,
                    COUNT(*) FILTER (
                        WHERE t.kind IN ('sale', 'purchase')
                          AND (t.remaining_amount < 0
                               OR t.remaining_amount > t.total_amount
                               OR t.deposited_amount + t.remaining_amount <> t.total_amount)
                    ) AS invoice_violations
                FROM ledger_transactions t
                WHERE t.account_id = accounts.account_id
            ) log
            WHERE accounts.account_id = $1
            "#,
            ACCOUNT_COLUMNS
        );
        let row = sqlx::query_as::<_, ReconciliationRow>(&sql)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_allocations(&self, payment_id: i64) -> Result<Vec<AllocationRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, AllocationRow>(
            r#"
            SELECT
                a.payment_id,
                p.serial AS payment_serial,
                a.invoice_id,
                i.serial AS invoice_serial,
                i.kind AS invoice_kind,
                a.amount_applied,
                a.remaining_after,
                a.created_at
            FROM payment_allocations a
            JOIN ledger_transactions p ON p.transaction_id = a.payment_id
            JOIN ledger_transactions i ON i.transaction_id = a.invoice_id
            WHERE a.payment_id = $1
            ORDER BY a.allocation_id
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Verifies the pool can serve a query
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

/// Locks an account row for the rest of the transaction
pub async fn tx_lock_account(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
) -> Result<Option<AccountRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM accounts WHERE account_id = $1 FOR UPDATE",
        ACCOUNT_COLUMNS
    );
    let row = sqlx::query_as::<_, AccountRow>(&sql)
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row)
}

/// Locks the company's cash-in-hand row, if it exists
pub async fn tx_lock_cash_in_hand(
    tx: &mut Transaction<'_, Postgres>,
    company_code: &str,
    name: &str,
) -> Result<Option<AccountRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM accounts WHERE company_code = $1 AND kind = 'cash' AND name = $2 FOR UPDATE",
        ACCOUNT_COLUMNS
    );
    let row = sqlx::query_as::<_, AccountRow>(&sql)
        .bind(company_code)
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row)
}

/// Inserts an account; returns false when the cash-in-hand index rejected it
pub async fn tx_insert_account(
    tx: &mut Transaction<'_, Postgres>,
    account: NewAccount<'_>,
) -> Result<bool, DatabaseError> {
    let inserted = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO accounts (
            account_id, company_code, kind, name, address, region, contact,
            opening_balance, current_balance, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9, $9)
        ON CONFLICT (company_code) WHERE kind = 'cash' AND name = 'cashInHand' DO NOTHING
        RETURNING account_id
        "#,
    )
    .bind(account.account_id)
    .bind(account.company_code)
    .bind(account.kind)
    .bind(account.name)
    .bind(account.address)
    .bind(account.region)
    .bind(account.contact)
    .bind(account.opening_balance)
    .bind(account.created_at)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(inserted.is_some())
}

pub async fn tx_update_metadata(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    name: &str,
    address: Option<&str>,
    region: Option<&str>,
    contact: Option<&str>,
    updated_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE accounts
        SET name = $2, address = $3, region = $4, contact = $5, updated_at = $6
        WHERE account_id = $1
        "#,
    )
    .bind(account_id)
    .bind(name)
    .bind(address)
    .bind(region)
    .bind(contact)
    .bind(updated_at)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Account", account_id));
    }
    Ok(())
}

pub async fn tx_update_balances(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    update: BalanceUpdate,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE accounts
        SET current_balance = $2,
            sale_total = $3,
            purchase_total = $4,
            deposited_sale_total = $5,
            deposited_purchase_total = $6,
            sale_return_total = $7,
            purchase_return_total = $8,
            updated_at = $9
        WHERE account_id = $1
        "#,
    )
    .bind(account_id)
    .bind(update.current_balance)
    .bind(update.sale_total)
    .bind(update.purchase_total)
    .bind(update.deposited_sale_total)
    .bind(update.deposited_purchase_total)
    .bind(update.sale_return_total)
    .bind(update.purchase_return_total)
    .bind(update.updated_at)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Account", account_id));
    }
    Ok(())
}

pub async fn tx_delete_account(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
) -> Result<(), DatabaseError> {
    let result = sqlx::query("DELETE FROM accounts WHERE account_id = $1")
        .bind(account_id)
        .execute(&mut **tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Account", account_id));
    }
    Ok(())
}

/// Counts log rows owned by or settled through the account
pub async fn tx_count_references(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
) -> Result<i64, DatabaseError> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM ledger_transactions
        WHERE account_id = $1 OR counterpart_account_id = $1
        "#,
    )
    .bind(account_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count)
}

/// Appends a log row; `None` means the serial is already taken
///
/// `ON CONFLICT DO NOTHING` keeps a collision from aborting the surrounding
/// transaction, so the caller can retry with a fresh serial.
pub async fn tx_insert_transaction(
    tx: &mut Transaction<'_, Postgres>,
    row: NewTransactionRow<'_>,
) -> Result<Option<TransactionRow>, DatabaseError> {
    let sql = format!(
        r#"
        INSERT INTO ledger_transactions (
            serial, account_id, company_code, origin_id, kind,
            total_amount, deposited_amount, remaining_amount, balance_change,
            original_serial, counterpart_account_id, linked_serial, note,
            entry_date, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT (serial) DO NOTHING
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    );
    let inserted = sqlx::query_as::<_, TransactionRow>(&sql)
        .bind(row.serial)
        .bind(row.account_id)
        .bind(row.company_code)
        .bind(row.origin_id)
        .bind(row.kind)
        .bind(row.total_amount)
        .bind(row.deposited_amount)
        .bind(row.remaining_amount)
        .bind(row.balance_change)
        .bind(row.original_serial)
        .bind(row.counterpart_account_id)
        .bind(row.linked_serial)
        .bind(row.note)
        .bind(row.entry_date)
        .bind(row.created_at)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(inserted)
}

pub async fn tx_lock_transaction(
    tx: &mut Transaction<'_, Postgres>,
    company_code: &str,
    serial: &str,
) -> Result<Option<TransactionRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM ledger_transactions WHERE company_code = $1 AND serial = $2 FOR UPDATE",
        TRANSACTION_COLUMNS
    );
    let row = sqlx::query_as::<_, TransactionRow>(&sql)
        .bind(company_code)
        .bind(serial)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row)
}

/// Locks the account's invoices that still have something remaining
pub async fn tx_lock_open_invoices(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
) -> Result<Vec<TransactionRow>, DatabaseError> {
    let sql = format!(
        r#"
        SELECT {}
        FROM ledger_transactions
        WHERE account_id = $1
          AND kind IN ('sale', 'purchase')
          AND remaining_amount > 0
        ORDER BY entry_date ASC, created_at ASC, transaction_id ASC
        FOR UPDATE
        "#,
        TRANSACTION_COLUMNS
    );
    let rows = sqlx::query_as::<_, TransactionRow>(&sql)
        .bind(account_id)
        .fetch_all(&mut **tx)
        .await?;
    Ok(rows)
}

pub async fn tx_update_settlement(
    tx: &mut Transaction<'_, Postgres>,
    transaction_id: i64,
    deposited_amount: Decimal,
    remaining_amount: Decimal,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE ledger_transactions
        SET deposited_amount = $2, remaining_amount = $3
        WHERE transaction_id = $1 AND kind IN ('sale', 'purchase')
        "#,
    )
    .bind(transaction_id)
    .bind(deposited_amount)
    .bind(remaining_amount)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Invoice", transaction_id));
    }
    Ok(())
}

pub async fn tx_returned_against(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    original_serial: &str,
) -> Result<Decimal, DatabaseError> {
    let sum = sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(deposited_amount), 0)
        FROM ledger_transactions
        WHERE account_id = $1 AND kind = 'return' AND original_serial = $2
        "#,
    )
    .bind(account_id)
    .bind(original_serial)
    .fetch_one(&mut **tx)
    .await?;
    Ok(sum)
}

pub async fn tx_insert_allocation(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: i64,
    invoice_id: i64,
    amount_applied: Decimal,
    remaining_after: Decimal,
    created_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payment_allocations (payment_id, invoice_id, amount_applied, remaining_after, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(payment_id)
    .bind(invoice_id)
    .bind(amount_applied)
    .bind(remaining_after)
    .bind(created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
