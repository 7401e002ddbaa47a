//! Schema installation
//!
//! The schema ships as a single idempotent SQL script embedded at compile
//! time, so the service binary and the integration tests install exactly the
//! same tables.

use sqlx::PgPool;
use tracing::info;

use crate::error::DatabaseError;

/// The ledger schema (accounts, transaction log, payment allocations)
pub const LEDGER_SCHEMA: &str = include_str!("../../../migrations/20260101_000001_ledger_schema.sql");

/// Creates any missing tables and indexes
///
/// Every statement in the script is `IF NOT EXISTS`, so running this against
/// an already migrated database is a no-op.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    info!("Applying ledger schema");

    sqlx::raw_sql(LEDGER_SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

    info!("Ledger schema up to date");
    Ok(())
}
