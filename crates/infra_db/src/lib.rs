//! Infrastructure Database Layer
//!
//! PostgreSQL storage for the retail ledger using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: [`repositories`] owns the SQL
//! and row types, [`adapters`] maps them onto the ledger domain's
//! `LedgerStore` / `LedgerUnit` ports. The schema lives in
//! `migrations/` at the workspace root and is applied by [`run_migrations`].
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/retail_ledger")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresLedgerStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod migrate;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, DatabaseConfig};
pub use error::DatabaseError;
pub use migrate::{run_migrations, LEDGER_SCHEMA};
pub use adapters::PostgresLedgerStore;
