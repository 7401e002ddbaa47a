//! Domain Adapters
//!
//! Adapter implementations for the ledger domain's ports, connecting them to
//! the PostgreSQL repository layer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerStore;
//! use domain_ledger::LedgerStore;
//!
//! let store = PostgresLedgerStore::new(pool);
//! let account = store.find_account(account_id).await?;
//! ```

pub mod ledger;

pub use ledger::{PgLedgerUnit, PostgresLedgerStore};
