//! Repository implementations
//!
//! Repositories encapsulate SQL and the row types it returns. Queries are
//! built at runtime with `sqlx::query_as` and `bind`, and every statement
//! that must run inside a unit of work takes the open transaction explicitly.

pub mod ledger;

pub use ledger::LedgerRepository;
