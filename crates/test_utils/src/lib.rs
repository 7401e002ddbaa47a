//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! retail ledger test suite.
//!
//! # Modules
//!
//! - `fixtures`: Tenants, dates, amounts and a wired-up [`LedgerHarness`]
//! - `builders`: Builder patterns for account and invoice requests
//! - `database`: PostgreSQL test containers with the ledger schema applied
//! - `assertions`: Balance and invoice assertions with readable failures
//! - `generators`: Property-based and fake data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
