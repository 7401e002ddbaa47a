//! Ledger Domain - Balance propagation for a multi-tenant retail backend
//!
//! This crate keeps three things mutually consistent as sales, purchases,
//! payments and returns are recorded:
//!
//! - the running balance of a ledger account (customer / supplier),
//! - the balance of a subsidiary account (bank / cash),
//! - the append-only transaction log that explains both.
//!
//! # Invariants
//!
//! - **Balance**: `current_balance == opening_balance + Σ balance_change` for every account
//! - **Invoice bounds**: for every invoice, `0 ≤ remaining ≤ total` and `deposited + remaining == total`
//! - **Allocation**: a payment's allocations sum to the payment amount and never drive an
//!   invoice's remaining amount below zero
//!
//! The [`ReconciliationEngine`] is the only component that mutates balances.
//! Every engine operation runs inside one [`LedgerUnit`], which adapters map
//! onto a database transaction with row locks (or an exclusive in-memory unit).
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{AccountStore, ReconciliationEngine, RecordSale};
//!
//! let account = accounts.create_account(&tenant, CreateAccount::customer("Ravi Traders")).await?;
//! let posted = engine
//!     .record_sale(&tenant, RecordSale::new(account.id, dec!(1000), dec!(300)))
//!     .await?;
//! assert_eq!(posted.transaction.remaining_amount, dec!(700));
//! ```

pub mod account;
pub mod transaction;
pub mod convention;
pub mod allocation;
pub mod serial;
pub mod commands;
pub mod ports;
pub mod store;
pub mod journal;
pub mod engine;
pub mod error;

pub use account::{
    Account, AccountKind, AccountMetadataUpdate, AccountQuery, CreateAccount, CASH_IN_HAND,
};
pub use transaction::{
    AllocationRecord, AppliedAllocation, NewTransaction, Page, Transaction, TransactionDraft,
    TransactionKind, TransactionMeta,
};
pub use commands::{RecordPayment, RecordPurchase, RecordReturn, RecordSale};
pub use ports::{LedgerStore, LedgerUnit, ReconciliationSnapshot};
pub use serial::{SerialGenerator, TimestampSerials};
pub use store::AccountStore;
pub use journal::TransactionLedger;
pub use engine::{PaymentPosted, Posted, ReconciliationEngine, ReconciliationReport, SettlementLeg};
pub use error::LedgerError;
pub use ports::memory::InMemoryLedgerStore;
