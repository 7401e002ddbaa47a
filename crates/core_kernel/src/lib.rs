//! Core Kernel - Foundational types shared by every crate of the retail ledger
//!
//! This crate provides the fundamental building blocks used across all layers:
//! - Strongly-typed identifiers for accounts and transactions
//! - Tenancy types (company code, acting identity)
//! - Amount helpers with precise decimal arithmetic
//! - Port infrastructure for the hexagonal architecture

pub mod money;
pub mod identifiers;
pub mod tenancy;
pub mod ports;
pub mod error;

pub use money::{MoneyError, MAX_AMOUNT, MAX_BALANCE, MONEY_SCALE};
pub use identifiers::{AccountId, TransactionId};
pub use tenancy::{Actor, ActorRole, TenantId};
pub use ports::{
    AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, OperationMetadata, PortError,
};
pub use error::CoreError;
