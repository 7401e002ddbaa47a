//! Pre-built Test Fixtures
//!
//! Provides ready-to-use tenants, dates and amounts, plus a [`LedgerHarness`]
//! that wires the account store, transaction ledger and engine over one store.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{AccountId, Actor, ActorRole, TenantId};
use domain_ledger::{
    AccountStore, InMemoryLedgerStore, LedgerStore, ReconciliationEngine, TransactionLedger,
};

static ACME: Lazy<TenantId> = Lazy::new(|| tenant("ACME01"));
static GLOBEX: Lazy<TenantId> = Lazy::new(|| tenant("GLOBEX"));

fn tenant(code: &str) -> TenantId {
    match TenantId::new(code) {
        Ok(tenant) => tenant,
        Err(e) => panic!("fixture tenant '{}' rejected: {}", code, e),
    }
}

/// Fixture for tenants and actors
pub struct TenantFixtures;

impl TenantFixtures {
    /// The tenant most tests run under
    pub fn acme() -> TenantId {
        ACME.clone()
    }

    /// A second tenant for isolation tests
    pub fn globex() -> TenantId {
        GLOBEX.clone()
    }

    /// An employee acting for ACME
    pub fn acme_employee() -> Actor {
        Actor::new(Self::acme(), "employee-1", ActorRole::Employee)
    }

    /// An admin acting for ACME
    pub fn acme_admin() -> Actor {
        Actor::new(Self::acme(), "admin-1", ActorRole::Admin)
    }
}

/// Fixture for amounts used throughout the scenarios
pub struct AmountFixtures;

impl AmountFixtures {
    pub fn invoice_total() -> Decimal {
        dec!(1000.00)
    }

    pub fn partial_deposit() -> Decimal {
        dec!(300.00)
    }

    pub fn opening_balance() -> Decimal {
        dec!(500.00)
    }

    /// Smallest representable amount
    pub fn epsilon() -> Decimal {
        dec!(0.0001)
    }
}

/// Fixture for event dates
pub struct DateFixtures;

impl DateFixtures {
    /// An ordinary business day
    pub fn business_day() -> NaiveDate {
        Self::ymd(2026, 3, 2)
    }

    /// The day before [`DateFixtures::business_day`]
    pub fn previous_day() -> NaiveDate {
        Self::ymd(2026, 3, 1)
    }

    /// Last day of the quarter
    pub fn quarter_end() -> NaiveDate {
        Self::ymd(2026, 3, 31)
    }

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        match NaiveDate::from_ymd_opt(year, month, day) {
            Some(date) => date,
            None => panic!("invalid fixture date {}-{}-{}", year, month, day),
        }
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    /// An account id that no store knows about
    pub fn unknown_account() -> AccountId {
        AccountId::new_v7()
    }
}

/// The three ledger services over one shared store
#[derive(Clone)]
pub struct LedgerHarness {
    pub store: Arc<dyn LedgerStore>,
    pub accounts: AccountStore,
    pub ledger: TransactionLedger,
    pub engine: ReconciliationEngine,
}

impl LedgerHarness {
    /// Wires the services over an empty in-memory store
    pub fn in_memory() -> Self {
        Self::over(Arc::new(InMemoryLedgerStore::new()))
    }

    /// Wires the services over the given store
    pub fn over(store: Arc<dyn LedgerStore>) -> Self {
        let ledger = TransactionLedger::new(store.clone());
        Self {
            accounts: AccountStore::new(store.clone()),
            engine: ReconciliationEngine::with_ledger(store.clone(), ledger.clone()),
            ledger,
            store,
        }
    }
}
