//! Property-Based Test Generators
//!
//! Proptest strategies for amounts, account kinds and tenant codes, plus
//! `fake`-backed generators for realistic account metadata.

use fake::faker::address::en::CityName;
use fake::faker::company::en::CompanyName;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::TenantId;
use domain_ledger::{AccountKind, CreateAccount};

/// Strategy for positive amounts with two decimal places (0.01 to 10,000.00)
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for a `(total, deposited)` pair with `deposited <= total`
pub fn invoice_amounts_strategy() -> impl Strategy<Value = (Decimal, Decimal)> {
    (1i64..1_000_000i64)
        .prop_flat_map(|total| (Just(total), 0i64..=total))
        .prop_map(|(total, deposited)| (Decimal::new(total, 2), Decimal::new(deposited, 2)))
}

/// Strategy for amounts carrying up to four decimal places
pub fn precise_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000_000i64, 0u32..=4u32).prop_map(|(m, s)| Decimal::new(m, s))
}

/// Strategy for ledger account kinds
pub fn ledger_kind_strategy() -> impl Strategy<Value = AccountKind> {
    prop_oneof![Just(AccountKind::Customer), Just(AccountKind::Supplier)]
}

/// Strategy for any account kind
pub fn account_kind_strategy() -> impl Strategy<Value = AccountKind> {
    prop_oneof![
        Just(AccountKind::Customer),
        Just(AccountKind::Supplier),
        Just(AccountKind::Bank),
        Just(AccountKind::Cash),
    ]
}

/// Strategy for company codes
pub fn tenant_strategy() -> impl Strategy<Value = TenantId> {
    "[A-Z]{3,6}[0-9]{2}".prop_filter_map("blank company code", |code| TenantId::new(code).ok())
}

/// A customer or supplier request with fake name, city and phone number
pub fn fake_ledger_account(kind: AccountKind) -> CreateAccount {
    let name: String = CompanyName().fake();
    let city: String = CityName().fake();
    let phone: String = PhoneNumber().fake();

    let mut request = CreateAccount::new(kind, name);
    request.region = Some(city);
    request.contact = Some(phone);
    request
}
