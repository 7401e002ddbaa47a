//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::money::{self, MoneyError};
use core_kernel::TenantId;
use rust_decimal_macros::dec;

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid input");

    match error {
        CoreError::Validation(msg) => assert_eq!(msg, "Invalid input"),
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_core_error_not_found() {
    let error = CoreError::not_found("Account not found");

    match error {
        CoreError::NotFound(msg) => assert_eq!(msg, "Account not found"),
        _ => panic!("Expected NotFound error"),
    }
}

#[test]
fn test_core_error_from_money_error() {
    let money_error = money::positive("amount", dec!(-5)).unwrap_err();
    let core_error: CoreError = money_error.into();

    assert!(matches!(core_error, CoreError::Money(MoneyError::NotPositive { .. })));
}

#[test]
fn test_money_error_names_the_field() {
    let error = money::non_negative("deposited_amount", dec!(-1)).unwrap_err();
    assert!(error.to_string().contains("deposited_amount"));
}

#[test]
fn test_blank_tenant_is_a_validation_error() {
    let error = TenantId::new("").unwrap_err();
    assert!(format!("{}", error).contains("Validation error"));
}
