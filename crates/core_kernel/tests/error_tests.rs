//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::{AmountError, PortError};

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid input");

    match error {
        CoreError::Validation(msg) => assert_eq!(msg, "Invalid input"),
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_core_error_from_amount_error() {
    let core_error: CoreError = AmountError::Overflow.into();
    assert!(matches!(core_error, CoreError::Amount(AmountError::Overflow)));
    assert!(core_error.to_string().contains("Overflow"));
}

#[test]
fn test_core_error_from_uuid_error() {
    let uuid_error = uuid::Uuid::parse_str("nope").unwrap_err();
    let core_error: CoreError = uuid_error.into();
    assert!(matches!(core_error, CoreError::Identifier(_)));
}

#[test]
fn test_port_error_validation_field() {
    let error = PortError::validation_field("missing", "member_plan_id");
    match error {
        PortError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("member_plan_id")),
        _ => panic!("Expected Validation error"),
    }
}
