use super::*;

#[test]
fn test_error_info_display_with_module() {
    let err = ErrorInfo::new(codes::NOT_FOUND, "service missing", "di::container");
    assert_eq!(err.to_string(), "[di::container] service missing (code -2)");
}

#[test]
fn test_error_info_display_without_module() {
    let err = ErrorInfo::new(codes::INTERNAL_ERROR, "boom", "");
    assert_eq!(err.to_string(), "boom (code -99)");
}

#[test]
fn test_error_info_details() {
    let err = ErrorInfo::new(codes::IO_ERROR, "write failed", "logger").with_details("disk full");
    assert_eq!(err.details.as_deref(), Some("disk full"));
    assert!(err.to_string().ends_with(": disk full"));
}

#[test]
fn test_registry_frozen_code() {
    assert_eq!(codes::REGISTRY_FROZEN, -11);
    let err = ErrorInfo::new(codes::REGISTRY_FROZEN, "frozen", "test");
    assert!(err.is_frozen());
    assert_eq!(codes::message(codes::REGISTRY_FROZEN), "Registry is frozen");
}

#[test]
fn test_make_error() {
    let result: Result<u32> = make_error(codes::INVALID_ARGUMENT, "bad input", "test");
    let err = result.unwrap_err();
    assert_eq!(err.code, codes::INVALID_ARGUMENT);
    assert_eq!(err.message, "bad input");
    assert_eq!(err.module, "test");
    assert!(err.details.is_none());
}

#[test]
fn test_unknown_code_message() {
    assert_eq!(codes::message(-12345), "Unknown error");
}

#[test]
fn test_error_info_equality() {
    let a = ErrorInfo::new(-1, "x", "m");
    let b = ErrorInfo::new(-1, "x", "m");
    let c = b.clone().with_details("d");
    assert_eq!(a, b);
    assert_ne!(a, c);
}
