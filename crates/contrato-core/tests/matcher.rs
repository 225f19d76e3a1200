// contrato-core/tests/matcher.rs
// ============================================================================
// Module: Matcher Tests
// Description: Tests for partial criteria matching and matcher composition.
// ============================================================================
//! ## Overview
//! Criteria match by partial deep equality; matcher payloads compose nested
//! matchers with `and` / `or`.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use contrato_core::Criteria;
use contrato_core::Matcher;
use contrato_core::MatcherError;
use contrato_core::MatcherOperation;
use contrato_core::matcher::contains_partial;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Criteria
// ============================================================================

/// Tests partial deep equality.
#[test]
fn test_contains_partial() {
    let actual = json!({"slug": "debian", "data": {"arch": "armv7hf", "libc": "glibc"}, "tags": [1, 2]});
    assert!(contains_partial(&actual, &json!({"data": {"arch": "armv7hf"}})));
    assert!(contains_partial(&actual, &json!({"tags": [1, 2]})));
    assert!(!contains_partial(&actual, &json!({"tags": [1]})));
    assert!(!contains_partial(&actual, &json!({"data": {"arch": "i386"}})));
    assert!(!contains_partial(&actual, &json!({"missing": null})));
}

/// Tests criteria against payload maps.
#[test]
fn test_criteria_matches() {
    let criteria = Criteria::from_value(&json!({"type": "sw.os", "slug": "debian"})).unwrap();
    assert_eq!(criteria.contract_type(), Some("sw.os"));
    let payload = json!({"type": "sw.os", "slug": "debian", "version": "9"});
    assert!(criteria.matches(payload.as_object().unwrap()));
    assert!(matches!(Criteria::from_value(&json!("sw.os")), Err(MatcherError::InvalidCriteria(_))));
}

// ============================================================================
// SECTION: Composition
// ============================================================================

/// Tests nested matcher payloads.
#[test]
fn test_nested_matchers() {
    let payload = json!({
        "type": "meta.matcher",
        "operation": "or",
        "data": [
            {"type": "meta.matcher", "operation": "and", "data": [{"type": "sw.os"}, {"slug": "debian"}]},
            {"type": "arch.sw"}
        ]
    });
    let matcher = Matcher::from_payload(payload.as_object().unwrap()).unwrap();
    assert_eq!(matcher.type_hint(), None);
    let check = |value: Value| matcher.matches(value.as_object().unwrap());
    assert!(check(json!({"type": "sw.os", "slug": "debian"})));
    assert!(!check(json!({"type": "sw.os", "slug": "fedora"})));
    assert!(check(json!({"type": "arch.sw", "slug": "i386"})));
}

/// Tests operation parsing.
#[test]
fn test_operations() {
    assert_eq!("and".parse::<MatcherOperation>().unwrap(), MatcherOperation::And);
    assert_eq!(MatcherOperation::Or.to_string(), "or");
    let payload = json!({"type": "meta.matcher", "operation": "xor", "data": []});
    assert_eq!(
        Matcher::from_payload(payload.as_object().unwrap()),
        Err(MatcherError::UnknownOperation("xor".to_string()))
    );
    let single = json!({"type": "meta.matcher", "data": {"type": "sw.os"}});
    assert_eq!(Matcher::from_payload(single.as_object().unwrap()).unwrap().type_hint(), Some("sw.os"));
}
