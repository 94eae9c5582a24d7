// crates/fanout-bus-core/tests/channel_reference.rs
// ============================================================================
// Module: Channel Reference Tests
// Description: Tests for channel reference validation and host resolution.
// Purpose: Ensure channels resolve from hosts and reject malformed parts.
// ============================================================================

//! Channel reference validation and host resolution tests.

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
    reason = "Test-only assertions and helpers are permitted."
)]

use fanout_bus_core::ChannelReference;
use fanout_bus_core::ChannelReferenceError;

// ============================================================================
// SECTION: Construction
// ============================================================================

#[test]
fn new_accepts_simple_parts() {
    let channel = ChannelReference::new("default", "orders").expect("valid channel");
    assert_eq!(channel.namespace(), "default");
    assert_eq!(channel.name(), "orders");
    assert_eq!(channel.to_string(), "default/orders");
}

#[test]
fn new_rejects_empty_parts() {
    assert_eq!(
        ChannelReference::new("", "orders").unwrap_err(),
        ChannelReferenceError::Empty("namespace")
    );
    assert_eq!(
        ChannelReference::new("default", "").unwrap_err(),
        ChannelReferenceError::Empty("name")
    );
}

#[test]
fn new_rejects_dotted_parts() {
    let err = ChannelReference::new("default", "orders.v1").unwrap_err();
    assert!(matches!(err, ChannelReferenceError::InvalidCharacter { field: "name", .. }));
}

#[test]
fn new_rejects_overlong_parts() {
    let long = "a".repeat(254);
    let err = ChannelReference::new(long, "orders").unwrap_err();
    assert!(matches!(err, ChannelReferenceError::TooLong { field: "namespace", .. }));
}

#[test]
fn new_folds_parts_to_lowercase() {
    let channel = ChannelReference::new("Default", "Orders").unwrap();
    assert_eq!(channel.to_string(), "default/orders");
    assert_eq!(channel, ChannelReference::new("default", "orders").unwrap());
}

#[test]
fn mixed_case_channel_matches_its_host() {
    let configured = ChannelReference::new("default", "Orders").unwrap();
    assert_eq!(ChannelReference::from_host("Orders.default").unwrap(), configured);
    assert_eq!(ChannelReference::from_host("orders.default").unwrap(), configured);
}

#[test]
fn ordering_is_namespace_then_name() {
    let a = ChannelReference::new("alpha", "zeta").unwrap();
    let b = ChannelReference::new("beta", "alpha").unwrap();
    assert!(a < b);
}

// ============================================================================
// SECTION: Host Resolution
// ============================================================================

#[test]
fn from_host_uses_first_two_labels() {
    let channel = ChannelReference::from_host("channelname.channelnamespace").unwrap();
    assert_eq!(channel, ChannelReference::new("channelnamespace", "channelname").unwrap());
}

#[test]
fn from_host_ignores_port_and_suffix() {
    let channel =
        ChannelReference::from_host("orders.default.svc.cluster.local:8080").unwrap();
    assert_eq!(channel, ChannelReference::new("default", "orders").unwrap());
}

#[test]
fn from_host_is_case_insensitive() {
    let channel = ChannelReference::from_host("Orders.Default").unwrap();
    assert_eq!(channel.to_string(), "default/orders");
}

#[test]
fn from_host_rejects_single_label() {
    let err = ChannelReference::from_host("localhost:8080").unwrap_err();
    assert_eq!(err, ChannelReferenceError::InvalidHost("localhost:8080".to_string()));
}

#[test]
fn from_host_rejects_empty_labels() {
    assert!(ChannelReference::from_host(".default").is_err());
    assert!(ChannelReference::from_host("").is_err());
}
