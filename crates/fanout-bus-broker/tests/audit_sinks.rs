// crates/fanout-bus-broker/tests/audit_sinks.rs
// ============================================================================
// Module: Audit Sink Tests
// Description: JSON-line output of the file audit sink.
// Purpose: Ensure audit records are appended one object per line.
// Dependencies: fanout-bus-broker, serde_json, tempfile
// ============================================================================

//! File audit sink tests.

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

use fanout_bus_broker::FanoutAuditSink;
use fanout_bus_broker::FileAuditSink;
use fanout_bus_broker::RouteAuditEvent;
use fanout_bus_broker::SwapAuditEvent;
use fanout_bus_core::ChannelReference;
use fanout_bus_core::ConfigDiff;
use serde_json::Value;

#[test]
fn file_sink_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.log");
    let sink = FileAuditSink::new(&path).unwrap();
    let diff = ConfigDiff {
        added: vec![ChannelReference::new("default", "orders").unwrap()],
        ..ConfigDiff::default()
    };

    sink.record_route(&RouteAuditEvent::new("nowhere.default", "channel not found"));
    sink.record_swap(&SwapAuditEvent::installed(&diff));

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<Value> =
        contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], "route_miss");
    assert_eq!(lines[0]["host"], "nowhere.default");
    assert_eq!(lines[1]["event"], "config_swap");
    assert_eq!(lines[1]["outcome"], "installed");
    assert_eq!(lines[1]["added"][0], "default/orders");
}

#[test]
fn file_sink_appends_to_existing_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.log");
    std::fs::write(&path, "{\"event\":\"earlier\"}\n").unwrap();

    FileAuditSink::new(&path).unwrap().record_swap(&SwapAuditEvent::unchanged());

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.starts_with("{\"event\":\"earlier\"}"));
}
