// crates/fanout-bus-broker/tests/swappable.rs
// ============================================================================
// Module: Swappable Handler Tests
// Description: Install semantics and snapshot consistency under hot swaps.
// Purpose: Ensure requests never observe a mixture of two routing tables.
// Dependencies: fanout-bus-broker, fanout-bus-core, tokio
// ============================================================================

//! ## Overview
//! Races configuration installs against in-flight requests and checks every
//! request was served by exactly one complete routing table.

#![allow(dead_code, reason = "Common module may have unused helpers.")]
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

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use common::RecordingAuditSink;
use common::named_channel;
use common::request_for;
use common::subscription;
use fanout_bus_broker::BrokerError;
use fanout_bus_broker::CallbackTransport;
use fanout_bus_broker::FanoutOptions;
use fanout_bus_broker::InboundRequest;
use fanout_bus_broker::InstallOutcome;
use fanout_bus_broker::MultiChannelFanoutHandler;
use fanout_bus_broker::RequestError;
use fanout_bus_broker::RouteError;
use fanout_bus_broker::SwappableHandler;
use fanout_bus_core::ChannelConfig;
use fanout_bus_core::FanoutConfig;
use fanout_bus_core::SubscriptionSpec;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn orders(subscriptions: Vec<SubscriptionSpec>) -> FanoutConfig {
    FanoutConfig::new(vec![ChannelConfig::new(named_channel("orders"), subscriptions)]).unwrap()
}

fn config_a() -> FanoutConfig {
    orders(vec![subscription(None, Some("a1.default")), subscription(None, Some("a2.default"))])
}

fn config_b() -> FanoutConfig {
    orders(vec![subscription(None, Some("b1.default")), subscription(None, Some("b2.default"))])
}

fn options(audit: Arc<RecordingAuditSink>) -> FanoutOptions {
    FanoutOptions::builder()
        .transport(CallbackTransport::new(|_, _| Ok(None)))
        .audit(audit)
        .build()
        .unwrap()
}

fn tagged_request(id: usize) -> InboundRequest {
    let mut headers = HeaderMap::new();
    headers.insert("x-request-id", HeaderValue::from_str(&id.to_string()).unwrap());
    InboundRequest::new("orders.default", headers, "{}")
}

// ============================================================================
// SECTION: Install
// ============================================================================

#[tokio::test]
async fn empty_handler_routes_nothing() {
    let swappable = SwappableHandler::empty(options(Arc::new(RecordingAuditSink::default())));

    let err = swappable.handle(request_for("orders.default", "{}")).await.unwrap_err();

    assert!(matches!(err, RequestError::Route(RouteError::NotFound(_))));
    assert!(swappable.get_config().config().is_empty());
}

#[tokio::test]
async fn install_reports_diff_then_unchanged() {
    let audit = Arc::new(RecordingAuditSink::default());
    let swappable = SwappableHandler::empty(options(Arc::clone(&audit)));

    let first = swappable.install(config_a()).unwrap();
    let reordered =
        orders(vec![subscription(None, Some("a2.default")), subscription(None, Some("a1.default"))]);
    let second = swappable.install(reordered).unwrap();

    match first {
        InstallOutcome::Installed(diff) => assert_eq!(diff.added, vec![named_channel("orders")]),
        InstallOutcome::Unchanged => panic!("expected install"),
    }
    assert_eq!(second, InstallOutcome::Unchanged);
    assert_eq!(swappable.get_config().config(), &config_a());
    swappable.handle(request_for("orders.default", "{}")).await.unwrap();
    let outcomes: Vec<&str> = audit.swap_events().iter().map(|event| event.outcome).collect();
    assert_eq!(outcomes, vec!["installed", "unchanged"]);
}

#[test]
fn rejected_install_keeps_active_table() {
    let audit = Arc::new(RecordingAuditSink::default());
    let swappable = SwappableHandler::empty(options(Arc::clone(&audit)));
    swappable.install(config_a()).unwrap();
    let before = swappable.get_config();

    let err = swappable.install(orders(vec![subscription(Some("gopher://x"), None)])).unwrap_err();

    assert!(matches!(err, BrokerError::ConfigInvalid(_)));
    assert!(Arc::ptr_eq(&before, &swappable.get_config()));
    let swaps = audit.swap_events();
    assert_eq!(swaps.last().unwrap().outcome, "rejected");
    assert!(swaps.last().unwrap().error.is_some());
}

#[test]
fn set_config_replaces_snapshot() {
    let options = options(Arc::new(RecordingAuditSink::default()));
    let swappable = SwappableHandler::empty(options.clone());
    let held = swappable.get_config();

    swappable.set_config(MultiChannelFanoutHandler::new(config_b(), options).unwrap());

    assert!(held.config().is_empty());
    assert_eq!(swappable.get_config().config(), &config_b());
}

// ============================================================================
// SECTION: Snapshot Consistency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_installs_never_mix_tables() {
    let seen: Arc<Mutex<BTreeMap<String, Vec<String>>>> = Arc::new(Mutex::new(BTreeMap::new()));
    let recorder = Arc::clone(&seen);
    let options = FanoutOptions::builder()
        .transport(CallbackTransport::new(move |target, event| {
            let id = event.header("x-request-id").unwrap_or_default().to_string();
            let host = target.url().host_str().unwrap_or_default().to_string();
            recorder.lock().unwrap().entry(id).or_default().push(host);
            Ok(None)
        }))
        .build()
        .unwrap();
    let swappable = Arc::new(SwappableHandler::new(
        MultiChannelFanoutHandler::new(config_a(), options).unwrap(),
    ));
    let done = Arc::new(AtomicBool::new(false));

    let installer = {
        let swappable = Arc::clone(&swappable);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            let mut use_b = true;
            while !done.load(Ordering::SeqCst) {
                let next = if use_b { config_b() } else { config_a() };
                swappable.install(next).unwrap();
                use_b = !use_b;
                tokio::task::yield_now().await;
            }
        })
    };

    let mut requests = Vec::new();
    for id in 0 .. 200 {
        let swappable = Arc::clone(&swappable);
        requests.push(tokio::spawn(async move { swappable.handle(tagged_request(id)).await }));
    }
    for request in requests {
        request.await.unwrap().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    installer.await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 200);
    for (id, hosts) in seen.iter() {
        let mut hosts = hosts.clone();
        hosts.sort();
        assert!(
            hosts == ["a1.default", "a2.default"] || hosts == ["b1.default", "b2.default"],
            "request {id} saw {hosts:?}"
        );
    }
}
