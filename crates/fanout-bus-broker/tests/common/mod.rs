// crates/fanout-bus-broker/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for fanout-bus-broker tests.
// Purpose: Provide stub endpoints, request builders, and recording sinks.
// Dependencies: fanout-bus-broker, fanout-bus-core, tiny_http, tokio
// ============================================================================

//! ## Overview
//! Provides stub HTTP endpoints backed by `tiny_http`, inbound request
//! builders, a recording audit sink, and a latency-injecting transport.

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

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use fanout_bus_broker::FanoutAuditEvent;
use fanout_bus_broker::FanoutAuditSink;
use fanout_bus_broker::FanoutHandler;
use fanout_bus_broker::FanoutOptions;
use fanout_bus_broker::HopError;
use fanout_bus_broker::HopTarget;
use fanout_bus_broker::HopTransport;
use fanout_bus_broker::HttpTransport;
use fanout_bus_broker::InboundRequest;
use fanout_bus_broker::RouteAuditEvent;
use fanout_bus_broker::SwapAuditEvent;
use fanout_bus_core::ChannelConfig;
use fanout_bus_core::ChannelReference;
use fanout_bus_core::Event;
use fanout_bus_core::SubscriptionSpec;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Channel Helpers
// ============================================================================

/// Host that resolves to [`channel`].
pub const CHANNEL_HOST: &str = "channelname.channelnamespace";

/// Returns the channel used by most tests.
pub fn channel() -> ChannelReference {
    ChannelReference::new("channelnamespace", "channelname").expect("channel")
}

/// Returns a channel in the default namespace.
pub fn named_channel(name: &str) -> ChannelReference {
    ChannelReference::new("default", name).expect("channel")
}

/// Builds an inbound request for [`CHANNEL_HOST`].
pub fn request(body: &str) -> InboundRequest {
    request_for(CHANNEL_HOST, body)
}

/// Builds an inbound request for `host` with event metadata headers.
pub fn request_for(host: &str, body: &str) -> InboundRequest {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("ce-id", HeaderValue::from_static("event-1"));
    headers.insert("connection", HeaderValue::from_static("keep-alive"));
    InboundRequest::new(host, headers, body.to_string())
}

/// Builds a subscription from optional callable and sinkable authorities.
pub fn subscription(callable: Option<&str>, sinkable: Option<&str>) -> SubscriptionSpec {
    SubscriptionSpec::new(callable.map(ToString::to_string), sinkable.map(ToString::to_string))
}

/// Builds options around an HTTP transport with `timeout`.
pub fn http_options(timeout: Duration) -> FanoutOptions {
    FanoutOptions::builder()
        .transport(HttpTransport::new().expect("http transport"))
        .timeout(timeout)
        .build()
        .expect("options")
}

/// Builds a handler for [`channel`] with the given subscriptions.
pub fn handler(subscriptions: Vec<SubscriptionSpec>, options: &FanoutOptions) -> FanoutHandler {
    FanoutHandler::new(&ChannelConfig::new(channel(), subscriptions), options).expect("handler")
}

// ============================================================================
// SECTION: Stub Endpoint
// ============================================================================

/// Request observed by a stub endpoint.
#[derive(Debug, Clone)]
pub struct Recorded {
    /// Lowercased request headers.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Vec<u8>,
}

impl Recorded {
    /// Returns a header value by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// Returns the body as UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Reply produced by a stub endpoint.
#[derive(Debug, Clone)]
pub struct StubReply {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
    /// Extra response headers.
    pub headers: Vec<(String, String)>,
    /// Delay before responding.
    pub delay: Duration,
}

impl StubReply {
    /// Reply with a status and no body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            headers: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    /// Reply with a status and body.
    pub fn body(status: u16, body: &str) -> Self {
        Self {
            body: body.as_bytes().to_vec(),
            ..Self::status(status)
        }
    }

    /// Adds a response header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Delays the reply.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Handler signature for stub endpoints.
type StubHandler = dyn Fn(usize, &Recorded) -> StubReply + Send + Sync;

/// Local HTTP endpoint answering every request through a handler.
pub struct StubServer {
    /// Underlying server, shared with the accept thread.
    server: Arc<Server>,
    /// Bound address.
    addr: SocketAddr,
    /// Requests observed so far.
    requests: Arc<Mutex<Vec<Recorded>>>,
    /// Accept loop thread.
    accept: Option<JoinHandle<()>>,
}

impl StubServer {
    /// Starts a stub whose handler receives the zero-based call index.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(usize, &Recorded) -> StubReply + Send + Sync + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("http server"));
        let addr = server.server_addr().to_ip().expect("ip listener");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<StubHandler> = Arc::new(handler);
        let calls = Arc::new(AtomicUsize::new(0));
        let accept = {
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            std::thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let mut body = Vec::new();
                    let _ = request.as_reader().read_to_end(&mut body);
                    let headers = request
                        .headers()
                        .iter()
                        .map(|header| {
                            (
                                header.field.as_str().as_str().to_ascii_lowercase(),
                                header.value.as_str().to_string(),
                            )
                        })
                        .collect();
                    let recorded = Recorded {
                        headers,
                        body,
                    };
                    let index = calls.fetch_add(1, Ordering::SeqCst);
                    requests.lock().expect("requests lock").push(recorded.clone());
                    let handler = Arc::clone(&handler);
                    std::thread::spawn(move || {
                        let reply = handler(index, &recorded);
                        if !reply.delay.is_zero() {
                            std::thread::sleep(reply.delay);
                        }
                        let mut response =
                            Response::from_data(reply.body).with_status_code(reply.status);
                        for (name, value) in reply.headers {
                            response = response.with_header(
                                Header::from_bytes(name.as_bytes(), value.as_bytes())
                                    .expect("header"),
                            );
                        }
                        let _ = request.respond(response);
                    });
                }
            })
        };
        Self {
            server,
            addr,
            requests,
            accept: Some(accept),
        }
    }

    /// Starts a stub that always answers with `reply`.
    pub fn replying(reply: StubReply) -> Self {
        Self::start(move |_, _| reply.clone())
    }

    /// Starts a stub that succeeds on its first call only.
    pub fn succeed_once(failure_status: u16) -> Self {
        Self::start(move |index, _| {
            if index == 0 { StubReply::status(202) } else { StubReply::status(failure_status) }
        })
    }

    /// Returns the `host:port` authority of the stub.
    pub fn authority(&self) -> String {
        self.addr.to_string()
    }

    /// Returns the requests observed so far.
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Returns the number of requests observed so far.
    pub fn hits(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(accept) = self.accept.take() {
            let _ = accept.join();
        }
    }
}

// ============================================================================
// SECTION: Transports
// ============================================================================

/// Transport that waits before succeeding without a reply.
pub struct SlowTransport {
    /// Latency injected per hop.
    pub delay: Duration,
}

#[async_trait]
impl HopTransport for SlowTransport {
    async fn deliver(
        &self,
        _target: &HopTarget,
        _event: &Event,
    ) -> Result<Option<Event>, HopError> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }
}

/// Transport that panics for one host and waits before succeeding otherwise.
pub struct PanickingTransport {
    /// Host whose hop panics.
    pub panic_host: &'static str,
    /// Latency injected for every other hop.
    pub delay: Duration,
}

#[async_trait]
impl HopTransport for PanickingTransport {
    async fn deliver(
        &self,
        target: &HopTarget,
        _event: &Event,
    ) -> Result<Option<Event>, HopError> {
        assert_ne!(target.url().host_str(), Some(self.panic_host), "hop target crashed");
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink retaining every event for assertions.
#[derive(Default)]
pub struct RecordingAuditSink {
    /// Fan-out request events.
    pub fanout: Mutex<Vec<FanoutAuditEvent>>,
    /// Routing miss events.
    pub routes: Mutex<Vec<RouteAuditEvent>>,
    /// Configuration swap events.
    pub swaps: Mutex<Vec<SwapAuditEvent>>,
}

impl RecordingAuditSink {
    /// Returns the recorded fan-out events.
    pub fn fanout_events(&self) -> Vec<FanoutAuditEvent> {
        self.fanout.lock().expect("audit lock").clone()
    }

    /// Returns the recorded routing events.
    pub fn route_events(&self) -> Vec<RouteAuditEvent> {
        self.routes.lock().expect("audit lock").clone()
    }

    /// Returns the recorded swap events.
    pub fn swap_events(&self) -> Vec<SwapAuditEvent> {
        self.swaps.lock().expect("audit lock").clone()
    }
}

impl FanoutAuditSink for RecordingAuditSink {
    fn record_fanout(&self, event: &FanoutAuditEvent) {
        self.fanout.lock().expect("audit lock").push(event.clone());
    }

    fn record_route(&self, event: &RouteAuditEvent) {
        self.routes.lock().expect("audit lock").push(event.clone());
    }

    fn record_swap(&self, event: &SwapAuditEvent) {
        self.swaps.lock().expect("audit lock").push(event.clone());
    }
}
