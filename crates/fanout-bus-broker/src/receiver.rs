// crates/fanout-bus-broker/src/receiver.rs
// ============================================================================
// Module: Fanout Bus Message Receiver
// Description: Validation and tracking of inbound events before fan-out.
// Purpose: Turn transport requests into events or reject them.
// Dependencies: fanout-bus-core, reqwest, thiserror
// ============================================================================

//! ## Overview
//! A [`MessageReceiver`] sits between the ingress transport and the fan-out
//! engine. It validates an [`InboundRequest`] and hands accepted events to a
//! tracking callback; the fan-out handler only dispatches events it can
//! retrieve from that callback.
//! Invariants:
//! - Only forwarded headers (event and tracing metadata) survive into the event.
//! - Rejected requests never reach a subscription.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;
use fanout_bus_core::ChannelReference;
use fanout_bus_core::Event;
use reqwest::header::HeaderMap;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum inbound body size in bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Header names forwarded verbatim between hops.
const FORWARDED_HEADERS: &[&str] = &[
    "content-type",
    "x-request-id",
    "x-ot-span-context",
    "traceparent",
    "tracestate",
];

/// Header name prefixes forwarded verbatim between hops.
const FORWARDED_PREFIXES: &[&str] = &["ce-", "x-b3-"];

/// Returns true when a header carries event or tracing metadata.
#[must_use]
pub fn is_forwarded_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    FORWARDED_HEADERS.contains(&name.as_str())
        || FORWARDED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

// ============================================================================
// SECTION: Inbound Request
// ============================================================================

/// Transport-neutral inbound delivery addressed to one channel.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    /// Request host used to resolve the destination channel.
    pub host: String,
    /// Raw request headers.
    pub headers: HeaderMap,
    /// Raw request body.
    pub body: Bytes,
}

impl InboundRequest {
    /// Creates an inbound request.
    #[must_use]
    pub fn new(host: impl Into<String>, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            host: host.into(),
            headers,
            body: body.into(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reasons a receiver refuses an inbound request.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Error)]
pub enum ReceiverError {
    /// Body exceeds the configured limit.
    #[error("event body too large (max {max_bytes}, got {actual_bytes})")]
    TooLarge {
        /// Configured maximum.
        max_bytes: usize,
        /// Observed body size.
        actual_bytes: usize,
    },
    /// A forwarded header value is not valid UTF-8.
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
    /// Rejected by receiver policy.
    #[error("event rejected: {0}")]
    Rejected(String),
}

// ============================================================================
// SECTION: Receiver Trait
// ============================================================================

/// Validates inbound requests and tracks accepted events.
pub trait MessageReceiver: Send + Sync {
    /// Validates `request` for `channel`, passing accepted events to `track`.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError`] when the request is refused.
    fn receive(
        &self,
        channel: &ChannelReference,
        request: InboundRequest,
        track: &mut dyn FnMut(Event),
    ) -> Result<(), ReceiverError>;
}

// ============================================================================
// SECTION: Validating Receiver
// ============================================================================

/// Default receiver enforcing a body limit and header forwarding rules.
#[derive(Debug, Clone, Copy)]
pub struct ValidatingReceiver {
    /// Maximum accepted body size in bytes.
    max_body_bytes: usize,
}

impl ValidatingReceiver {
    /// Creates a receiver with the given body limit.
    #[must_use]
    pub const fn new(max_body_bytes: usize) -> Self {
        Self {
            max_body_bytes,
        }
    }
}

impl Default for ValidatingReceiver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_BYTES)
    }
}

impl MessageReceiver for ValidatingReceiver {
    fn receive(
        &self,
        _channel: &ChannelReference,
        request: InboundRequest,
        track: &mut dyn FnMut(Event),
    ) -> Result<(), ReceiverError> {
        if request.body.len() > self.max_body_bytes {
            return Err(ReceiverError::TooLarge {
                max_bytes: self.max_body_bytes,
                actual_bytes: request.body.len(),
            });
        }
        let mut headers = Vec::new();
        for (name, value) in &request.headers {
            if !is_forwarded_header(name.as_str()) {
                continue;
            }
            let value = value
                .to_str()
                .map_err(|_| ReceiverError::InvalidHeader(name.as_str().to_string()))?;
            headers.push((name.as_str().to_string(), value.to_string()));
        }
        track(Event::from_parts(headers, request.body));
        Ok(())
    }
}

// ============================================================================
// SECTION: Callback Receiver
// ============================================================================

/// Receiver delegating to a user-supplied function.
#[derive(Clone)]
pub struct CallbackReceiver {
    /// Handler invoked for each inbound request.
    handler: Arc<ReceiverHandler>,
}

/// Callback handler signature used by the receiver.
type ReceiverHandler =
    dyn Fn(&ChannelReference, InboundRequest, &mut dyn FnMut(Event)) -> Result<(), ReceiverError>
    + Send
    + Sync;

impl CallbackReceiver {
    /// Creates a callback receiver from a handler function.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ChannelReference, InboundRequest, &mut dyn FnMut(Event)) -> Result<(), ReceiverError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl MessageReceiver for CallbackReceiver {
    fn receive(
        &self,
        channel: &ChannelReference,
        request: InboundRequest,
        track: &mut dyn FnMut(Event),
    ) -> Result<(), ReceiverError> {
        (self.handler)(channel, request, track)
    }
}
