// crates/fanout-bus-broker/src/transport/http.rs
// ============================================================================
// Module: Fanout Bus HTTP Transport
// Description: HTTP-backed transport for callable and sinkable hops.
// Purpose: POST events to endpoints and read transformed replies.
// Dependencies: fanout-bus-core, reqwest
// ============================================================================

//! ## Overview
//! [`HttpTransport`] POSTs the event payload with its forwarded headers to the
//! hop target. Non-success status codes fail closed.
//! Invariants:
//! - Redirects are rejected.
//! - Reply bodies are capped at the configured limit while streaming; an
//!   oversized reply fails on the chunk that crosses the limit.
//! - Only forwarded headers from the reply are carried into the next event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use fanout_bus_core::Event;
use reqwest::Client;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;

use crate::receiver::DEFAULT_MAX_BODY_BYTES;
use crate::receiver::is_forwarded_header;
use crate::transport::HopError;
use crate::transport::HopTarget;
use crate::transport::HopTransport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Connect timeout applied to every hop; the fan-out deadline bounds the rest.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// HTTP-backed hop transport.
///
/// # Invariants
/// - Redirects are rejected.
/// - Replies exceeding `max_reply_bytes` are rejected.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client shared by all hops.
    client: Client,
    /// Maximum accepted reply body size.
    max_reply_bytes: usize,
}

impl HttpTransport {
    /// Builds an HTTP transport with a default client.
    ///
    /// # Errors
    ///
    /// Returns [`HopError::Request`] when the HTTP client cannot be constructed.
    pub fn new() -> Result<Self, HopError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| HopError::Request(err.to_string()))?;
        Ok(Self::with_client(client))
    }

    /// Creates an HTTP transport with a preconfigured client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self {
            client,
            max_reply_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Returns the transport with a different reply size limit.
    #[must_use]
    pub const fn with_max_reply_bytes(mut self, max_reply_bytes: usize) -> Self {
        self.max_reply_bytes = max_reply_bytes;
        self
    }
}

#[async_trait]
impl HopTransport for HttpTransport {
    async fn deliver(&self, target: &HopTarget, event: &Event) -> Result<Option<Event>, HopError> {
        let headers = to_header_map(event)?;
        let mut response = self
            .client
            .post(target.url().clone())
            .headers(headers)
            .body(event.payload().clone())
            .send()
            .await
            .map_err(|err| HopError::Request(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(HopError::Status(status.as_u16()));
        }
        if let Some(length) = response.content_length()
            && usize::try_from(length).map_or(true, |length| length > self.max_reply_bytes)
        {
            return Err(HopError::ReplyTooLarge {
                max_bytes: self.max_reply_bytes,
            });
        }
        let reply_headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| is_forwarded_header(name.as_str()))
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let mut body = BytesMut::new();
        while let Some(chunk) =
            response.chunk().await.map_err(|err| HopError::Request(err.to_string()))?
        {
            if body.len().saturating_add(chunk.len()) > self.max_reply_bytes {
                return Err(HopError::ReplyTooLarge {
                    max_bytes: self.max_reply_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }
        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some(Event::from_parts(reply_headers, body.freeze())))
    }
}

/// Converts event headers into wire headers.
fn to_header_map(event: &Event) -> Result<HeaderMap, HopError> {
    let mut headers = HeaderMap::new();
    for (name, value) in event.headers() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HopError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| HopError::InvalidHeader(name.clone()))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}
