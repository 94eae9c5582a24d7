// crates/fanout-bus-broker/src/transport/mod.rs
// ============================================================================
// Module: Fanout Bus Hop Transports
// Description: Transport trait and target resolution for outbound hops.
// Purpose: Deliver events to callable and sinkable endpoints.
// Dependencies: async-trait, fanout-bus-core, thiserror, url
// ============================================================================

//! ## Overview
//! A [`HopTransport`] performs one outbound delivery of an [`Event`] to a
//! resolved [`HopTarget`]. Success-range replies with a body become the next
//! event; success-range replies without a body yield `None`. Any other status
//! fails the hop. Transports never retry.
//! Invariants:
//! - Hop targets are absolute `http` or `https` URLs.
//! - A non-success status is always reported as [`HopError::Status`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use async_trait::async_trait;
use fanout_bus_core::Event;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Hop Errors
// ============================================================================

/// Errors emitted by hop transports.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HopError {
    /// The endpoint answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),
    /// The request could not be sent or the reply could not be read.
    #[error("request failed: {0}")]
    Request(String),
    /// An event header cannot be expressed on the wire.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// The reply body exceeds the transport limit.
    #[error("reply too large (max {max_bytes})")]
    ReplyTooLarge {
        /// Configured maximum reply size.
        max_bytes: usize,
    },
}

// ============================================================================
// SECTION: Hop Target
// ============================================================================

/// Resolved outbound address for a callable or sinkable hop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HopTarget {
    /// Absolute request URL.
    url: Url,
}

impl HopTarget {
    /// Resolves a configured target.
    ///
    /// Bare authorities (`host[:port]`) are delivered to `http://<authority>/`.
    /// Absolute URLs must use `http` or `https`.
    ///
    /// # Errors
    ///
    /// Returns an error message when the target cannot be resolved.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("target is empty".to_string());
        }
        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}/")
        };
        let url = Url::parse(&candidate).map_err(|err| format!("invalid target {raw}: {err}"))?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(format!("unsupported target scheme {scheme}: {raw}")),
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(format!("target has no host: {raw}"));
        }
        Ok(Self {
            url,
        })
    }

    /// Returns the request URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for HopTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}

// ============================================================================
// SECTION: Transport Trait
// ============================================================================

/// Delivers events to hop targets.
#[async_trait]
pub trait HopTransport: Send + Sync {
    /// Delivers `event` to `target`, returning the reply event if any.
    ///
    /// # Errors
    ///
    /// Returns [`HopError`] when delivery fails or the reply status is not a
    /// success.
    async fn deliver(&self, target: &HopTarget, event: &Event) -> Result<Option<Event>, HopError>;
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod callback;
pub mod http;

pub use callback::CallbackTransport;
pub use http::HttpTransport;
