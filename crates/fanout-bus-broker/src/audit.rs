// crates/fanout-bus-broker/src/audit.rs
// ============================================================================
// Module: Fanout Bus Audit Logging
// Description: Structured audit events for fan-out, routing, and config swaps.
// Purpose: Emit JSON-line audit records without a global logger.
// Dependencies: fanout-bus-core, serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for the fan-out engine.
//! Events are serialized as one JSON object per line so deployments can route
//! them into their own logging pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use fanout_bus_core::ChannelReference;
use fanout_bus_core::ConfigDiff;
use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Per-subscription entry inside a fan-out audit event.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionAuditEntry {
    /// Position of the subscription in the channel configuration.
    pub index: usize,
    /// Callable target, if configured.
    pub callable: Option<String>,
    /// Sinkable target, if configured.
    pub sinkable: Option<String>,
    /// Outcome label.
    pub outcome: &'static str,
    /// Failure detail when the subscription did not succeed.
    pub detail: Option<String>,
}

/// Fan-out request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct FanoutAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Channel the request was addressed to.
    pub channel: String,
    /// Request outcome label (`ok` or `error`).
    pub outcome: &'static str,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Error message when the request failed.
    pub error: Option<String>,
    /// Wall-clock time spent handling the request.
    pub elapsed_ms: u128,
    /// Per-subscription outcomes.
    pub subscriptions: Vec<SubscriptionAuditEntry>,
}

/// Routing miss audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RouteAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Host the request was addressed to.
    pub host: String,
    /// Reason no channel was selected.
    pub reason: String,
}

/// Configuration swap audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SwapAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Swap outcome label (`installed`, `unchanged`, or `rejected`).
    pub outcome: &'static str,
    /// Channels added by the swap.
    pub added: Vec<String>,
    /// Channels removed by the swap.
    pub removed: Vec<String>,
    /// Channels whose subscriptions changed.
    pub changed: Vec<String>,
    /// Error message when the swap was rejected.
    pub error: Option<String>,
}

/// Inputs required to construct a fan-out audit event.
pub struct FanoutAuditEventParams {
    /// Channel the request was addressed to.
    pub channel: ChannelReference,
    /// Normalized error kind label when the request failed.
    pub error_kind: Option<&'static str>,
    /// Error message when the request failed.
    pub error: Option<String>,
    /// Time spent handling the request.
    pub elapsed: Duration,
    /// Per-subscription outcomes.
    pub subscriptions: Vec<SubscriptionAuditEntry>,
}

impl FanoutAuditEvent {
    /// Creates a new fan-out audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: FanoutAuditEventParams) -> Self {
        let outcome = if params.error_kind.is_some() { "error" } else { "ok" };
        Self {
            event: "fanout_request",
            timestamp_ms: timestamp_ms(),
            channel: params.channel.to_string(),
            outcome,
            error_kind: params.error_kind,
            error: params.error,
            elapsed_ms: params.elapsed.as_millis(),
            subscriptions: params.subscriptions,
        }
    }
}

impl RouteAuditEvent {
    /// Creates a new routing audit event with a consistent timestamp.
    #[must_use]
    pub fn new(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            event: "route_miss",
            timestamp_ms: timestamp_ms(),
            host: host.into(),
            reason: reason.into(),
        }
    }
}

impl SwapAuditEvent {
    /// Records an installed configuration.
    #[must_use]
    pub fn installed(diff: &ConfigDiff) -> Self {
        Self {
            event: "config_swap",
            timestamp_ms: timestamp_ms(),
            outcome: "installed",
            added: labels(&diff.added),
            removed: labels(&diff.removed),
            changed: labels(&diff.changed),
            error: None,
        }
    }

    /// Records a candidate identical to the active configuration.
    #[must_use]
    pub fn unchanged() -> Self {
        Self {
            event: "config_swap",
            timestamp_ms: timestamp_ms(),
            outcome: "unchanged",
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
            error: None,
        }
    }

    /// Records a candidate that could not be installed.
    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            event: "config_swap",
            timestamp_ms: timestamp_ms(),
            outcome: "rejected",
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Returns milliseconds since the Unix epoch.
fn timestamp_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Renders channel references as `namespace/name` labels.
fn labels(channels: &[ChannelReference]) -> Vec<String> {
    channels.iter().map(ToString::to_string).collect()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for fan-out engine events.
pub trait FanoutAuditSink: Send + Sync {
    /// Record a fan-out request event.
    fn record_fanout(&self, event: &FanoutAuditEvent);

    /// Record a routing miss.
    fn record_route(&self, _event: &RouteAuditEvent) {}

    /// Record a configuration swap.
    fn record_swap(&self, _event: &SwapAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one serialized event to stderr.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

impl FanoutAuditSink for StderrAuditSink {
    fn record_fanout(&self, event: &FanoutAuditEvent) {
        Self::emit(event);
    }

    fn record_route(&self, event: &RouteAuditEvent) {
        Self::emit(event);
    }

    fn record_swap(&self, event: &SwapAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event and flushes.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl FanoutAuditSink for FileAuditSink {
    fn record_fanout(&self, event: &FanoutAuditEvent) {
        self.emit(event);
    }

    fn record_route(&self, event: &RouteAuditEvent) {
        self.emit(event);
    }

    fn record_swap(&self, event: &SwapAuditEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl FanoutAuditSink for NoopAuditSink {
    fn record_fanout(&self, _event: &FanoutAuditEvent) {}
}
