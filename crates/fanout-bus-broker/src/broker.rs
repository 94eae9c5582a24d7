// crates/fanout-bus-broker/src/broker.rs
// ============================================================================
// Module: Fanout Bus Engine Options
// Description: Shared collaborators and settings for fan-out handlers.
// Purpose: Wire the transport, receiver, audit sink, and timeout together.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`FanoutOptions`] carries the collaborators every [`crate::FanoutHandler`]
//! needs. It is built once through [`FanoutOptionsBuilder`] and shared by all
//! handlers of every installed configuration.
//! Invariants:
//! - A transport is always configured.
//! - The fan-out timeout is never zero.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::audit::FanoutAuditSink;
use crate::audit::NoopAuditSink;
use crate::receiver::MessageReceiver;
use crate::receiver::ValidatingReceiver;
use crate::transport::HopTransport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default shared deadline for one fan-out.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// SECTION: Broker Errors
// ============================================================================

/// Errors returned while building engine components.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// No hop transport was configured.
    #[error("fanout transport is not configured")]
    MissingTransport,
    /// The fan-out timeout is zero.
    #[error("fanout timeout must be greater than zero")]
    InvalidTimeout,
    /// A candidate configuration cannot be turned into handlers.
    #[error("invalid fanout configuration: {0}")]
    ConfigInvalid(String),
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Builder for [`FanoutOptions`].
///
/// # Invariants
/// - `build` succeeds only when a transport is configured.
#[derive(Default)]
pub struct FanoutOptionsBuilder {
    /// Transport used for every hop.
    transport: Option<Arc<dyn HopTransport>>,
    /// Inbound validation collaborator.
    receiver: Option<Arc<dyn MessageReceiver>>,
    /// Audit sink for engine events.
    audit: Option<Arc<dyn FanoutAuditSink>>,
    /// Shared fan-out deadline.
    timeout: Option<Duration>,
}

impl FanoutOptionsBuilder {
    /// Sets the hop transport.
    #[must_use]
    pub fn transport(mut self, transport: impl HopTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the inbound receiver.
    #[must_use]
    pub fn receiver(mut self, receiver: impl MessageReceiver + 'static) -> Self {
        self.receiver = Some(Arc::new(receiver));
        self
    }

    /// Sets the audit sink.
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn FanoutAuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Sets the shared fan-out deadline.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the options.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::MissingTransport`] when no transport is
    /// configured and [`BrokerError::InvalidTimeout`] for a zero timeout.
    pub fn build(self) -> Result<FanoutOptions, BrokerError> {
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(BrokerError::InvalidTimeout);
        }
        Ok(FanoutOptions {
            transport: self.transport.ok_or(BrokerError::MissingTransport)?,
            receiver: self.receiver.unwrap_or_else(|| Arc::new(ValidatingReceiver::default())),
            audit: self.audit.unwrap_or_else(|| Arc::new(NoopAuditSink)),
            timeout,
        })
    }
}

/// Collaborators shared by fan-out handlers.
#[derive(Clone)]
pub struct FanoutOptions {
    /// Transport used for every hop.
    transport: Arc<dyn HopTransport>,
    /// Inbound validation collaborator.
    receiver: Arc<dyn MessageReceiver>,
    /// Audit sink for engine events.
    audit: Arc<dyn FanoutAuditSink>,
    /// Shared fan-out deadline.
    timeout: Duration,
}

impl FanoutOptions {
    /// Returns a builder for fan-out options.
    #[must_use]
    pub fn builder() -> FanoutOptionsBuilder {
        FanoutOptionsBuilder::default()
    }

    /// Returns the hop transport.
    #[must_use]
    pub fn transport(&self) -> Arc<dyn HopTransport> {
        Arc::clone(&self.transport)
    }

    /// Returns the inbound receiver.
    #[must_use]
    pub fn receiver(&self) -> Arc<dyn MessageReceiver> {
        Arc::clone(&self.receiver)
    }

    /// Returns the audit sink.
    #[must_use]
    pub fn audit(&self) -> Arc<dyn FanoutAuditSink> {
        Arc::clone(&self.audit)
    }

    /// Returns the shared fan-out deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}
