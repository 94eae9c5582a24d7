// crates/fanout-bus-broker/src/swappable.rs
// ============================================================================
// Module: Fanout Bus Swappable Handler
// Description: Atomically replaceable slot holding the active routing table.
// Purpose: Serve requests against a consistent snapshot during hot swaps.
// Dependencies: arc-swap, fanout-bus-core
// ============================================================================

//! ## Overview
//! [`SwappableHandler`] is the externally visible entry point of the engine.
//! Readers load the current [`MultiChannelFanoutHandler`] without blocking;
//! writers serialize through an install lock and publish a fully built
//! replacement with a single pointer store.
//! Invariants:
//! - The slot always holds an initialized routing table.
//! - A request is evaluated against exactly one snapshot.
//! - A failed install leaves the active table in force.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use arc_swap::ArcSwap;
use fanout_bus_core::ConfigDiff;
use fanout_bus_core::FanoutConfig;

use crate::audit::SwapAuditEvent;
use crate::broker::BrokerError;
use crate::broker::FanoutOptions;
use crate::multichannel::MultiChannelFanoutHandler;
use crate::multichannel::RequestError;
use crate::receiver::InboundRequest;

// ============================================================================
// SECTION: Install Outcome
// ============================================================================

/// Result of a successful [`SwappableHandler::install`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The candidate matched the active configuration; nothing was swapped.
    Unchanged,
    /// The candidate was installed with the given difference.
    Installed(ConfigDiff),
}

// ============================================================================
// SECTION: Swappable Handler
// ============================================================================

/// Hot-swappable holder of the active routing table.
pub struct SwappableHandler {
    /// Active routing table.
    current: ArcSwap<MultiChannelFanoutHandler>,
    /// Serializes writers against each other.
    install_lock: Mutex<()>,
}

impl SwappableHandler {
    /// Creates a slot holding `handler`.
    #[must_use]
    pub fn new(handler: MultiChannelFanoutHandler) -> Self {
        Self {
            current: ArcSwap::from_pointee(handler),
            install_lock: Mutex::new(()),
        }
    }

    /// Creates a slot holding an empty routing table.
    #[must_use]
    pub fn empty(options: FanoutOptions) -> Self {
        Self::new(MultiChannelFanoutHandler::empty(options))
    }

    /// Returns the active routing table.
    #[must_use]
    pub fn get_config(&self) -> Arc<MultiChannelFanoutHandler> {
        self.current.load_full()
    }

    /// Replaces the active routing table.
    pub fn set_config(&self, handler: MultiChannelFanoutHandler) {
        let _guard = self.install_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.current.store(Arc::new(handler));
    }

    /// Handles one request against a snapshot of the active routing table.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when routing or fan-out fails.
    pub async fn handle(&self, request: InboundRequest) -> Result<(), RequestError> {
        let snapshot = self.current.load_full();
        snapshot.handle(request).await
    }

    /// Installs `config` unless it matches the active configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConfigInvalid`] when the candidate cannot be
    /// built; the active table is left in place.
    pub fn install(&self, config: FanoutConfig) -> Result<InstallOutcome, BrokerError> {
        let _guard = self.install_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let active = self.current.load_full();
        let audit = active.options().audit();
        let diff = active.config_diff(&config);
        if diff.is_empty() {
            audit.record_swap(&SwapAuditEvent::unchanged());
            return Ok(InstallOutcome::Unchanged);
        }
        match active.copy_with_new_config(config) {
            Ok(next) => {
                self.current.store(Arc::new(next));
                audit.record_swap(&SwapAuditEvent::installed(&diff));
                Ok(InstallOutcome::Installed(diff))
            }
            Err(err) => {
                audit.record_swap(&SwapAuditEvent::rejected(err.to_string()));
                Err(err)
            }
        }
    }
}
