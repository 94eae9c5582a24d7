// crates/fanout-bus-broker/src/transport/callback.rs
// ============================================================================
// Module: Fanout Bus Callback Transport
// Description: Callback-based transport for in-process delivery.
// Purpose: Invoke a user-provided function for each hop.
// Dependencies: async-trait, fanout-bus-core
// ============================================================================

//! ## Overview
//! [`CallbackTransport`] delivers events by invoking a user-supplied function.
//! It is used to embed the engine without a network and to script endpoint
//! behavior in tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use fanout_bus_core::Event;

use crate::transport::HopError;
use crate::transport::HopTarget;
use crate::transport::HopTransport;

// ============================================================================
// SECTION: Callback Transport
// ============================================================================

/// Callback-based hop transport.
#[derive(Clone)]
pub struct CallbackTransport {
    /// Handler invoked with the target and event.
    handler: Arc<CallbackHandler>,
}

/// Callback handler signature used by the transport.
type CallbackHandler =
    dyn Fn(&HopTarget, &Event) -> Result<Option<Event>, HopError> + Send + Sync;

impl CallbackTransport {
    /// Creates a callback transport from a handler function.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HopTarget, &Event) -> Result<Option<Event>, HopError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }
}

#[async_trait]
impl HopTransport for CallbackTransport {
    async fn deliver(&self, target: &HopTarget, event: &Event) -> Result<Option<Event>, HopError> {
        (self.handler)(target, event)
    }
}
