// crates/fanout-bus-broker/src/multichannel.rs
// ============================================================================
// Module: Fanout Bus Multi-Channel Handler
// Description: Immutable routing table of per-channel fan-out handlers.
// Purpose: Route inbound requests by channel and derive replacement tables.
// Dependencies: fanout-bus-core, thiserror
// ============================================================================

//! ## Overview
//! [`MultiChannelFanoutHandler`] owns one [`FanoutConfig`] and one
//! [`FanoutHandler`] per channel in it. Instances are never mutated; a new
//! configuration produces a new instance through
//! [`MultiChannelFanoutHandler::copy_with_new_config`].
//! Invariants:
//! - Every channel in the configuration has exactly one handler.
//! - Handlers for channels whose subscriptions are unchanged are shared with
//!   the instance they were copied from.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use fanout_bus_core::ChannelReference;
use fanout_bus_core::ChannelReferenceError;
use fanout_bus_core::ConfigDiff;
use fanout_bus_core::FanoutConfig;
use thiserror::Error;

use crate::audit::RouteAuditEvent;
use crate::broker::BrokerError;
use crate::broker::FanoutOptions;
use crate::fanout::FanoutError;
use crate::fanout::FanoutHandler;
use crate::receiver::InboundRequest;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reasons a request could not be routed to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The request host does not name a channel.
    #[error("cannot resolve channel: {0}")]
    InvalidHost(ChannelReferenceError),
    /// No channel with this reference is installed.
    #[error("channel not found: {0}")]
    NotFound(ChannelReference),
}

/// Request-level failure surfaced to the ingress boundary.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// Routing failed; no dispatch was attempted.
    #[error(transparent)]
    Route(#[from] RouteError),
    /// Fan-out failed.
    #[error(transparent)]
    Fanout(#[from] FanoutError),
}

impl RequestError {
    /// Returns the HTTP status code reported for this failure.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Route(RouteError::InvalidHost(_)) => 400,
            Self::Route(RouteError::NotFound(_)) => 404,
            Self::Fanout(_) => 500,
        }
    }
}

// ============================================================================
// SECTION: Multi-Channel Handler
// ============================================================================

/// Routing table mapping channels to fan-out handlers.
#[derive(Clone)]
pub struct MultiChannelFanoutHandler {
    /// Configuration this table was built from.
    config: FanoutConfig,
    /// Handlers keyed by channel.
    handlers: BTreeMap<ChannelReference, Arc<FanoutHandler>>,
    /// Collaborators used to build handlers.
    options: FanoutOptions,
}

impl MultiChannelFanoutHandler {
    /// Builds a routing table for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConfigInvalid`] when any channel handler cannot
    /// be built.
    pub fn new(config: FanoutConfig, options: FanoutOptions) -> Result<Self, BrokerError> {
        Self::build(config, options, &BTreeMap::new())
    }

    /// Builds a routing table with no channels.
    #[must_use]
    pub const fn empty(options: FanoutOptions) -> Self {
        Self {
            config: FanoutConfig::empty(),
            handlers: BTreeMap::new(),
            options,
        }
    }

    /// Returns the configuration this table was built from.
    #[must_use]
    pub const fn config(&self) -> &FanoutConfig {
        &self.config
    }

    /// Returns the collaborators used to build handlers.
    #[must_use]
    pub const fn options(&self) -> &FanoutOptions {
        &self.options
    }

    /// Returns the handler for `channel`, if installed.
    #[must_use]
    pub fn handler(&self, channel: &ChannelReference) -> Option<&Arc<FanoutHandler>> {
        self.handlers.get(channel)
    }

    /// Selects the handler for a request host.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidHost`] when the host does not name a
    /// channel and [`RouteError::NotFound`] when the channel is not installed.
    pub fn route(&self, host: &str) -> Result<&FanoutHandler, RouteError> {
        let channel = ChannelReference::from_host(host).map_err(RouteError::InvalidHost)?;
        self.handlers.get(&channel).map(Arc::as_ref).ok_or(RouteError::NotFound(channel))
    }

    /// Routes and handles one inbound request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Route`] when no channel matches and
    /// [`RequestError::Fanout`] when the fan-out fails.
    pub async fn handle(&self, request: InboundRequest) -> Result<(), RequestError> {
        let handler = match self.route(&request.host) {
            Ok(handler) => handler,
            Err(err) => {
                let event = RouteAuditEvent::new(request.host.as_str(), err.to_string());
                self.options.audit().record_route(&event);
                return Err(err.into());
            }
        };
        handler.handle(request).await?;
        Ok(())
    }

    /// Compares the installed configuration with a candidate.
    #[must_use]
    pub fn config_diff(&self, candidate: &FanoutConfig) -> ConfigDiff {
        self.config.diff(candidate)
    }

    /// Builds a new routing table for `config` sharing the same collaborators.
    ///
    /// Handlers of channels whose subscriptions did not change are reused.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConfigInvalid`] when any new channel handler
    /// cannot be built.
    pub fn copy_with_new_config(&self, config: FanoutConfig) -> Result<Self, BrokerError> {
        Self::build(config, self.options.clone(), &self.handlers)
    }

    /// Builds a routing table, reusing matching handlers from `previous`.
    fn build(
        config: FanoutConfig,
        options: FanoutOptions,
        previous: &BTreeMap<ChannelReference, Arc<FanoutHandler>>,
    ) -> Result<Self, BrokerError> {
        let mut handlers = BTreeMap::new();
        for channel in config.channels() {
            let handler = match previous.get(channel.channel()) {
                Some(existing) if existing.config().same_subscriptions(channel) => {
                    Arc::clone(existing)
                }
                _ => Arc::new(FanoutHandler::new(channel, &options)?),
            };
            handlers.insert(channel.channel().clone(), handler);
        }
        Ok(Self {
            config,
            handlers,
            options,
        })
    }
}
