// crates/fanout-bus-broker/src/lib.rs
// ============================================================================
// Module: Fanout Bus Broker Library
// Description: Channel fan-out engine with hot-swappable routing.
// Purpose: Deliver inbound events to every subscription of their channel.
// Dependencies: fanout-bus-core, arc-swap, reqwest, tokio, tokio-util
// ============================================================================

//! ## Overview
//! Fanout Bus Broker receives events addressed to channels and delivers each
//! one to every subscription of that channel. A subscription pairs an optional
//! callable hop, which may transform the event, with an optional sinkable hop.
//! The routing table lives in a [`SwappableHandler`] and is replaced whole.
//!
//! Layers, from the outside in:
//! - [`SwappableHandler`] holds the active [`MultiChannelFanoutHandler`].
//! - [`MultiChannelFanoutHandler`] routes a request to its [`FanoutHandler`].
//! - [`FanoutHandler`] validates the request and runs one
//!   [`SubscriptionDispatcher`] task per subscription.
//!
//! Invariants:
//! - A request succeeds only when every subscription of its channel succeeds.
//! - Hops are never retried.
//! - Requests never observe a partially installed routing table.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod broker;
pub mod dispatcher;
pub mod fanout;
pub mod multichannel;
pub mod receiver;
pub mod swappable;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FanoutAuditEvent;
pub use audit::FanoutAuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::RouteAuditEvent;
pub use audit::StderrAuditSink;
pub use audit::SubscriptionAuditEntry;
pub use audit::SwapAuditEvent;
pub use broker::BrokerError;
pub use broker::DEFAULT_TIMEOUT;
pub use broker::FanoutOptions;
pub use broker::FanoutOptionsBuilder;
pub use dispatcher::DispatchOutcome;
pub use dispatcher::Dispatched;
pub use dispatcher::ResolvedSubscription;
pub use dispatcher::SubscriptionDispatcher;
pub use fanout::FanoutError;
pub use fanout::FanoutHandler;
pub use multichannel::MultiChannelFanoutHandler;
pub use multichannel::RequestError;
pub use multichannel::RouteError;
pub use receiver::CallbackReceiver;
pub use receiver::DEFAULT_MAX_BODY_BYTES;
pub use receiver::InboundRequest;
pub use receiver::MessageReceiver;
pub use receiver::ReceiverError;
pub use receiver::ValidatingReceiver;
pub use receiver::is_forwarded_header;
pub use swappable::InstallOutcome;
pub use swappable::SwappableHandler;
pub use transport::CallbackTransport;
pub use transport::HopError;
pub use transport::HopTarget;
pub use transport::HopTransport;
pub use transport::HttpTransport;
