// crates/fanout-bus-broker/src/dispatcher.rs
// ============================================================================
// Module: Fanout Bus Subscription Dispatcher
// Description: Two-stage delivery of one event to one subscription.
// Purpose: Run the callable then sinkable hop under a shared deadline.
// Dependencies: fanout-bus-core, tokio, tokio-util
// ============================================================================

//! ## Overview
//! [`SubscriptionDispatcher`] drives a single subscription through
//! `Start -> CallableAttempted -> SinkableAttempted -> Done`. A failed stage
//! short-circuits to `Done` with the matching [`DispatchOutcome`].
//! Invariants:
//! - The sinkable hop is never attempted after a callable failure.
//! - No hop starts or continues past the deadline or after cancellation.
//! - Hops are never retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use fanout_bus_core::Event;
use fanout_bus_core::SubscriptionSpec;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::broker::BrokerError;
use crate::transport::HopError;
use crate::transport::HopTarget;
use crate::transport::HopTransport;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of dispatching one event to one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every configured hop succeeded.
    Success,
    /// The callable hop failed; the sinkable hop was not attempted.
    CallableFailed(HopError),
    /// The sinkable hop failed.
    SinkableFailed(HopError),
    /// The shared deadline elapsed before the subscription finished.
    Timeout,
    /// The dispatch task ended abnormally.
    Aborted(String),
}

impl DispatchOutcome {
    /// Returns true when the subscription succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns a stable label for audit output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::CallableFailed(_) => "callable_failed",
            Self::SinkableFailed(_) => "sinkable_failed",
            Self::Timeout => "timeout",
            Self::Aborted(_) => "aborted",
        }
    }

    /// Returns failure detail, if any.
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Success | Self::Timeout => None,
            Self::CallableFailed(err) | Self::SinkableFailed(err) => Some(err.to_string()),
            Self::Aborted(reason) => Some(reason.clone()),
        }
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {detail}", self.kind()),
            None => f.write_str(self.kind()),
        }
    }
}

/// Outcome plus the final event produced by the subscription.
#[derive(Debug, Clone)]
pub struct Dispatched {
    /// Subscription outcome.
    pub outcome: DispatchOutcome,
    /// Event after the callable stage; `None` when the callable consumed it
    /// or the subscription failed.
    pub event: Option<Event>,
}

// ============================================================================
// SECTION: Resolved Subscription
// ============================================================================

/// Subscription whose targets have been resolved to hop addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSubscription {
    /// Configured subscription.
    spec: SubscriptionSpec,
    /// Callable hop target.
    callable: Option<HopTarget>,
    /// Sinkable hop target.
    sinkable: Option<HopTarget>,
}

impl ResolvedSubscription {
    /// Resolves the targets of a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConfigInvalid`] when a target cannot be resolved.
    pub fn resolve(spec: &SubscriptionSpec) -> Result<Self, BrokerError> {
        let callable = spec
            .callable()
            .map(HopTarget::parse)
            .transpose()
            .map_err(|err| BrokerError::ConfigInvalid(format!("callable: {err}")))?;
        let sinkable = spec
            .sinkable()
            .map(HopTarget::parse)
            .transpose()
            .map_err(|err| BrokerError::ConfigInvalid(format!("sinkable: {err}")))?;
        Ok(Self {
            spec: spec.clone(),
            callable,
            sinkable,
        })
    }

    /// Returns the configured subscription.
    #[must_use]
    pub const fn spec(&self) -> &SubscriptionSpec {
        &self.spec
    }

    /// Returns the callable hop target.
    #[must_use]
    pub const fn callable(&self) -> Option<&HopTarget> {
        self.callable.as_ref()
    }

    /// Returns the sinkable hop target.
    #[must_use]
    pub const fn sinkable(&self) -> Option<&HopTarget> {
        self.sinkable.as_ref()
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Per-subscription delivery stage.
#[derive(Debug)]
enum DeliveryStage {
    /// Nothing attempted yet.
    Start,
    /// Callable hop finished or was not configured.
    CallableAttempted,
    /// Sinkable hop finished or was not configured.
    SinkableAttempted,
    /// Terminal state.
    Done(DispatchOutcome),
}

/// Reason a single hop did not produce a reply.
enum HopFailure {
    /// Transport reported an error.
    Hop(HopError),
    /// Deadline elapsed or the dispatch was cancelled.
    Timeout,
}

/// Delivers events to single subscriptions.
#[derive(Clone)]
pub struct SubscriptionDispatcher {
    /// Transport used for every hop.
    transport: Arc<dyn HopTransport>,
}

impl SubscriptionDispatcher {
    /// Creates a dispatcher backed by `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn HopTransport>) -> Self {
        Self {
            transport,
        }
    }

    /// Dispatches `event` to `subscription`.
    ///
    /// Both hops race against `deadline` and `cancel`; whichever fires first
    /// ends the subscription with [`DispatchOutcome::Timeout`].
    pub async fn dispatch(
        &self,
        event: Event,
        subscription: &ResolvedSubscription,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Dispatched {
        let mut current = Some(event);
        let mut stage = DeliveryStage::Start;
        loop {
            stage = match stage {
                DeliveryStage::Start => match (subscription.callable(), current.take()) {
                    (Some(target), Some(event)) => {
                        match self.hop(target, &event, deadline, cancel).await {
                            Ok(reply) => {
                                current = reply;
                                DeliveryStage::CallableAttempted
                            }
                            Err(HopFailure::Hop(err)) => {
                                DeliveryStage::Done(DispatchOutcome::CallableFailed(err))
                            }
                            Err(HopFailure::Timeout) => {
                                DeliveryStage::Done(DispatchOutcome::Timeout)
                            }
                        }
                    }
                    (_, event) => {
                        current = event;
                        DeliveryStage::CallableAttempted
                    }
                },
                DeliveryStage::CallableAttempted => {
                    match (subscription.sinkable(), current.as_ref()) {
                        (Some(target), Some(event)) => {
                            match self.hop(target, event, deadline, cancel).await {
                                Ok(_) => DeliveryStage::SinkableAttempted,
                                Err(HopFailure::Hop(err)) => {
                                    DeliveryStage::Done(DispatchOutcome::SinkableFailed(err))
                                }
                                Err(HopFailure::Timeout) => {
                                    DeliveryStage::Done(DispatchOutcome::Timeout)
                                }
                            }
                        }
                        _ => DeliveryStage::SinkableAttempted,
                    }
                }
                DeliveryStage::SinkableAttempted => DeliveryStage::Done(DispatchOutcome::Success),
                DeliveryStage::Done(outcome) => {
                    let event = if outcome.is_success() { current } else { None };
                    return Dispatched {
                        outcome,
                        event,
                    };
                }
            };
        }
    }

    /// Performs one hop bounded by the deadline and cancellation token.
    async fn hop(
        &self,
        target: &HopTarget,
        event: &Event,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Option<Event>, HopFailure> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(HopFailure::Timeout),
            () = tokio::time::sleep_until(deadline) => Err(HopFailure::Timeout),
            result = self.transport.deliver(target, event) => result.map_err(HopFailure::Hop),
        }
    }
}
