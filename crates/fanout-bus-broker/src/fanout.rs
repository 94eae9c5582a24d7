// crates/fanout-bus-broker/src/fanout.rs
// ============================================================================
// Module: Fanout Bus Channel Handler
// Description: Concurrent delivery of one event to every channel subscription.
// Purpose: Validate, fan out under a shared deadline, and aggregate results.
// Dependencies: fanout-bus-core, tokio, tokio-util
// ============================================================================

//! ## Overview
//! [`FanoutHandler`] serves a single channel. Each request is validated by the
//! configured [`MessageReceiver`], then dispatched to every subscription in
//! its own task. All tasks share one deadline and one cancellation token.
//! Invariants:
//! - The aggregate succeeds only when every subscription reports success.
//! - Rejected or untracked requests never reach a subscription.
//! - Subscriptions still running at the deadline count as timed out and are
//!   cancelled without being awaited.
//! - A task that panics or is aborted reports on its own subscription slot,
//!   even when the deadline later expires.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fanout_bus_core::ChannelConfig;
use fanout_bus_core::ChannelReference;
use fanout_bus_core::Event;
use thiserror::Error;
use tokio::task;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::audit::FanoutAuditEvent;
use crate::audit::FanoutAuditEventParams;
use crate::audit::FanoutAuditSink;
use crate::audit::SubscriptionAuditEntry;
use crate::broker::BrokerError;
use crate::broker::FanoutOptions;
use crate::dispatcher::DispatchOutcome;
use crate::dispatcher::ResolvedSubscription;
use crate::dispatcher::SubscriptionDispatcher;
use crate::receiver::InboundRequest;
use crate::receiver::MessageReceiver;
use crate::receiver::ReceiverError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reasons a fan-out request failed.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Error)]
pub enum FanoutError {
    /// The receiver refused the inbound request.
    #[error("receiver rejected event: {0}")]
    ReceiverRejected(ReceiverError),
    /// The receiver accepted the request but tracked no event.
    #[error("tracked event missing")]
    TrackedEventMissing,
    /// At least one subscription failed or timed out.
    #[error("{failed} of {total} subscriptions failed, {timed_out} timed out")]
    Delivery {
        /// Subscriptions that reported a hop failure or aborted.
        failed: usize,
        /// Subscriptions that did not finish before the deadline.
        timed_out: usize,
        /// Subscriptions attempted.
        total: usize,
    },
}

impl FanoutError {
    /// Returns a stable label for audit output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ReceiverRejected(_) => "receiver_rejected",
            Self::TrackedEventMissing => "tracked_event_missing",
            Self::Delivery {
                ..
            } => "delivery_failed",
        }
    }
}

// ============================================================================
// SECTION: Fanout Handler
// ============================================================================

/// Fan-out engine for one channel.
#[derive(Clone)]
pub struct FanoutHandler {
    /// Channel configuration this handler was built from.
    config: ChannelConfig,
    /// Subscriptions with resolved hop targets, in configuration order.
    subscriptions: Arc<[ResolvedSubscription]>,
    /// Per-subscription dispatcher.
    dispatcher: SubscriptionDispatcher,
    /// Inbound validation collaborator.
    receiver: Arc<dyn MessageReceiver>,
    /// Audit sink for request events.
    audit: Arc<dyn FanoutAuditSink>,
    /// Shared deadline applied to each request.
    timeout: Duration,
}

impl FanoutHandler {
    /// Builds a handler for one channel.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConfigInvalid`] when a subscription target
    /// cannot be resolved.
    pub fn new(config: &ChannelConfig, options: &FanoutOptions) -> Result<Self, BrokerError> {
        let subscriptions = config
            .subscriptions()
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                ResolvedSubscription::resolve(spec).map_err(|err| {
                    BrokerError::ConfigInvalid(format!(
                        "channel {} subscription {index}: {err}",
                        config.channel()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            config: config.clone(),
            subscriptions: subscriptions.into(),
            dispatcher: SubscriptionDispatcher::new(options.transport()),
            receiver: options.receiver(),
            audit: options.audit(),
            timeout: options.timeout(),
        })
    }

    /// Returns the channel served by this handler.
    #[must_use]
    pub const fn channel(&self) -> &ChannelReference {
        self.config.channel()
    }

    /// Returns the channel configuration.
    #[must_use]
    pub const fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Returns the resolved subscriptions.
    #[must_use]
    pub fn subscriptions(&self) -> &[ResolvedSubscription] {
        &self.subscriptions
    }

    /// Returns the shared deadline applied to each request.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validates `request` and fans the event out to every subscription.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError`] when the receiver refuses the request, no event
    /// was tracked, or any subscription fails or times out.
    pub async fn handle(&self, request: InboundRequest) -> Result<(), FanoutError> {
        let started = Instant::now();
        let (result, outcomes) = self.fan_out(request).await;
        self.record(&result, &outcomes, started.elapsed());
        result
    }

    /// Runs validation and fan-out, returning per-subscription outcomes.
    async fn fan_out(
        &self,
        request: InboundRequest,
    ) -> (Result<(), FanoutError>, Vec<DispatchOutcome>) {
        let mut tracked: Option<Event> = None;
        let received = self.receiver.receive(self.channel(), request, &mut |event: Event| {
            tracked = Some(event);
        });
        if let Err(err) = received {
            return (Err(FanoutError::ReceiverRejected(err)), Vec::new());
        }
        let Some(event) = tracked else {
            return (Err(FanoutError::TrackedEventMissing), Vec::new());
        };
        if self.subscriptions.is_empty() {
            return (Ok(()), Vec::new());
        }
        let outcomes = self.dispatch_all(&event).await;
        let total = outcomes.len();
        let timed_out =
            outcomes.iter().filter(|outcome| matches!(outcome, DispatchOutcome::Timeout)).count();
        let failed = outcomes
            .iter()
            .filter(|outcome| !outcome.is_success() && !matches!(outcome, DispatchOutcome::Timeout))
            .count();
        if failed == 0 && timed_out == 0 {
            (Ok(()), outcomes)
        } else {
            (
                Err(FanoutError::Delivery {
                    failed,
                    timed_out,
                    total,
                }),
                outcomes,
            )
        }
    }

    /// Dispatches `event` to every subscription concurrently and waits for
    /// all of them or the deadline, whichever comes first.
    async fn dispatch_all(&self, event: &Event) -> Vec<DispatchOutcome> {
        let deadline = Instant::now() + self.timeout;
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut indices: HashMap<task::Id, usize> = HashMap::new();
        for (index, subscription) in self.subscriptions.iter().enumerate() {
            let dispatcher = self.dispatcher.clone();
            let subscription = subscription.clone();
            let event = event.clone();
            let token = cancel.child_token();
            let handle = tasks.spawn(async move {
                dispatcher.dispatch(event, &subscription, deadline, &token).await.outcome
            });
            indices.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<DispatchOutcome>> = vec![None; self.subscriptions.len()];
        let joined = tokio::time::timeout_at(deadline, async {
            while let Some(result) = tasks.join_next_with_id().await {
                let (id, outcome) = match result {
                    Ok((id, outcome)) => (id, outcome),
                    Err(err) => (err.id(), DispatchOutcome::Aborted(err.to_string())),
                };
                if let Some(slot) = indices.get(&id).and_then(|index| slots.get_mut(*index)) {
                    *slot = Some(outcome);
                }
            }
        })
        .await;
        let expired = joined.is_err();
        if expired {
            cancel.cancel();
            tasks.detach_all();
        }

        slots
            .into_iter()
            .map(|slot| match slot {
                Some(outcome) => outcome,
                None if expired => DispatchOutcome::Timeout,
                None => DispatchOutcome::Aborted("dispatch task ended".to_string()),
            })
            .collect()
    }

    /// Emits the audit record for one request.
    fn record(
        &self,
        result: &Result<(), FanoutError>,
        outcomes: &[DispatchOutcome],
        elapsed: Duration,
    ) {
        let subscriptions = self
            .subscriptions
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (subscription, outcome))| SubscriptionAuditEntry {
                index,
                callable: subscription.spec().callable().map(ToString::to_string),
                sinkable: subscription.spec().sinkable().map(ToString::to_string),
                outcome: outcome.kind(),
                detail: outcome.detail(),
            })
            .collect();
        let (error_kind, error) = match result {
            Ok(()) => (None, None),
            Err(err) => (Some(err.kind()), Some(err.to_string())),
        };
        self.audit.record_fanout(&FanoutAuditEvent::new(FanoutAuditEventParams {
            channel: self.channel().clone(),
            error_kind,
            error,
            elapsed,
            subscriptions,
        }));
    }
}
