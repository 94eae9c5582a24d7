// crates/fanout-bus-core/src/config.rs
// ============================================================================
// Module: Fanout Bus Routing Configuration
// Description: Subscription, channel, and routing-table descriptions.
// Purpose: Describe which subscriptions each channel fans out to.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`FanoutConfig`] is the complete routing table: an ordered list of
//! [`ChannelConfig`] entries, each with an ordered list of
//! [`SubscriptionSpec`] values. The table is immutable once built; updates
//! happen by building a replacement and swapping it in.
//! Invariants:
//! - Channel references are unique within a table.
//! - Subscription targets are trimmed; blank targets are treated as absent.
//! - Declaration order is preserved for display but carries no meaning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::channel::ChannelReference;
use crate::diff::ConfigDiff;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when building a routing table.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FanoutConfigError {
    /// Two channel entries share the same reference.
    #[error("duplicate channel: {0}")]
    DuplicateChannel(ChannelReference),
}

// ============================================================================
// SECTION: Subscription Spec
// ============================================================================

/// Delivery targets for one subscription.
///
/// # Invariants
/// - Targets are never blank; an empty spec echoes the event with no delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SubscriptionSpec {
    /// Optional transforming endpoint, called first.
    callable: Option<String>,
    /// Optional terminal endpoint, called with the (possibly transformed) event.
    sinkable: Option<String>,
}

impl SubscriptionSpec {
    /// Creates a subscription spec, treating blank targets as absent.
    #[must_use]
    pub fn new(callable: Option<String>, sinkable: Option<String>) -> Self {
        Self {
            callable: normalize_target(callable),
            sinkable: normalize_target(sinkable),
        }
    }

    /// Returns a spec with neither target set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the spec with the callable target replaced.
    #[must_use]
    pub fn with_callable(mut self, target: impl Into<String>) -> Self {
        self.callable = normalize_target(Some(target.into()));
        self
    }

    /// Returns the spec with the sinkable target replaced.
    #[must_use]
    pub fn with_sinkable(mut self, target: impl Into<String>) -> Self {
        self.sinkable = normalize_target(Some(target.into()));
        self
    }

    /// Returns the callable target, if any.
    #[must_use]
    pub fn callable(&self) -> Option<&str> {
        self.callable.as_deref()
    }

    /// Returns the sinkable target, if any.
    #[must_use]
    pub fn sinkable(&self) -> Option<&str> {
        self.sinkable.as_deref()
    }

    /// Returns true when neither target is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.callable.is_none() && self.sinkable.is_none()
    }
}

/// Trims a target and drops it when blank.
fn normalize_target(target: Option<String>) -> Option<String> {
    target.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

// ============================================================================
// SECTION: Channel Config
// ============================================================================

/// Subscriptions registered for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelConfig {
    /// Channel the subscriptions belong to.
    channel: ChannelReference,
    /// Subscriptions in declaration order.
    subscriptions: Vec<SubscriptionSpec>,
}

impl ChannelConfig {
    /// Creates a channel entry.
    #[must_use]
    pub const fn new(channel: ChannelReference, subscriptions: Vec<SubscriptionSpec>) -> Self {
        Self {
            channel,
            subscriptions,
        }
    }

    /// Returns the channel reference.
    #[must_use]
    pub const fn channel(&self) -> &ChannelReference {
        &self.channel
    }

    /// Returns the subscriptions in declaration order.
    #[must_use]
    pub fn subscriptions(&self) -> &[SubscriptionSpec] {
        &self.subscriptions
    }

    /// Returns true when both entries hold the same subscription multiset.
    #[must_use]
    pub fn same_subscriptions(&self, other: &Self) -> bool {
        if self.subscriptions.len() != other.subscriptions.len() {
            return false;
        }
        self.sorted_subscriptions() == other.sorted_subscriptions()
    }

    /// Returns the subscriptions sorted for order-insensitive comparison.
    fn sorted_subscriptions(&self) -> Vec<&SubscriptionSpec> {
        let mut sorted: Vec<&SubscriptionSpec> = self.subscriptions.iter().collect();
        sorted.sort();
        sorted
    }
}

// ============================================================================
// SECTION: Fanout Config
// ============================================================================

/// Complete routing table mapping channels to their subscriptions.
///
/// # Invariants
/// - No two entries share a [`ChannelReference`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanoutConfig {
    /// Channel entries in declaration order.
    channels: Vec<ChannelConfig>,
}

impl FanoutConfig {
    /// Builds a routing table from channel entries.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutConfigError::DuplicateChannel`] when two entries share
    /// a channel reference.
    pub fn new(channels: Vec<ChannelConfig>) -> Result<Self, FanoutConfigError> {
        let mut seen = BTreeSet::new();
        for entry in &channels {
            if !seen.insert(entry.channel()) {
                return Err(FanoutConfigError::DuplicateChannel(entry.channel().clone()));
            }
        }
        Ok(Self {
            channels,
        })
    }

    /// Returns an empty routing table.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    /// Returns the channel entries in declaration order.
    #[must_use]
    pub fn channels(&self) -> &[ChannelConfig] {
        &self.channels
    }

    /// Looks up the entry for a channel.
    #[must_use]
    pub fn channel(&self, channel: &ChannelReference) -> Option<&ChannelConfig> {
        self.channels.iter().find(|entry| entry.channel() == channel)
    }

    /// Returns the number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true when no channels are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Computes the structural difference from `self` to `other`.
    #[must_use]
    pub fn diff(&self, other: &Self) -> ConfigDiff {
        ConfigDiff::between(self, other)
    }
}
