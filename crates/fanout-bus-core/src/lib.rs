// crates/fanout-bus-core/src/lib.rs
// ============================================================================
// Module: Fanout Bus Core Library
// Description: Public API surface for the Fanout Bus data model.
// Purpose: Expose events, channel references, and routing configuration.
// Dependencies: crate::{channel, config, diff, event}
// ============================================================================

//! ## Overview
//! Fanout Bus core holds the passive data model shared by the fan-out engine,
//! the configuration loader, and the CLI. Nothing in this crate performs I/O:
//! routing tables are built once, compared structurally, and replaced
//! wholesale rather than mutated.
//! Invariants:
//! - A [`FanoutConfig`] never holds two channels with the same [`ChannelReference`].
//! - [`ConfigDiff`] ignores subscription declaration order.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod channel;
pub mod config;
pub mod diff;
pub mod event;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use channel::ChannelReference;
pub use channel::ChannelReferenceError;
pub use config::ChannelConfig;
pub use config::FanoutConfig;
pub use config::FanoutConfigError;
pub use config::SubscriptionSpec;
pub use diff::ConfigDiff;
pub use event::Event;
