// crates/fanout-bus-config/src/lib.rs
// ============================================================================
// Module: Fanout Bus Config Library
// Description: Canonical configuration model and validation.
// Purpose: Single source of truth for fanout-bus.toml semantics.
// Dependencies: fanout-bus-broker, fanout-bus-core, serde, toml
// ============================================================================

//! ## Overview
//! `fanout-bus-config` defines the configuration model for the fan-out bus:
//! ingress server settings, the fan-out deadline, audit sink selection,
//! reload polling, and the channel routing table. Validation is strict and
//! fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
