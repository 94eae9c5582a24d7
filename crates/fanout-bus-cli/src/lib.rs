// crates/fanout-bus-cli/src/lib.rs
// ============================================================================
// Module: Fanout Bus CLI Library
// Description: Shared components for the fanout-bus command-line interface.
// Purpose: Expose the ingress server to the binary and integration tests.
// Dependencies: axum, fanout-bus-broker, fanout-bus-config
// ============================================================================

//! ## Overview
//! This library houses the HTTP ingress server and the config reconciliation
//! loop. The binary entry point (`src/main.rs`) wires them to the command line.
//!
//! Security posture: inbound requests are untrusted; body size and header
//! validation happen before any subscription is contacted.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// HTTP ingress and config reloading.
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use server::ConfigReloader;
pub use server::FanoutServer;
pub use server::ReloadOutcome;
pub use server::ServerError;
pub use server::ingress_router;
pub use server::request_host;
