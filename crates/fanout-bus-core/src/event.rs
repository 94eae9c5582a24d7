// crates/fanout-bus-core/src/event.rs
// ============================================================================
// Module: Fanout Bus Events
// Description: Opaque event envelopes carried through fan-out.
// Purpose: Pair metadata headers with a shared payload buffer.
// Dependencies: bytes
// ============================================================================

//! ## Overview
//! An [`Event`] is the unit delivered to every subscription. Header names are
//! stored lowercase so lookups are case-insensitive. The payload is a
//! reference-counted [`Bytes`] buffer, so cloning an event per subscription
//! never copies the body.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use bytes::Bytes;

// ============================================================================
// SECTION: Event
// ============================================================================

/// Event envelope with metadata headers and a byte payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    /// Metadata headers keyed by lowercase name.
    headers: BTreeMap<String, String>,
    /// Event payload.
    payload: Bytes,
}

impl Event {
    /// Creates an event with the given payload and no headers.
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            headers: BTreeMap::new(),
            payload: payload.into(),
        }
    }

    /// Creates an event from headers and payload, normalizing header names.
    #[must_use]
    pub fn from_parts<I, K, V>(headers: I, payload: impl Into<Bytes>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.into()))
            .collect();
        Self {
            headers,
            payload: payload.into(),
        }
    }

    /// Returns the event with an additional header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Returns the header value for `name`, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns all headers.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Returns the payload.
    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true when the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Splits the event into headers and payload.
    #[must_use]
    pub fn into_parts(self) -> (BTreeMap<String, String>, Bytes) {
        (self.headers, self.payload)
    }
}
