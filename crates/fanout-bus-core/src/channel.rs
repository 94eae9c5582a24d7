// crates/fanout-bus-core/src/channel.rs
// ============================================================================
// Module: Fanout Bus Channel References
// Description: Composite identifiers for logical pub/sub channels.
// Purpose: Provide validated channel keys and host-based resolution.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`ChannelReference`] names a logical channel by namespace and name. The
//! ingress resolves it from the first two DNS labels of the request host
//! (`<name>.<namespace>[.<suffix>][:port]`), so neither part may contain a dot.
//! Invariants:
//! - Both parts are non-empty and at most [`MAX_CHANNEL_PART_LENGTH`] bytes.
//! - Both parts are stored lowercase, matching case-insensitive host lookup.
//! - Ordering is by namespace, then name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a channel name or namespace in bytes.
pub const MAX_CHANNEL_PART_LENGTH: usize = 253;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when constructing or resolving a channel reference.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelReferenceError {
    /// A required part is empty.
    #[error("channel {0} must not be empty")]
    Empty(&'static str),
    /// A part exceeds the maximum length.
    #[error("channel {field} exceeds {max} bytes")]
    TooLong {
        /// Part label (`name` or `namespace`).
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
    /// A part contains a character that cannot appear in a host label.
    #[error("channel {field} contains invalid character: {value}")]
    InvalidCharacter {
        /// Part label (`name` or `namespace`).
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// The host does not carry a `<name>.<namespace>` prefix.
    #[error("host does not identify a channel: {0}")]
    InvalidHost(String),
}

// ============================================================================
// SECTION: Channel Reference
// ============================================================================

/// Identifies a logical channel by namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelReference {
    /// Namespace owning the channel.
    namespace: String,
    /// Channel name within the namespace.
    name: String,
}

impl ChannelReference {
    /// Creates a validated channel reference.
    ///
    /// Parts are folded to ASCII lowercase, so `Orders` and `orders` name the
    /// same channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelReferenceError`] when either part is empty, too long,
    /// or contains characters that cannot appear in a host label.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, ChannelReferenceError> {
        let namespace = namespace.into().to_ascii_lowercase();
        let name = name.into().to_ascii_lowercase();
        validate_part("namespace", &namespace)?;
        validate_part("name", &name)?;
        Ok(Self {
            namespace,
            name,
        })
    }

    /// Resolves the channel addressed by an inbound request host.
    ///
    /// The host may carry a port and any number of trailing labels; only the
    /// first two labels are significant.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelReferenceError::InvalidHost`] when the host has fewer
    /// than two labels or the labels are not valid channel parts.
    pub fn from_host(host: &str) -> Result<Self, ChannelReferenceError> {
        let trimmed = host.trim();
        let without_port = match trimmed.rsplit_once(':') {
            Some((head, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                head
            }
            _ => trimmed,
        };
        let mut labels = without_port.split('.');
        let (Some(name), Some(namespace)) = (labels.next(), labels.next()) else {
            return Err(ChannelReferenceError::InvalidHost(host.to_string()));
        };
        Self::new(namespace, name)
            .map_err(|_| ChannelReferenceError::InvalidHost(host.to_string()))
    }

    /// Returns the channel namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ChannelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl Serialize for ChannelReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Validates a single channel part.
fn validate_part(field: &'static str, value: &str) -> Result<(), ChannelReferenceError> {
    if value.is_empty() {
        return Err(ChannelReferenceError::Empty(field));
    }
    if value.len() > MAX_CHANNEL_PART_LENGTH {
        return Err(ChannelReferenceError::TooLong {
            field,
            max: MAX_CHANNEL_PART_LENGTH,
        });
    }
    if value.chars().any(|ch| ch == '.' || ch == '/' || ch == ':' || ch.is_whitespace()) {
        return Err(ChannelReferenceError::InvalidCharacter {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
