// crates/fanout-bus-core/src/diff.rs
// ============================================================================
// Module: Fanout Bus Config Diff
// Description: Structural comparison between two routing tables.
// Purpose: Let callers skip no-op swaps and report what a swap changes.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`ConfigDiff`] compares routing tables by channel reference and by the
//! multiset of subscriptions per channel. Declaration order of channels and
//! subscriptions never produces a difference.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::channel::ChannelReference;
use crate::config::ChannelConfig;
use crate::config::FanoutConfig;

// ============================================================================
// SECTION: Config Diff
// ============================================================================

/// Channels added, removed, or changed between two routing tables.
///
/// # Invariants
/// - Each list is sorted and free of duplicates.
/// - A channel appears in at most one list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigDiff {
    /// Channels present only in the candidate table.
    pub added: Vec<ChannelReference>,
    /// Channels present only in the current table.
    pub removed: Vec<ChannelReference>,
    /// Channels present in both with different subscriptions.
    pub changed: Vec<ChannelReference>,
}

impl ConfigDiff {
    /// Computes the difference from `current` to `candidate`.
    #[must_use]
    pub fn between(current: &FanoutConfig, candidate: &FanoutConfig) -> Self {
        let current_index = index(current);
        let candidate_index = index(candidate);
        let mut diff = Self::default();
        for (channel, entry) in &candidate_index {
            match current_index.get(channel) {
                None => diff.added.push((*channel).clone()),
                Some(existing) if !existing.same_subscriptions(entry) => {
                    diff.changed.push((*channel).clone());
                }
                Some(_) => {}
            }
        }
        for channel in current_index.keys() {
            if !candidate_index.contains_key(channel) {
                diff.removed.push((*channel).clone());
            }
        }
        diff
    }

    /// Returns true when the tables are structurally equal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

impl fmt::Display for ConfigDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no changes");
        }
        let mut lines = Vec::new();
        lines.extend(self.added.iter().map(|channel| format!("+ {channel}")));
        lines.extend(self.removed.iter().map(|channel| format!("- {channel}")));
        lines.extend(self.changed.iter().map(|channel| format!("~ {channel}")));
        f.write_str(&lines.join("\n"))
    }
}

/// Indexes channel entries by reference.
fn index(config: &FanoutConfig) -> BTreeMap<&ChannelReference, &ChannelConfig> {
    config.channels().iter().map(|entry| (entry.channel(), entry)).collect()
}
