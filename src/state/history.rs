use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::collections::Collections;

/// An immutable copy of all four collections. Owning its data means later
/// edits to the live store can never reach into a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    collections: Collections,
}

impl Snapshot {
    pub fn capture(collections: &Collections) -> Self {
        Self { collections: collections.clone() }
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    pub fn into_collections(self) -> Collections {
        self.collections
    }
}

/// How `undo` consumes history entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoPolicy {
    /// Drop the last snapshot, then pop the one before it and restore it.
    /// One undo consumes two entries.
    #[default]
    Paired,
    /// Drop the last snapshot and restore the one before it, which stays in
    /// history as the new current state.
    Retain,
}

/// When the application takes its snapshot relative to a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capture {
    Before,
    #[default]
    After,
}

/// Snapshot-based undo history
#[derive(Debug, Default)]
pub struct History {
    entries: VecDeque<Snapshot>,
    capacity: Option<usize>,
    policy: UndoPolicy,
}

impl History {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: None,
            policy: UndoPolicy::Paired,
        }
    }

    /// History holding at most `capacity` snapshots, oldest dropped first
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(2)),
            ..Self::new()
        }
    }

    pub fn with_policy(mut self, policy: UndoPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the stored snapshots (oldest first), keeping capacity and policy
    pub fn restore_entries(&mut self, snapshots: Vec<Snapshot>) {
        self.entries = snapshots.into();
        self.enforce_capacity();
    }

    #[cfg(test)]
    pub fn policy(&self) -> UndoPolicy {
        self.policy
    }

    /// Capture the whole store and append it
    pub fn record(&mut self, collections: &Collections) {
        self.entries.push_back(Snapshot::capture(collections));
        self.enforce_capacity();
        debug!(len = self.entries.len(), "history snapshot recorded");
    }

    /// Undo one action, returning the collections to restore. With fewer
    /// than two entries this is a no-op.
    pub fn undo(&mut self) -> Option<Collections> {
        if !self.can_undo() {
            return None;
        }
        self.entries.pop_back();
        let restored = match self.policy {
            UndoPolicy::Paired => self.entries.pop_back().map(Snapshot::into_collections),
            UndoPolicy::Retain => self.entries.back().map(|s| s.collections().clone()),
        };
        debug!(len = self.entries.len(), policy = ?self.policy, "history undo");
        restored
    }

    pub fn can_undo(&self) -> bool {
        self.entries.len() >= 2
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }

    fn enforce_capacity(&mut self) {
        if let Some(cap) = self.capacity {
            while self.entries.len() > cap {
                self.entries.pop_front();
            }
        }
    }
}
