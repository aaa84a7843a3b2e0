//! Pending-callback table keyed by request id.
//!
//! Each entry is a one-shot: [`resolve`](PendingTable::resolve) removes the
//! entry and hands its callback back exactly once.  A second reply carrying
//! the same id finds nothing and is ignored by the table.
//!
//! The table is generic over the callback type so the core stays free of any
//! particular async runtime.  The manager in `wall-remote` stores either a
//! boxed closure or a oneshot sender here.

use std::collections::HashMap;
use std::time::Instant;

use crate::protocol::RequestId;

struct PendingEntry<C> {
    callback: C,
    deadline: Option<Instant>,
}

/// Map from outstanding request id to the callback waiting for its reply.
pub struct PendingTable<C> {
    entries: HashMap<RequestId, PendingEntry<C>>,
}

impl<C> PendingTable<C> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers `callback` for `id`.
    ///
    /// Ids come from a counter that never repeats, so an existing entry for
    /// the same id would indicate a bug in the caller; the newer callback wins.
    pub fn register(&mut self, id: RequestId, callback: C, deadline: Option<Instant>) {
        if self
            .entries
            .insert(id, PendingEntry { callback, deadline })
            .is_some()
        {
            tracing::warn!("request id {id} registered twice; previous callback dropped");
        }
    }

    /// Removes and returns the callback for `id`, if one is pending.
    pub fn resolve(&mut self, id: RequestId) -> Option<C> {
        self.entries.remove(&id).map(|entry| entry.callback)
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest deadline among pending entries.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().filter_map(|e| e.deadline).min()
    }

    /// Removes every entry whose deadline is at or before `now`, oldest id
    /// first.
    pub fn expire(&mut self, now: Instant) -> Vec<(RequestId, C)> {
        let mut due: Vec<RequestId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.deadline.is_some_and(|d| d <= now))
            .map(|(id, _)| *id)
            .collect();
        due.sort_unstable();
        due.into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|e| (id, e.callback)))
            .collect()
    }

    /// Empties the table, oldest id first.
    pub fn drain(&mut self) -> Vec<(RequestId, C)> {
        let mut all: Vec<(RequestId, C)> = self
            .entries
            .drain()
            .map(|(id, e)| (id, e.callback))
            .collect();
        all.sort_unstable_by_key(|(id, _)| *id);
        all
    }
}

impl<C> Default for PendingTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for PendingTable<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTable")
            .field("pending", &self.entries.len())
            .finish()
    }
}
