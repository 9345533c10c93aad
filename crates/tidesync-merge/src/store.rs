//! The four-way partitioned client store

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use tidesync_types::ServerTime;

/// A value tagged with the server time it was last synced at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timed<T> {
    /// The synced value
    pub value: T,
    /// Server time of the value
    pub time: ServerTime,
}

impl<T> Timed<T> {
    /// Tag a value with a server time
    pub const fn new(value: T, time: ServerTime) -> Self {
        Self { value, time }
    }
}

/// Client-side working set of a three-way merge
///
/// Items live in exactly one of four groups:
///
/// - *added*: created locally, never seen by the server, keyed by a client id `C`
/// - *synced*: identical to the server's version at the recorded time
/// - *synced but changed*: known to the server, modified locally since
/// - *deleted*: known to the server, removed locally since
///
/// The store is a value: every transition consumes it and returns the next
/// store, and each transition keeps a server id `S` in at most one of the
/// last three groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStore<C, S, A> {
    pub(crate) added: BTreeMap<C, A>,
    pub(crate) synced: BTreeMap<S, Timed<A>>,
    pub(crate) synced_but_changed: BTreeMap<S, Timed<A>>,
    pub(crate) deleted: BTreeMap<S, ServerTime>,
}

impl<C: Ord, S: Ord, A> Default for ClientStore<C, S, A> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<C: Ord, S: Ord, A> ClientStore<C, S, A> {
    /// The store of a client that has never synced and has nothing locally
    pub const fn empty() -> Self {
        Self {
            added: BTreeMap::new(),
            synced: BTreeMap::new(),
            synced_but_changed: BTreeMap::new(),
            deleted: BTreeMap::new(),
        }
    }

    /// Items created locally and not yet known to the server
    pub fn added(&self) -> &BTreeMap<C, A> {
        &self.added
    }

    /// Items unchanged since they were last synced
    pub fn synced(&self) -> &BTreeMap<S, Timed<A>> {
        &self.synced
    }

    /// Items modified locally since they were last synced
    pub fn synced_but_changed(&self) -> &BTreeMap<S, Timed<A>> {
        &self.synced_but_changed
    }

    /// Items deleted locally since they were last synced
    pub fn deleted(&self) -> &BTreeMap<S, ServerTime> {
        &self.deleted
    }

    /// Whether all four groups are empty
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.synced.is_empty()
            && self.synced_but_changed.is_empty()
            && self.deleted.is_empty()
    }

    /// Whether any local change still waits for the server
    pub fn has_pending_changes(&self) -> bool {
        !(self.added.is_empty() && self.synced_but_changed.is_empty() && self.deleted.is_empty())
    }

    /// Record a locally created item
    #[must_use]
    pub fn with_item_added(mut self, client_id: C, value: A) -> Self {
        self.added.insert(client_id, value);
        self
    }

    /// Record an item as identical to the server's version
    #[must_use]
    pub fn with_item_synced(mut self, id: S, value: Timed<A>) -> Self {
        self.insert_synced(id, value);
        self
    }

    /// Record a local modification of a synced item
    #[must_use]
    pub fn with_item_changed(mut self, id: S, value: Timed<A>) -> Self {
        self.synced.remove(&id);
        self.deleted.remove(&id);
        self.synced_but_changed.insert(id, value);
        self
    }

    /// Record a local deletion of a synced item
    #[must_use]
    pub fn with_item_marked_deleted(mut self, id: S, time: ServerTime) -> Self {
        self.synced.remove(&id);
        self.synced_but_changed.remove(&id);
        self.deleted.insert(id, time);
        self
    }

    pub(crate) fn insert_synced(&mut self, id: S, value: Timed<A>) {
        self.synced_but_changed.remove(&id);
        self.deleted.remove(&id);
        self.synced.insert(id, value);
    }

    pub(crate) fn forget(&mut self, id: &S) {
        self.synced.remove(id);
        self.synced_but_changed.remove(id);
        self.deleted.remove(id);
    }
}
