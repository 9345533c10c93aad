//! Request and response exchanged with the server in one sync round

use crate::Timed;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tidesync_types::ServerTime;

/// What the client tells the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Serialize, S: Serialize, A: Serialize",
    deserialize = "C: Ord + Deserialize<'de>, S: Ord + Deserialize<'de>, A: Deserialize<'de>"
))]
pub struct SyncRequest<C, S, A> {
    /// Items to create on the server
    pub new_items: BTreeMap<C, A>,
    /// Items the client holds unchanged, with the time it holds them at
    pub known_items: BTreeMap<S, ServerTime>,
    /// Changed items, with the time the change is based on
    pub known_but_changed_items: BTreeMap<S, Timed<A>>,
    /// Deleted items, with the time the deletion is based on
    pub deleted_items: BTreeMap<S, ServerTime>,
}

impl<C: Ord, S: Ord, A> SyncRequest<C, S, A> {
    /// Request of a client that has nothing at all
    pub const fn empty() -> Self {
        Self {
            new_items: BTreeMap::new(),
            known_items: BTreeMap::new(),
            known_but_changed_items: BTreeMap::new(),
            deleted_items: BTreeMap::new(),
        }
    }

    /// Whether the request carries nothing
    pub fn is_empty(&self) -> bool {
        self.new_items.is_empty()
            && self.known_items.is_empty()
            && self.known_but_changed_items.is_empty()
            && self.deleted_items.is_empty()
    }
}

impl<C: Ord, S: Ord, A> Default for SyncRequest<C, S, A> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Server acknowledgement of a client-created item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAddition<S> {
    /// Identifier the server assigned
    pub id: S,
    /// Time of the stored version
    pub time: ServerTime,
}

/// What the server answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Serialize, S: Serialize, A: Serialize",
    deserialize = "C: Ord + Deserialize<'de>, S: Ord + Deserialize<'de>, A: Deserialize<'de>"
))]
pub struct SyncResponse<C, S, A> {
    /// Client additions that were accepted
    pub client_added: BTreeMap<C, ClientAddition<S>>,
    /// Client changes that were accepted, with their new time
    pub client_changed: BTreeMap<S, ServerTime>,
    /// Client deletions that were accepted
    pub client_deleted: BTreeSet<S>,
    /// Items the client did not know about
    pub server_added: BTreeMap<S, Timed<A>>,
    /// Items that changed on the server since the client's known time
    pub server_changed: BTreeMap<S, Timed<A>>,
    /// Items that were deleted on the server
    pub server_deleted: BTreeSet<S>,
    /// Both sides changed the item; carries the server version
    pub conflicts: BTreeMap<S, Timed<A>>,
    /// The client deleted an item the server changed; carries the server version
    pub conflicts_client_deleted: BTreeMap<S, Timed<A>>,
    /// The client changed an item the server deleted
    pub conflicts_server_deleted: BTreeSet<S>,
}

impl<C: Ord, S: Ord, A> SyncResponse<C, S, A> {
    /// Response that changes nothing
    pub const fn empty() -> Self {
        Self {
            client_added: BTreeMap::new(),
            client_changed: BTreeMap::new(),
            client_deleted: BTreeSet::new(),
            server_added: BTreeMap::new(),
            server_changed: BTreeMap::new(),
            server_deleted: BTreeSet::new(),
            conflicts: BTreeMap::new(),
            conflicts_client_deleted: BTreeMap::new(),
            conflicts_server_deleted: BTreeSet::new(),
        }
    }

    /// Number of conflicts of any kind
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
            + self.conflicts_client_deleted.len()
            + self.conflicts_server_deleted.len()
    }

    /// Whether the response carries nothing
    pub fn is_empty(&self) -> bool {
        self.client_added.is_empty()
            && self.client_changed.is_empty()
            && self.client_deleted.is_empty()
            && self.server_added.is_empty()
            && self.server_changed.is_empty()
            && self.server_deleted.is_empty()
            && self.conflict_count() == 0
    }
}

impl<C: Ord, S: Ord, A> Default for SyncResponse<C, S, A> {
    fn default() -> Self {
        Self::empty()
    }
}
