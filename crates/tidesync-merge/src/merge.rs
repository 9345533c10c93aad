//! Building requests from a store and folding responses back into it

use crate::{ClientStore, SyncRequest, SyncResponse, Timed};
use tracing::{debug, warn};

/// Build the request that reports every group of the store to the server
pub fn make_sync_request<C, S, A>(store: &ClientStore<C, S, A>) -> SyncRequest<C, S, A>
where
    C: Ord + Clone,
    S: Ord + Clone,
    A: Clone,
{
    SyncRequest {
        new_items: store.added.clone(),
        known_items: store
            .synced
            .iter()
            .map(|(id, timed)| (id.clone(), timed.time))
            .collect(),
        known_but_changed_items: store.synced_but_changed.clone(),
        deleted_items: store.deleted.clone(),
    }
}

/// Apply a server response to the store, taking the server's side in conflicts
///
/// - accepted additions move from *added* to *synced* under their new id
/// - accepted changes and deletions leave the transient groups
/// - server-side additions and changes land in *synced*
/// - server-side deletions leave *synced*
/// - conflicts resolve to the server's version; a local change to an item the
///   server deleted is dropped
///
/// Items the response does not mention keep their group.
pub fn merge_sync_response_from_server<C, S, A>(
    mut store: ClientStore<C, S, A>,
    response: SyncResponse<C, S, A>,
) -> ClientStore<C, S, A>
where
    C: Ord + std::fmt::Debug,
    S: Ord + std::fmt::Debug,
{
    for (client_id, addition) in response.client_added {
        match store.added.remove(&client_id) {
            Some(value) => store.insert_synced(addition.id, Timed::new(value, addition.time)),
            None => warn!(
                "Server acknowledged unknown client addition {:?} as {:?}",
                client_id, addition.id
            ),
        }
    }

    for (id, time) in response.client_changed {
        match store.synced_but_changed.remove(&id) {
            Some(timed) => store.insert_synced(id, Timed::new(timed.value, time)),
            None => warn!("Server acknowledged unknown client change {:?}", id),
        }
    }

    for id in response.client_deleted {
        store.deleted.remove(&id);
    }

    for (id, timed) in response.server_added {
        store.insert_synced(id, timed);
    }

    for (id, timed) in response.server_changed {
        store.insert_synced(id, timed);
    }

    for id in response.server_deleted {
        store.forget(&id);
    }

    for (id, timed) in response.conflicts {
        debug!("Conflict on {:?}: keeping the server version", id);
        store.insert_synced(id, timed);
    }

    for (id, timed) in response.conflicts_client_deleted {
        debug!("Conflict on {:?}: restoring item the client deleted", id);
        store.insert_synced(id, timed);
    }

    for id in response.conflicts_server_deleted {
        debug!("Conflict on {:?}: dropping change to item the server deleted", id);
        store.forget(&id);
    }

    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientAddition;
    use tidesync_types::ServerTime;

    type Store = ClientStore<u64, u64, String>;
    type Response = SyncResponse<u64, u64, String>;

    fn timed(value: &str, time: u64) -> Timed<String> {
        Timed::new(value.to_string(), ServerTime::new(time))
    }

    #[test]
    fn test_request_mirrors_store_groups() {
        let store = Store::empty()
            .with_item_added(0, "new".to_string())
            .with_item_synced(10, timed("same", 3))
            .with_item_changed(11, timed("edited", 4))
            .with_item_marked_deleted(12, ServerTime::new(5));

        let request = make_sync_request(&store);

        assert_eq!(request.new_items.get(&0).map(String::as_str), Some("new"));
        assert_eq!(request.known_items.get(&10), Some(&ServerTime::new(3)));
        assert_eq!(request.known_but_changed_items.get(&11), Some(&timed("edited", 4)));
        assert_eq!(request.deleted_items.get(&12), Some(&ServerTime::new(5)));
    }

    #[test]
    fn test_empty_store_makes_empty_request() {
        assert!(make_sync_request(&Store::empty()).is_empty());
    }

    #[test]
    fn test_accepted_client_changes_clear_transient_groups() {
        let store = Store::empty()
            .with_item_added(0, "new".to_string())
            .with_item_changed(11, timed("edited", 4))
            .with_item_marked_deleted(12, ServerTime::new(5));

        let mut response = Response::empty();
        response.client_added.insert(
            0,
            ClientAddition {
                id: 20,
                time: ServerTime::initial(),
            },
        );
        response.client_changed.insert(11, ServerTime::new(5));
        response.client_deleted.insert(12);

        let merged = merge_sync_response_from_server(store, response);

        assert!(!merged.has_pending_changes());
        assert_eq!(merged.synced().get(&20), Some(&timed("new", 0)));
        assert_eq!(merged.synced().get(&11), Some(&timed("edited", 5)));
        assert_eq!(merged.synced().len(), 2);
    }

    #[test]
    fn test_server_side_changes_are_applied() {
        let store = Store::empty()
            .with_item_synced(1, timed("old", 0))
            .with_item_synced(2, timed("gone", 0));

        let mut response = Response::empty();
        response.server_added.insert(3, timed("fresh", 0));
        response.server_changed.insert(1, timed("newer", 1));
        response.server_deleted.insert(2);

        let merged = merge_sync_response_from_server(store, response);

        assert_eq!(merged.synced().get(&1), Some(&timed("newer", 1)));
        assert_eq!(merged.synced().get(&3), Some(&timed("fresh", 0)));
        assert!(!merged.synced().contains_key(&2));
    }

    #[test]
    fn test_conflicts_take_server_side() {
        let store = Store::empty()
            .with_item_changed(1, timed("mine", 0))
            .with_item_marked_deleted(2, ServerTime::new(0))
            .with_item_changed(3, timed("mine too", 0));

        let mut response = Response::empty();
        response.conflicts.insert(1, timed("theirs", 1));
        response.conflicts_client_deleted.insert(2, timed("revived", 1));
        response.conflicts_server_deleted.insert(3);
        assert_eq!(response.conflict_count(), 3);

        let merged = merge_sync_response_from_server(store, response);

        assert!(!merged.has_pending_changes());
        assert_eq!(merged.synced().get(&1), Some(&timed("theirs", 1)));
        assert_eq!(merged.synced().get(&2), Some(&timed("revived", 1)));
        assert!(!merged.synced().contains_key(&3));
    }

    #[test]
    fn test_unmentioned_items_keep_their_group() {
        let store = Store::empty()
            .with_item_synced(1, timed("a", 0))
            .with_item_added(0, "pending".to_string());

        let merged = merge_sync_response_from_server(store.clone(), Response::empty());
        assert_eq!(merged, store);
    }

    #[test]
    fn test_wire_format_round_trips() {
        let mut response = Response::empty();
        response.server_added.insert(7, timed("x", 2));
        response.client_deleted.insert(9);

        let json = serde_json::to_string(&response).unwrap();
        let decoded: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, response);
    }
}
