//! Deterministic in-memory sync server
//!
//! [`MemoryServer`] answers requests the way a real server would: it keeps
//! one version of every item with a per-item logical time, accepts a client
//! change only when it is based on the current time, and reports every other
//! difference back to the client. Clones share one state, so several clients
//! can sync against the same server.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tidesync_merge::{ClientAddition, SyncResponse, Timed};
use tidesync_sync::{FileSyncRequest, FileSyncResponse, ServerCodec, SyncFile, SyncTransport};
use tidesync_types::{Error, ItemId, Result, ServerIdentity, ServerTime};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::debug;

#[derive(Debug)]
struct ServerState {
    identity: ServerIdentity,
    generation: u128,
    items: BTreeMap<ItemId, Timed<SyncFile>>,
    next_id: u128,
    requests: usize,
}

impl ServerState {
    fn new(identity: ServerIdentity, generation: u128) -> Self {
        Self {
            identity,
            generation,
            items: BTreeMap::new(),
            next_id: 1,
            requests: 0,
        }
    }

    fn allocate_id(&mut self) -> ItemId {
        let id = ItemId::from_u128(self.next_id);
        self.next_id += 1;
        id
    }

    fn process(&mut self, request: FileSyncRequest) -> FileSyncResponse {
        self.requests += 1;
        let mut response = SyncResponse::empty();
        let mut mentioned = BTreeSet::new();

        for (id, client_time) in request.known_items {
            mentioned.insert(id);
            match self.items.get(&id) {
                None => {
                    response.server_deleted.insert(id);
                }
                Some(current) if current.time != client_time => {
                    response.server_changed.insert(id, current.clone());
                }
                Some(_) => {}
            }
        }

        for (id, changed) in request.known_but_changed_items {
            mentioned.insert(id);
            match self.items.get_mut(&id) {
                None => {
                    response.conflicts_server_deleted.insert(id);
                }
                Some(current) if current.time == changed.time => {
                    let time = current.time.next();
                    *current = Timed::new(changed.value, time);
                    response.client_changed.insert(id, time);
                }
                Some(current) => {
                    response.conflicts.insert(id, current.clone());
                }
            }
        }

        for (id, client_time) in request.deleted_items {
            mentioned.insert(id);
            match self.items.get(&id) {
                Some(current) if current.time != client_time => {
                    response.conflicts_client_deleted.insert(id, current.clone());
                }
                _ => {
                    self.items.remove(&id);
                    response.client_deleted.insert(id);
                }
            }
        }

        for (id, timed) in &self.items {
            if !mentioned.contains(id) {
                response.server_added.insert(*id, timed.clone());
            }
        }

        for (client_id, value) in request.new_items {
            let id = self.allocate_id();
            let time = ServerTime::initial();
            self.items.insert(id, Timed::new(value, time));
            response.client_added.insert(client_id, ClientAddition { id, time });
        }

        debug!(
            "Server {} answered request {} and now holds {} items",
            self.identity,
            self.requests,
            self.items.len()
        );

        FileSyncResponse {
            server_identity: self.identity,
            items: response,
        }
    }
}

/// Shared handle to an in-memory sync server
#[derive(Debug, Clone)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    /// An empty server with a fixed identity
    pub fn new() -> Self {
        Self::with_identity(ServerIdentity::from_u128(1))
    }

    /// An empty server with the given identity
    pub fn with_identity(identity: ServerIdentity) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState::new(identity, 1))),
        }
    }

    /// Identity reported in every response
    pub async fn identity(&self) -> ServerIdentity {
        self.state.lock().await.identity
    }

    /// Wipe every item and take on a new identity
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let generation = state.generation + 1;
        *state = ServerState::new(ServerIdentity::from_u128(generation), generation);
    }

    /// Stored contents keyed by path
    pub async fn files(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.state
            .lock()
            .await
            .items
            .values()
            .map(|timed| (timed.value.path.clone(), timed.value.contents.clone()))
            .collect()
    }

    /// Stored items with their times
    pub async fn items(&self) -> BTreeMap<ItemId, Timed<SyncFile>> {
        self.state.lock().await.items.clone()
    }

    /// Number of requests answered so far
    pub async fn request_count(&self) -> usize {
        self.state.lock().await.requests
    }

    /// Answer one request
    pub async fn process(&self, request: FileSyncRequest) -> FileSyncResponse {
        self.state.lock().await.process(request)
    }

    /// Answer requests arriving on `listener`, one request per connection
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!("Accepted connection from {}", peer);

            let mut framed = Framed::new(stream, ServerCodec::new());
            let Some(request) = framed.next().await else {
                continue;
            };
            let response = self.process(request?).await;
            framed.send(response).await?;
        }
    }
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncTransport for MemoryServer {
    async fn sync(&mut self, request: FileSyncRequest) -> Result<FileSyncResponse> {
        Ok(self.process(request).await)
    }
}

/// Transport whose every request fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnreachableServer;

#[async_trait]
impl SyncTransport for UnreachableServer {
    async fn sync(&mut self, _request: FileSyncRequest) -> Result<FileSyncResponse> {
        Err(Error::remote("server unreachable"))
    }
}

/// Transport whose requests reach the server but whose first answers are lost
///
/// The server applies each request in full. The first `lost_replies` answers
/// never arrive, as when a connection drops after the server has committed.
#[derive(Debug, Clone)]
pub struct LostReplyServer {
    server: MemoryServer,
    lost_replies: usize,
}

impl LostReplyServer {
    /// Lose the answers to the next `lost_replies` requests sent to `server`
    pub fn new(server: MemoryServer, lost_replies: usize) -> Self {
        Self {
            server,
            lost_replies,
        }
    }
}

#[async_trait]
impl SyncTransport for LostReplyServer {
    async fn sync(&mut self, request: FileSyncRequest) -> Result<FileSyncResponse> {
        let response = self.server.process(request).await;
        if self.lost_replies > 0 {
            self.lost_replies -= 1;
            return Err(Error::remote("connection closed before the answer arrived"));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidesync_types::ClientId;

    fn file(path: &str, contents: &str) -> SyncFile {
        SyncFile::new(path, contents)
    }

    async fn server_with(path: &str, contents: &str) -> (MemoryServer, ItemId) {
        let server = MemoryServer::new();
        let mut request = FileSyncRequest::empty();
        request.new_items.insert(ClientId::new(0), file(path, contents));
        let response = server.process(request).await;
        let id = response.items.client_added[&ClientId::new(0)].id;
        (server, id)
    }

    #[tokio::test]
    async fn test_new_items_get_ids_and_initial_time() {
        let (server, id) = server_with("a.txt", "alpha").await;

        let items = server.items().await;
        assert_eq!(items[&id].time, ServerTime::initial());
        assert_eq!(items[&id].value, file("a.txt", "alpha"));
    }

    #[tokio::test]
    async fn test_empty_request_downloads_everything() {
        let (server, id) = server_with("a.txt", "alpha").await;

        let response = server.process(FileSyncRequest::empty()).await;

        assert_eq!(response.items.server_added.len(), 1);
        assert!(response.items.server_added.contains_key(&id));
    }

    #[tokio::test]
    async fn test_change_based_on_current_time_is_accepted() {
        let (server, id) = server_with("a.txt", "alpha").await;

        let mut request = FileSyncRequest::empty();
        request
            .known_but_changed_items
            .insert(id, Timed::new(file("a.txt", "beta"), ServerTime::initial()));
        let response = server.process(request).await;

        assert_eq!(
            response.items.client_changed.get(&id),
            Some(&ServerTime::new(1))
        );
        assert_eq!(server.items().await[&id].value, file("a.txt", "beta"));
    }

    #[tokio::test]
    async fn test_stale_change_is_a_conflict() {
        let (server, id) = server_with("a.txt", "alpha").await;
        let mut first = FileSyncRequest::empty();
        first
            .known_but_changed_items
            .insert(id, Timed::new(file("a.txt", "first"), ServerTime::initial()));
        server.process(first).await;

        let mut second = FileSyncRequest::empty();
        second
            .known_but_changed_items
            .insert(id, Timed::new(file("a.txt", "second"), ServerTime::initial()));
        let response = server.process(second).await;

        assert_eq!(
            response.items.conflicts.get(&id).map(|timed| &timed.value),
            Some(&file("a.txt", "first"))
        );
    }

    #[tokio::test]
    async fn test_stale_deletion_is_a_conflict() {
        let (server, id) = server_with("a.txt", "alpha").await;
        let mut change = FileSyncRequest::empty();
        change
            .known_but_changed_items
            .insert(id, Timed::new(file("a.txt", "beta"), ServerTime::initial()));
        server.process(change).await;

        let mut delete = FileSyncRequest::empty();
        delete.deleted_items.insert(id, ServerTime::initial());
        let response = server.process(delete).await;

        assert!(response.items.conflicts_client_deleted.contains_key(&id));
        assert!(server.items().await.contains_key(&id));
    }

    #[tokio::test]
    async fn test_lost_reply_still_changes_the_server() {
        let server = MemoryServer::new();
        let mut transport = LostReplyServer::new(server.clone(), 1);
        let mut request = FileSyncRequest::empty();
        request.new_items.insert(ClientId::new(0), file("a.txt", "alpha"));

        assert!(transport.sync(request).await.is_err());
        assert_eq!(server.items().await.len(), 1);
        assert!(transport.sync(FileSyncRequest::empty()).await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_changes_identity_and_forgets_items() {
        let (server, _) = server_with("a.txt", "alpha").await;
        let before = server.identity().await;

        server.reset().await;

        assert_ne!(server.identity().await, before);
        assert!(server.files().await.is_empty());
    }
}
