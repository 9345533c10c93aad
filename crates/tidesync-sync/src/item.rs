//! The synchronized item and the store and wire types built around it

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tidesync_merge::{ClientStore, SyncRequest, SyncResponse};
use tidesync_types::{ClientId, ItemId, ServerIdentity};

/// One synchronized file: its path relative to the contents directory and its bytes
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFile {
    /// Path relative to the contents directory
    pub path: PathBuf,
    /// Raw file contents
    pub contents: Vec<u8>,
}

impl SyncFile {
    /// Create a sync file
    pub fn new<P: Into<PathBuf>, B: Into<Vec<u8>>>(path: P, contents: B) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

// Contents can be large; debug traces show the path and the size only.
impl fmt::Debug for SyncFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncFile")
            .field("path", &self.path)
            .field("bytes", &self.contents.len())
            .finish()
    }
}

/// Client store of synchronized files
pub type FileStore = ClientStore<ClientId, ItemId, SyncFile>;

/// Request sent to the sync endpoint
pub type FileSyncRequest = SyncRequest<ClientId, ItemId, SyncFile>;

/// Response received from the sync endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSyncResponse {
    /// Identity of the server that produced the response
    pub server_identity: ServerIdentity,
    /// Per-item outcomes
    pub items: SyncResponse<ClientId, ItemId, SyncFile>,
}

/// A file store together with the identity of the server it is synced with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileClientStore {
    /// Server the store's logical times belong to
    pub server_identity: ServerIdentity,
    /// The four-way partitioned store
    pub store: FileStore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_contents() {
        let file = SyncFile::new("notes/todo.txt", "buy milk");
        let rendered = format!("{:?}", file);

        assert!(rendered.contains("todo.txt"));
        assert!(rendered.contains("bytes: 8"));
        assert!(!rendered.contains("milk"));
    }
}
