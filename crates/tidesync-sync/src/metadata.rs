//! The metadata file: what the client last agreed with the server
//!
//! On disk the metadata is a pretty-printed JSON document so it can be read
//! and diffed by hand:
//!
//! ```json
//! {
//!   "server_identity": "7b0c…",
//!   "items": [
//!     {
//!       "relative_path": "notes/todo.txt",
//!       "item_id": "1f9e…",
//!       "content_hash": 1234567890,
//!       "synced_at": 3
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tidesync_types::{Error, ItemId, Result, ServerIdentity, ServerTime};
use tokio::fs;
use tracing::{debug, info};

/// What is recorded about one synced file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncFileMeta {
    /// Server-assigned identifier
    pub item_id: ItemId,
    /// Hash of the contents at the time of the sync
    pub content_hash: u64,
    /// Server time the contents were synced at
    pub synced_at: ServerTime,
}

/// Recorded state of the last successful sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMetadata {
    /// Server the recorded times belong to
    pub server_identity: ServerIdentity,
    /// Synced files keyed by relative path
    pub items: BTreeMap<PathBuf, SyncFileMeta>,
}

impl ClientMetadata {
    /// Metadata with no synced files
    pub fn new(server_identity: ServerIdentity) -> Self {
        Self {
            server_identity,
            items: BTreeMap::new(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetadataDocument {
    server_identity: ServerIdentity,
    items: Vec<MetadataEntry>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetadataEntry {
    relative_path: PathBuf,
    item_id: ItemId,
    content_hash: u64,
    synced_at: ServerTime,
}

impl From<&ClientMetadata> for MetadataDocument {
    fn from(metadata: &ClientMetadata) -> Self {
        Self {
            server_identity: metadata.server_identity,
            items: metadata
                .items
                .iter()
                .map(|(path, meta)| MetadataEntry {
                    relative_path: path.clone(),
                    item_id: meta.item_id,
                    content_hash: meta.content_hash,
                    synced_at: meta.synced_at,
                })
                .collect(),
        }
    }
}

impl TryFrom<MetadataDocument> for ClientMetadata {
    type Error = String;

    fn try_from(document: MetadataDocument) -> std::result::Result<Self, Self::Error> {
        let mut items = BTreeMap::new();
        for entry in document.items {
            let meta = SyncFileMeta {
                item_id: entry.item_id,
                content_hash: entry.content_hash,
                synced_at: entry.synced_at,
            };
            if items.insert(entry.relative_path.clone(), meta).is_some() {
                return Err(format!(
                    "duplicate entry for path '{}'",
                    entry.relative_path.display()
                ));
            }
        }

        Ok(Self {
            server_identity: document.server_identity,
            items,
        })
    }
}

/// Load the metadata file, or `None` when there is none yet
pub async fn load_metadata<P: AsRef<Path>>(path: P) -> Result<Option<ClientMetadata>> {
    let path = path.as_ref();

    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No metadata file at '{}'", path.display());
            return Ok(None);
        }
        Err(e) => {
            return Err(Error::Io {
                message: format!("Failed to read metadata file '{}': {}", path.display(), e),
            })
        }
    };

    let malformed = |message: String| Error::MalformedMetadata {
        path: path.to_path_buf(),
        message,
    };
    let document: MetadataDocument =
        serde_json::from_str(&text).map_err(|e| malformed(e.to_string()))?;
    let metadata = ClientMetadata::try_from(document).map_err(malformed)?;

    info!(
        "Loaded metadata for {} items from '{}'",
        metadata.items.len(),
        path.display()
    );
    Ok(Some(metadata))
}

/// Write the metadata file, replacing any previous one
pub async fn save_metadata<P: AsRef<Path>>(path: P, metadata: &ClientMetadata) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|e| Error::Io {
            message: format!("Failed to create directory '{}': {}", parent.display(), e),
        })?;
    }

    let mut text = serde_json::to_string_pretty(&MetadataDocument::from(metadata))
        .map_err(|e| Error::other(format!("Failed to serialize metadata: {}", e)))?;
    text.push('\n');

    fs::write(path, text).await.map_err(|e| Error::Io {
        message: format!("Failed to write metadata file '{}': {}", path.display(), e),
    })?;

    debug!(
        "Saved metadata for {} items to '{}'",
        metadata.items.len(),
        path.display()
    );
    Ok(())
}
