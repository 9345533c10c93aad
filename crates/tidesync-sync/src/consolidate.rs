//! Consolidation: reconciling the files on disk with what was last synced
//!
//! Both entry points turn "what is on disk now" plus "what the server and the
//! client last agreed on" into a four-way [`FileStore`] that can be handed to
//! the merge primitive.

use crate::content::ContentMap;
use crate::hash::content_hash;
use crate::item::{FileStore, SyncFile};
use crate::metadata::SyncFileMeta;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tidesync_merge::Timed;
use tidesync_types::{ClientId, Error, Result};
use tracing::debug;

/// Fold local files into the store produced by an initial sync
///
/// `store` must hold synced items only, as it does right after the server's
/// first response was merged into an empty store. For each synced item:
///
/// - no local file at its path: the item stays synced and will be written out
/// - a byte-identical local file: the item stays synced
/// - a different local file: the item becomes synced-but-changed, carrying
///   the local contents, because the path already has a server identity
///
/// Local files at paths the server does not know become added items.
pub fn consolidate_initial(store: FileStore, files: ContentMap) -> Result<FileStore> {
    if store.has_pending_changes() {
        return Err(Error::invariant(format!(
            "initial sync store must hold only synced items, found {} added, {} changed, {} deleted",
            store.added().len(),
            store.synced_but_changed().len(),
            store.deleted().len()
        )));
    }

    let mut remaining = files;
    let mut consolidated = FileStore::empty();

    for (id, timed) in store.synced() {
        consolidated = match remaining.remove(&timed.value.path) {
            Some(local) if local != timed.value.contents => {
                debug!("{} differs from the server version", timed.value.path.display());
                let changed = SyncFile::new(timed.value.path.clone(), local);
                consolidated.with_item_changed(*id, Timed::new(changed, timed.time))
            }
            _ => consolidated.with_item_synced(*id, timed.clone()),
        };
    }

    Ok(with_new_files(consolidated, remaining))
}

/// Build the store from recorded metadata and the files on disk
///
/// - recorded path with no local file: deleted, with its recorded time
/// - recorded path whose contents hash matches: synced, with current contents
/// - recorded path whose contents hash differs: synced-but-changed
/// - local file with no record: added
///
/// Fails when two recorded paths claim the same item id.
pub fn consolidate_with_metadata(
    items: &BTreeMap<PathBuf, SyncFileMeta>,
    files: ContentMap,
) -> Result<FileStore> {
    let mut seen = BTreeSet::new();
    let mut remaining = files;
    let mut store = FileStore::empty();

    for (path, meta) in items {
        if !seen.insert(meta.item_id) {
            return Err(Error::invariant(format!(
                "item {} is recorded for more than one path, second at '{}'",
                meta.item_id,
                path.display()
            )));
        }

        store = match remaining.remove(path) {
            None => {
                debug!("{} was deleted locally", path.display());
                store.with_item_marked_deleted(meta.item_id, meta.synced_at)
            }
            Some(contents) => {
                let unchanged = content_hash(&contents) == meta.content_hash;
                let timed = Timed::new(SyncFile::new(path.clone(), contents), meta.synced_at);
                if unchanged {
                    store.with_item_synced(meta.item_id, timed)
                } else {
                    debug!("{} was changed locally", path.display());
                    store.with_item_changed(meta.item_id, timed)
                }
            }
        };
    }

    Ok(with_new_files(store, remaining))
}

fn with_new_files(store: FileStore, files: ContentMap) -> FileStore {
    let mut next_id = ClientId::default();
    files.into_iter().fold(store, |store, (path, contents)| {
        debug!("{} is new", path.display());
        let client_id = next_id;
        next_id = next_id.next();
        store.with_item_added(client_id, SyncFile::new(path, contents))
    })
}
