//! Separating items the server holds at one path
//!
//! Two clients can create the same path before either has seen the other's
//! file, and a round whose answer never arrived uploads its additions again.
//! Either way the server ends up with several items at one path, which a
//! directory cannot hold. [`separate_path_collisions`] keeps one of them at
//! the path and turns the others into pending changes, so a follow-up request
//! settles the server too.

use crate::item::{FileStore, SyncFile};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tidesync_merge::Timed;
use tidesync_types::{ItemId, ServerTime};
use tracing::warn;

/// Resolve synced items that share a path
///
/// The item with the latest time keeps the path, ties going to the larger
/// id. Every other item at that path is marked deleted when its contents
/// equal the kept item's, and is otherwise moved to its
/// [conflict copy path](conflict_copy_path). Items that are not synced are
/// left alone.
pub fn separate_path_collisions(store: FileStore) -> FileStore {
    let mut deletions: Vec<(ItemId, ServerTime)> = Vec::new();
    let mut copies: Vec<(ItemId, Timed<SyncFile>)> = Vec::new();

    let mut by_path: BTreeMap<&Path, Vec<(&ItemId, &Timed<SyncFile>)>> = BTreeMap::new();
    for (id, timed) in store.synced() {
        by_path
            .entry(timed.value.path.as_path())
            .or_default()
            .push((id, timed));
    }

    for (path, mut items) in by_path {
        items.sort_by_key(|(id, timed)| (timed.time, **id));
        let Some((kept_id, kept)) = items.pop() else {
            continue;
        };

        for (id, timed) in items {
            if timed.value.contents == kept.value.contents {
                warn!(
                    "'{}' is stored twice on the server, removing the duplicate {}",
                    path.display(),
                    id
                );
                deletions.push((*id, timed.time));
            } else {
                let copy = conflict_copy_path(path, id);
                warn!(
                    "'{}' was created on more than one client, keeping {} and moving {} to '{}'",
                    path.display(),
                    kept_id,
                    id,
                    copy.display()
                );
                copies.push((
                    *id,
                    Timed::new(SyncFile::new(copy, timed.value.contents.clone()), timed.time),
                ));
            }
        }
    }

    let store = deletions
        .into_iter()
        .fold(store, |store, (id, time)| store.with_item_marked_deleted(id, time));
    copies
        .into_iter()
        .fold(store, |store, (id, timed)| store.with_item_changed(id, timed))
}

/// Where the displaced item `id` goes when another item keeps `path`
///
/// `notes/todo.txt` becomes `notes/todo (conflict <id>).txt`.
pub fn conflict_copy_path(path: &Path, id: &ItemId) -> PathBuf {
    let mut name = path.file_stem().map(OsString::from).unwrap_or_default();
    name.push(format!(" (conflict {})", id.as_uuid().simple()));
    if let Some(extension) = path.extension() {
        name.push(".");
        name.push(extension);
    }
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn id(n: u128) -> ItemId {
        ItemId::from_u128(n)
    }

    fn timed(path: &str, contents: &str, time: u64) -> Timed<SyncFile> {
        Timed::new(SyncFile::new(path, contents), ServerTime::new(time))
    }

    #[test]
    fn test_distinct_paths_are_untouched() {
        let store = FileStore::empty()
            .with_item_synced(id(1), timed("a.txt", "alpha", 0))
            .with_item_synced(id(2), timed("b.txt", "alpha", 0));

        let separated = separate_path_collisions(store.clone());

        assert_eq!(separated, store);
        assert!(!separated.has_pending_changes());
    }

    #[test]
    fn test_identical_duplicate_is_deleted() {
        let store = FileStore::empty()
            .with_item_synced(id(2), timed("b.txt", "beta", 0))
            .with_item_synced(id(3), timed("b.txt", "beta", 0));

        let separated = separate_path_collisions(store);

        assert!(separated.synced().contains_key(&id(3)));
        assert_eq!(separated.deleted().get(&id(2)), Some(&ServerTime::new(0)));
        assert!(separated.synced_but_changed().is_empty());
    }

    #[test]
    fn test_differing_item_moves_to_conflict_copy() {
        let store = FileStore::empty()
            .with_item_synced(id(2), timed("new.txt", "from first", 0))
            .with_item_synced(id(3), timed("new.txt", "from second", 0));

        let separated = separate_path_collisions(store);

        assert_eq!(
            separated.synced()[&id(3)].value,
            SyncFile::new("new.txt", "from second")
        );
        let moved = &separated.synced_but_changed()[&id(2)];
        assert_eq!(moved.value.path, conflict_copy_path(Path::new("new.txt"), &id(2)));
        assert_eq!(moved.value.contents, b"from first");
        assert_eq!(moved.time, ServerTime::new(0));
        assert!(separated.deleted().is_empty());
    }

    #[test]
    fn test_latest_time_keeps_the_path() {
        let store = FileStore::empty()
            .with_item_synced(id(1), timed("x.md", "edited", 4))
            .with_item_synced(id(9), timed("x.md", "fresh", 0))
            .with_item_synced(id(5), timed("x.md", "fresh", 0));

        let separated = separate_path_collisions(store);

        assert_eq!(separated.synced().len(), 1);
        assert!(separated.synced().contains_key(&id(1)));
        assert!(separated.synced_but_changed().contains_key(&id(9)));
        assert!(separated.synced_but_changed().contains_key(&id(5)));

        let paths: Vec<_> = separated
            .synced_but_changed()
            .values()
            .map(|timed| timed.value.path.clone())
            .collect();
        assert_ne!(paths[0], paths[1]);
    }

    #[rstest]
    #[case("new.txt", "new (conflict 0000000000000000000000000000002a).txt")]
    #[case("dir/notes.md", "dir/notes (conflict 0000000000000000000000000000002a).md")]
    #[case(".env", ".env (conflict 0000000000000000000000000000002a)")]
    #[case("README", "README (conflict 0000000000000000000000000000002a)")]
    fn test_conflict_copy_path(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(
            conflict_copy_path(Path::new(path), &id(42)),
            PathBuf::from(expected)
        );
    }
}
