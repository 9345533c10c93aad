//! Writing a synced store back to disk
//!
//! The contents directory is never edited in place. The complete new tree is
//! written next to it and swapped in with two renames:
//!
//! ```text
//! stage            <dir>-tmp1  <- full new tree
//! retire_live      <dir>       -> <dir>-tmp2
//! promote_staged   <dir>-tmp1  -> <dir>
//! discard_retired  rm -r <dir>-tmp2
//! ```
//!
//! At every instant `<dir>` is either the complete old tree, absent, or the
//! complete new tree. A crash between the renames leaves the old tree under
//! `<dir>-tmp2` for manual recovery.

use crate::content::{read_contents, read_links, ContentMap, LinkMap};
use crate::hash::content_hash;
use crate::item::{FileClientStore, FileStore};
use crate::metadata::{save_metadata, ClientMetadata, SyncFileMeta};
use crate::orchestrator::SyncSettings;
use std::path::{Component, Path, PathBuf};
use tidesync_types::{Error, FileFilter, Result, ServerIdentity};
use tokio::fs;
use tracing::{debug, info, warn};

/// Metadata describing a fully synced store
///
/// Every transient group must be empty: an item that was never given an id,
/// or whose change or deletion the server never confirmed, cannot be recorded.
/// Paths the filter rejects are left out so that they never reappear in the
/// metadata.
pub fn derive_metadata(
    server_identity: ServerIdentity,
    filter: FileFilter,
    store: &FileStore,
) -> Result<ClientMetadata> {
    if store.has_pending_changes() {
        return Err(Error::invariant(format!(
            "store still has unresolved items after sync: {} added, {} changed, {} deleted",
            store.added().len(),
            store.synced_but_changed().len(),
            store.deleted().len()
        )));
    }

    let mut metadata = ClientMetadata::new(server_identity);
    for (id, timed) in store.synced() {
        if !filter.accepts(&timed.value.path) {
            continue;
        }
        let meta = SyncFileMeta {
            item_id: *id,
            content_hash: content_hash(&timed.value.contents),
            synced_at: timed.time,
        };
        if metadata.items.insert(timed.value.path.clone(), meta).is_some() {
            return Err(Error::invariant(format!(
                "more than one synced item at path '{}'",
                timed.value.path.display()
            )));
        }
    }

    Ok(metadata)
}

/// Every file the store holds, keyed by relative path
pub fn derive_contents(store: &FileStore) -> ContentMap {
    let added = store.added().values();
    let synced = store
        .synced()
        .values()
        .chain(store.synced_but_changed().values())
        .map(|timed| &timed.value);

    added
        .chain(synced)
        .map(|file| (file.path.clone(), file.contents.clone()))
        .collect()
}

/// Atomic replacement of a directory tree by way of two sibling directories
#[derive(Debug, Clone)]
pub struct TreeSwap {
    live: PathBuf,
    staged: PathBuf,
    retired: PathBuf,
}

impl TreeSwap {
    /// Prepare to replace `dir`
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let live = dir.as_ref().to_path_buf();
        let name = live
            .file_name()
            .ok_or_else(|| {
                Error::config(format!(
                    "Contents directory '{}' has no final path component",
                    live.display()
                ))
            })?
            .to_string_lossy()
            .into_owned();

        Ok(Self {
            staged: live.with_file_name(format!("{}-tmp1", name)),
            retired: live.with_file_name(format!("{}-tmp2", name)),
            live,
        })
    }

    /// The directory being replaced
    pub fn live_path(&self) -> &Path {
        &self.live
    }

    /// Where the new tree is built
    pub fn staged_path(&self) -> &Path {
        &self.staged
    }

    /// Where the old tree waits to be deleted
    pub fn retired_path(&self) -> &Path {
        &self.retired
    }

    /// Write the complete new tree into the staging directory
    pub async fn stage(&self, contents: &ContentMap) -> Result<()> {
        if exists(&self.staged).await? {
            debug!("Removing stale staging directory '{}'", self.staged.display());
            remove_tree(&self.staged).await?;
        }
        create_dir(&self.staged).await?;

        for (relative, bytes) in contents {
            ensure_contained(relative)?;
            let target = self.staged.join(relative);
            if let Some(parent) = target.parent() {
                create_dir(parent).await?;
            }
            fs::write(&target, bytes).await.map_err(|e| Error::Io {
                message: format!("Failed to write file '{}': {}", target.display(), e),
            })?;
        }

        debug!(
            "Staged {} files in '{}'",
            contents.len(),
            self.staged.display()
        );
        Ok(())
    }

    /// Recreate symbolic links in the staging directory
    ///
    /// Run after [`stage`](Self::stage). A link whose path already holds a
    /// staged file is dropped.
    pub async fn stage_links(&self, links: &LinkMap) -> Result<()> {
        for (relative, target) in links {
            ensure_contained(relative)?;
            let link = self.staged.join(relative);
            if exists(&link).await? {
                warn!(
                    "Dropping symbolic link '{}': the server has a file at that path",
                    relative.display()
                );
                continue;
            }
            if let Some(parent) = link.parent() {
                create_dir(parent).await?;
            }
            create_link(target, &link).await?;
        }
        Ok(())
    }

    /// Move the live tree out of the way
    pub async fn retire_live(&self) -> Result<()> {
        self.ensure_no_retired_tree().await?;
        if exists(&self.live).await? {
            rename(&self.live, &self.retired).await?;
        }
        Ok(())
    }

    /// Move the staged tree into place
    pub async fn promote_staged(&self) -> Result<()> {
        rename(&self.staged, &self.live).await
    }

    /// Delete the old tree
    pub async fn discard_retired(&self) -> Result<()> {
        if exists(&self.retired).await? {
            remove_tree(&self.retired).await?;
        }
        Ok(())
    }

    /// Replace the live tree with `contents` and `links`
    pub async fn commit(&self, contents: &ContentMap, links: &LinkMap) -> Result<()> {
        self.ensure_no_retired_tree().await?;
        self.stage(contents).await?;
        self.stage_links(links).await?;
        self.retire_live().await?;
        self.promote_staged().await?;
        self.discard_retired().await?;

        info!(
            "Wrote {} files to '{}'",
            contents.len(),
            self.live.display()
        );
        Ok(())
    }

    /// Fail when an interrupted sync left its retired tree behind
    pub async fn ensure_no_retired_tree(&self) -> Result<()> {
        if exists(&self.retired).await? {
            return Err(Error::invariant(format!(
                "'{}' holds the tree of an interrupted sync; recover or remove it before syncing again",
                self.retired.display()
            )));
        }
        Ok(())
    }
}

/// Persist a synced store: contents directory first, metadata second
///
/// Metadata is derived before anything is touched, so a store that violates
/// the post-sync invariants writes nothing. Local files the filter excludes
/// and every symbolic link are carried over into the new tree.
pub async fn save_client_store(
    settings: &SyncSettings,
    client_store: &FileClientStore,
) -> Result<ClientMetadata> {
    let metadata = derive_metadata(
        client_store.server_identity,
        settings.filter,
        &client_store.store,
    )?;
    let swap = TreeSwap::new(&settings.contents_dir)?;

    let mut contents = preserved_files(&settings.contents_dir, settings.filter).await?;
    contents.extend(derive_contents(&client_store.store));
    let links = read_links(&settings.contents_dir).await?;

    swap.commit(&contents, &links).await?;
    save_metadata(&settings.metadata_file, &metadata).await?;

    Ok(metadata)
}

async fn preserved_files(contents_dir: &Path, filter: FileFilter) -> Result<ContentMap> {
    if filter == FileFilter::IncludeAll {
        return Ok(ContentMap::new());
    }

    let mut all = read_contents(contents_dir, FileFilter::IncludeAll).await?;
    all.retain(|path, _| !filter.accepts(path));
    if !all.is_empty() {
        debug!("Carrying over {} excluded files", all.len());
    }
    Ok(all)
}

fn ensure_contained(relative: &Path) -> Result<()> {
    let contained = relative.components().next().is_some()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if contained {
        Ok(())
    } else {
        Err(Error::invariant(format!(
            "refusing to write '{}' outside the contents directory",
            relative.display()
        )))
    }
}

#[cfg(unix)]
async fn create_link(target: &Path, link: &Path) -> Result<()> {
    fs::symlink(target, link).await.map_err(|e| Error::Io {
        message: format!(
            "Failed to create symbolic link '{}' -> '{}': {}",
            link.display(),
            target.display(),
            e
        ),
    })
}

#[cfg(not(unix))]
async fn create_link(target: &Path, link: &Path) -> Result<()> {
    Err(Error::io(format!(
        "Cannot recreate symbolic link '{}' -> '{}' on this platform",
        link.display(),
        target.display()
    )))
}

async fn exists(path: &Path) -> Result<bool> {
    fs::try_exists(path).await.map_err(|e| Error::Io {
        message: format!("Failed to access '{}': {}", path.display(), e),
    })
}

async fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await.map_err(|e| Error::Io {
        message: format!("Failed to create directory '{}': {}", path.display(), e),
    })
}

async fn remove_tree(path: &Path) -> Result<()> {
    fs::remove_dir_all(path).await.map_err(|e| Error::Io {
        message: format!("Failed to delete directory '{}': {}", path.display(), e),
    })
}

async fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).await.map_err(|e| Error::Io {
        message: format!(
            "Failed to move '{}' to '{}': {}",
            from.display(),
            to.display(),
            e
        ),
    })?;
    debug!("Moved: {} -> {}", from.display(), to.display());
    Ok(())
}
