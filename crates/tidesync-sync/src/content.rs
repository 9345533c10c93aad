//! Reading the contents directory into memory

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tidesync_types::{Error, FileFilter, Result};
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

/// File contents keyed by path relative to the contents directory
pub type ContentMap = BTreeMap<PathBuf, Vec<u8>>;

/// Symbolic link targets keyed by path relative to the contents directory
pub type LinkMap = BTreeMap<PathBuf, PathBuf>;

// Links are kept in place on rewrite only where they can be recreated.
const LINKS_SUPPORTED: bool = cfg!(unix);

/// Read every regular file under `root` that `filter` accepts
///
/// Directories are walked but never reported. Symbolic links are neither
/// followed nor synced; [`read_links`] collects them so the rewrite can keep
/// them. Any other kind of entry, or a link on a platform where links cannot
/// be recreated, fails the read. A hidden directory is pruned as a whole when
/// hidden files are excluded. Any unreadable entry fails the whole read. A
/// root that does not exist yet reads as empty.
pub async fn read_contents<P: AsRef<Path>>(root: P, filter: FileFilter) -> Result<ContentMap> {
    let root = root.as_ref();
    let mut contents = ContentMap::new();

    if !root_exists(root).await? {
        debug!("Contents directory '{}' does not exist yet", root.display());
        return Ok(contents);
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || filter.accepts(relative_to(root, entry.path()))
        });

    for entry in walker {
        let entry = entry.map_err(|e| Error::Io {
            message: format!("Failed to read directory '{}': {}", root.display(), e),
        })?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if file_type.is_symlink() && LINKS_SUPPORTED {
            debug!("Leaving symbolic link '{}' out of the sync", entry.path().display());
            continue;
        }
        if !file_type.is_file() {
            return Err(Error::io(format!(
                "Cannot sync '{}': only regular files and directories can be synchronized",
                entry.path().display()
            )));
        }

        let bytes = fs::read(entry.path()).await.map_err(|e| Error::Io {
            message: format!("Failed to read file '{}': {}", entry.path().display(), e),
        })?;
        contents.insert(relative_to(root, entry.path()).to_path_buf(), bytes);
    }

    info!("Read {} files from '{}'", contents.len(), root.display());
    Ok(contents)
}

/// Collect every symbolic link under `root`, hidden or not
///
/// Links are recorded with their target as stored, never resolved.
pub async fn read_links<P: AsRef<Path>>(root: P) -> Result<LinkMap> {
    let root = root.as_ref();
    let mut links = LinkMap::new();

    if !root_exists(root).await? {
        return Ok(links);
    }

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| Error::Io {
            message: format!("Failed to read directory '{}': {}", root.display(), e),
        })?;
        if !entry.path_is_symlink() || entry.depth() == 0 {
            continue;
        }

        let target = fs::read_link(entry.path()).await.map_err(|e| Error::Io {
            message: format!("Failed to read link '{}': {}", entry.path().display(), e),
        })?;
        links.insert(relative_to(root, entry.path()).to_path_buf(), target);
    }

    if !links.is_empty() {
        debug!("Found {} symbolic links under '{}'", links.len(), root.display());
    }
    Ok(links)
}

async fn root_exists(root: &Path) -> Result<bool> {
    fs::try_exists(root).await.map_err(|e| Error::Io {
        message: format!("Failed to access '{}': {}", root.display(), e),
    })
}

fn relative_to<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
