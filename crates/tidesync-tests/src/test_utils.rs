//! Shared helpers for TideSync end-to-end tests
//!
//! Every helper panics on I/O failure; they only run inside tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tidesync_sync::SyncSettings;
use walkdir::WalkDir;

/// One client's working area: a contents directory and a metadata file
#[derive(Debug)]
pub struct TestClient {
    /// Holds the directory alive for the lifetime of the test
    pub temp_dir: TempDir,
    /// Settings pointing into `temp_dir`
    pub settings: SyncSettings,
}

impl TestClient {
    /// Fresh client with nothing on disk yet
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let settings = SyncSettings::new(
            temp_dir.path().join("notes"),
            temp_dir.path().join("notes-metadata.json"),
        );
        Self { temp_dir, settings }
    }

    /// The synchronized directory
    pub fn contents_dir(&self) -> &Path {
        &self.settings.contents_dir
    }

    /// The metadata file
    pub fn metadata_file(&self) -> &Path {
        &self.settings.metadata_file
    }

    /// Write a file below the contents directory
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        create_test_file(self.contents_dir(), relative, contents)
    }

    /// Read a file below the contents directory, `None` when absent
    pub fn read(&self, relative: &str) -> Option<String> {
        fs::read_to_string(self.contents_dir().join(relative)).ok()
    }

    /// Remove a file below the contents directory
    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.contents_dir().join(relative)).expect("Failed to remove test file");
    }

    /// Every file below the contents directory
    pub fn tree(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        read_tree(self.contents_dir())
    }

    /// Raw metadata file bytes, `None` when absent
    pub fn metadata_bytes(&self) -> Option<Vec<u8>> {
        fs::read(self.metadata_file()).ok()
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `contents` to `root/relative`, creating parent directories
pub fn create_test_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create test directory");
    }
    fs::write(&path, contents).expect("Failed to write test file");
    path
}

/// Every regular file below `root`, keyed by relative path
///
/// A missing root reads as an empty tree.
pub fn read_tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    if !root.exists() {
        return BTreeMap::new();
    }

    WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.expect("Failed to walk test tree"))
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("Entry outside test tree")
                .to_path_buf();
            let contents = fs::read(entry.path()).expect("Failed to read test file");
            (relative, contents)
        })
        .collect()
}

/// Tree literal from `(path, contents)` pairs
pub fn tree_of(entries: &[(&str, &str)]) -> BTreeMap<PathBuf, Vec<u8>> {
    entries
        .iter()
        .map(|(path, contents)| (PathBuf::from(path), contents.as_bytes().to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_starts_empty() {
        let client = TestClient::new();
        assert!(client.tree().is_empty());
        assert!(client.metadata_bytes().is_none());
    }

    #[test]
    fn test_write_and_read_tree() {
        let client = TestClient::new();
        client.write("a.txt", "alpha");
        client.write("dir/b.txt", "beta");

        assert_eq!(
            client.tree(),
            tree_of(&[("a.txt", "alpha"), ("dir/b.txt", "beta")])
        );
        assert_eq!(client.read("dir/b.txt").as_deref(), Some("beta"));

        client.remove("a.txt");
        assert_eq!(client.read("a.txt"), None);
    }
}
