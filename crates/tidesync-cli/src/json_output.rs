//! JSON output structures for the TideSync CLI

use serde::{Deserialize, Serialize};
use tidesync_sync::{SyncReport, SyncSettings};

/// Complete JSON output for a sync round
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResultJson {
    /// Operation metadata
    pub metadata: OperationMetadata,
    /// What the round did
    pub report: SyncReport,
}

/// Operation metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// TideSync version
    pub version: String,
    /// Synchronized directory
    pub contents_dir: String,
    /// Metadata file
    pub metadata_file: String,
    /// Sync server address
    pub server_addr: String,
}

impl SyncResultJson {
    /// Describe a finished round
    pub fn new(settings: &SyncSettings, server_addr: &str, report: SyncReport) -> Self {
        Self {
            metadata: OperationMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                contents_dir: settings.contents_dir.display().to_string(),
                metadata_file: settings.metadata_file.display().to_string(),
                server_addr: server_addr.to_string(),
            },
            report,
        }
    }

    /// Render as pretty-printed JSON
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
