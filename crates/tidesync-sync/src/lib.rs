//! Client-side file synchronization for TideSync
//!
//! A sync round reconciles a local directory with a remote server:
//!
//! - **Content reading**: every file under the contents directory, optionally
//!   skipping hidden paths
//! - **Metadata**: the record of what was last agreed with the server
//! - **Consolidation**: metadata plus files on disk become a four-way store of
//!   added, synced, changed and deleted items
//! - **Exchange**: the store is sent through a [`SyncTransport`] and the answer
//!   merged back, the server winning every conflict
//! - **Collisions**: items the server holds at one path are deduplicated or
//!   moved to conflict copies, then settled with a follow-up request
//! - **Persistence**: the new tree replaces the directory atomically, then the
//!   metadata is rewritten
//!
//! # Examples
//!
//! ```rust,no_run
//! use tidesync_sync::{SyncClient, SyncSettings, TcpTransport};
//!
//! # async fn example() -> tidesync_types::Result<()> {
//! let settings = SyncSettings::new("notes", "notes-metadata.json");
//! let mut client = SyncClient::new(settings, TcpTransport::new("127.0.0.1:8790"));
//! let report = client.run_round().await?;
//! println!("{} uploaded, {} received", report.uploaded, report.received);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod collision;
pub mod consolidate;
pub mod content;
pub mod hash;
pub mod item;
pub mod metadata;
pub mod orchestrator;
pub mod persist;
pub mod report;
pub mod transport;

pub use collision::{conflict_copy_path, separate_path_collisions};
pub use consolidate::{consolidate_initial, consolidate_with_metadata};
pub use content::{read_contents, read_links, ContentMap, LinkMap};
pub use hash::content_hash;
pub use item::{FileClientStore, FileStore, FileSyncRequest, FileSyncResponse, SyncFile};
pub use metadata::{load_metadata, save_metadata, ClientMetadata, SyncFileMeta};
pub use orchestrator::{SyncClient, SyncSettings};
pub use persist::{derive_contents, derive_metadata, save_client_store, TreeSwap};
pub use report::SyncReport;
pub use transport::{ClientCodec, JsonCodec, ServerCodec, SyncTransport, TcpTransport};
