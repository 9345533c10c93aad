//! Test support for TideSync
//!
//! [`server::MemoryServer`] plays the server half of the sync protocol in
//! memory, either directly as a [`tidesync_sync::SyncTransport`] or over TCP.
//! [`test_utils`] holds helpers for setting up client directories.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod server;
pub mod test_utils;

pub use server::{LostReplyServer, MemoryServer, UnreachableServer};
pub use test_utils::{create_test_file, read_tree, tree_of, TestClient};
