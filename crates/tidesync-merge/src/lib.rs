//! Three-way client/server merge primitive for TideSync
//!
//! The client keeps its items in a four-way partitioned [`ClientStore`]. One
//! sync round is:
//!
//! 1. [`make_sync_request`] turns the store into a [`SyncRequest`],
//! 2. the server answers with a [`SyncResponse`],
//! 3. [`merge_sync_response_from_server`] folds the answer back into the store.
//!
//! The store is generic over the client-local key `C`, the server id `S` and
//! the payload `A`, so the same rules serve any item type.
//!
//! # Examples
//!
//! ```rust
//! use tidesync_merge::{make_sync_request, merge_sync_response_from_server, ClientStore, SyncResponse};
//!
//! let store: ClientStore<u64, u64, String> =
//!     ClientStore::empty().with_item_added(0, "hello".to_string());
//! let request = make_sync_request(&store);
//! assert_eq!(request.new_items.len(), 1);
//!
//! let unchanged = merge_sync_response_from_server(store.clone(), SyncResponse::empty());
//! assert_eq!(unchanged, store);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod merge;
pub mod protocol;
pub mod store;

pub use merge::{make_sync_request, merge_sync_response_from_server};
pub use protocol::{ClientAddition, SyncRequest, SyncResponse};
pub use store::{ClientStore, Timed};
