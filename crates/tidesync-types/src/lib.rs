//! Core identifiers and error handling for TideSync
//!
//! This crate provides the foundational types shared by the TideSync crates:
//!
//! - **Error handling**: one error taxonomy for every way a sync round can abort
//! - **Identifiers**: server-assigned item ids, client-local ids, logical server time
//!   and the server identity that ties them together
//! - **Filtering**: which local files take part in synchronization
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use tidesync_types::{Error, Result, ServerTime};
//!
//! fn bump(time: ServerTime) -> Result<ServerTime> {
//!     if time.get() == u64::MAX {
//!         return Err(Error::invariant("server time overflow"));
//!     }
//!     Ok(time.next())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod filter;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use filter::{is_hidden, FileFilter};
pub use result::Result;
pub use types::*;
