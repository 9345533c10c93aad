//! Result type alias for TideSync operations

use crate::Error;

/// Result type alias for TideSync operations
pub type Result<T> = std::result::Result<T, Error>;
