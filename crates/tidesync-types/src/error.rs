//! Error types and handling for TideSync
//!
//! Every error in this module aborts the current sync round. The taxonomy
//! exists so callers can tell *why* a round stopped: an unreadable file is an
//! operator problem, a server reset needs a deliberate metadata wipe, and an
//! invariant violation means the in-memory store must never reach the disk.

use crate::ServerIdentity;
use std::path::PathBuf;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// The round failed but local state is untouched and a rerun is safe
    Medium,
    /// Operator action is required before the next round
    High,
    /// Internal state is inconsistent; nothing may be persisted
    Critical,
}

/// Main error type for TideSync operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// The metadata file exists but cannot be parsed
    #[error("Malformed metadata file '{path}': {message}")]
    MalformedMetadata {
        /// Path to the metadata file
        path: PathBuf,
        /// Parser error message
        message: String,
    },

    /// The server reports a different identity than the one recorded locally
    #[error(
        "The server was reset: expected server identity {expected}, but the server reports {actual}. \
         Logical times from a different server are not comparable. \
         Delete the local metadata file deliberately before syncing again."
    )]
    ServerReset {
        /// Identity recorded in the local metadata
        expected: ServerIdentity,
        /// Identity reported by the server
        actual: ServerIdentity,
    },

    /// An internal invariant of the sync protocol was broken
    #[error("Internal invariant violated: {message}")]
    InvariantViolation {
        /// Description of the broken invariant
        message: String,
    },

    /// The remote sync endpoint failed
    #[error("Remote error: {message}")]
    Remote {
        /// Error message describing the transport or server failure
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O related errors
    Io,
    /// Metadata parsing errors
    Metadata,
    /// Server identity mismatch
    ServerReset,
    /// Internal invariant violations
    Invariant,
    /// Remote endpoint errors
    Remote,
    /// Configuration errors
    Config,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::MalformedMetadata { .. } => ErrorKind::Metadata,
            Self::ServerReset { .. } => ErrorKind::ServerReset,
            Self::InvariantViolation { .. } => ErrorKind::Invariant,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Config { .. } => ErrorKind::Config,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } | Self::Remote { .. } | Self::Other { .. } => ErrorSeverity::Medium,
            Self::MalformedMetadata { .. } | Self::ServerReset { .. } | Self::Config { .. } => {
                ErrorSeverity::High
            }
            Self::InvariantViolation { .. } => ErrorSeverity::Critical,
        }
    }

    /// Whether the in-memory state at the time of this error must never be written
    pub fn must_not_persist(&self) -> bool {
        matches!(
            self,
            Self::InvariantViolation { .. } | Self::ServerReset { .. }
        )
    }

    /// Process exit status used by the command line front-end
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Config => 2,
            ErrorKind::Metadata => 3,
            ErrorKind::ServerReset => 4,
            ErrorKind::Invariant => 5,
            ErrorKind::Remote => 6,
            ErrorKind::Io | ErrorKind::Other => 1,
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new invariant violation
    pub fn invariant<S: Into<String>>(message: S) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create a new remote error
    pub fn remote<S: Into<String>>(message: S) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_message_errors_keep_their_message(message in ".*") {
            let errors = vec![
                Error::io(message.clone()),
                Error::invariant(message.clone()),
                Error::remote(message.clone()),
                Error::config(message.clone()),
                Error::other(message.clone()),
            ];

            for error in errors {
                prop_assert!(error.to_string().contains(&message));
            }
        }
    }

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::Medium < ErrorSeverity::High);
        assert!(ErrorSeverity::High < ErrorSeverity::Critical);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "notes.txt");
        let error = Error::from(io_error);

        assert_eq!(error.kind(), ErrorKind::Io);
        assert_eq!(error.severity(), ErrorSeverity::Medium);
        assert!(!error.must_not_persist());
        assert!(error.to_string().contains("notes.txt"));
    }

    #[test]
    fn test_invariant_violation_blocks_persistence() {
        let error = Error::invariant("added items remain after sync");

        assert_eq!(error.kind(), ErrorKind::Invariant);
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert!(error.must_not_persist());
        assert_eq!(error.exit_code(), 5);
    }

    #[test]
    fn test_server_reset_message_tells_operator_what_to_do() {
        let expected = ServerIdentity::from_u128(1);
        let actual = ServerIdentity::from_u128(2);
        let error = Error::ServerReset { expected, actual };

        let message = error.to_string();
        assert!(message.contains(&expected.to_string()));
        assert!(message.contains(&actual.to_string()));
        assert!(message.contains("Delete the local metadata file"));
        assert!(error.must_not_persist());
        assert_eq!(error.exit_code(), 4);
    }

    #[test]
    fn test_malformed_metadata() {
        let error = Error::MalformedMetadata {
            path: PathBuf::from("/home/user/.tidesync/metadata.json"),
            message: "expected value at line 1 column 1".to_string(),
        };

        assert_eq!(error.kind(), ErrorKind::Metadata);
        assert_eq!(error.severity(), ErrorSeverity::High);
        assert!(error.to_string().contains("metadata.json"));
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_remote_error() {
        let error = Error::remote("connection refused");

        assert_eq!(error.kind(), ErrorKind::Remote);
        assert_eq!(error.severity(), ErrorSeverity::Medium);
        assert_eq!(error.exit_code(), 6);
    }
}
