//! Configuration management for TideSync
//!
//! Settings are layered, later sources overriding earlier ones:
//!
//! - **Defaults**: every option has a working default
//! - **File**: YAML, TOML or JSON, chosen by extension
//! - **Environment**: `TIDESYNC__SECTION__KEY` variables
//!
//! The merged result is validated before it is handed out.
//!
//! # Examples
//!
//! ```rust
//! use tidesync_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("tidesync.yaml")
//!     .add_env_prefix("TIDESYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Server: {}", config.sync.server_addr);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tidesync_types::FileFilter;

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "TIDESYNC";

/// Main configuration structure for TideSync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// What to sync and with whom
    #[serde(default)]
    pub sync: SyncConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What to sync and with whom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory whose files are synchronized
    pub contents_dir: PathBuf,
    /// File recording the last successful sync
    pub metadata_file: PathBuf,
    /// Sync server as `host:port`
    pub server_addr: String,
    /// Which paths take part
    pub file_filter: FileFilter,
}

impl Config {
    /// Check the configuration for values a sync round cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sync.contents_dir.as_os_str().is_empty() {
            return Err(ConfigError::validation(
                "Contents directory must not be empty",
            ));
        }

        if self.sync.metadata_file.as_os_str().is_empty() {
            return Err(ConfigError::validation("Metadata file must not be empty"));
        }

        // The contents directory is replaced wholesale on every write.
        let contents_dir = normalized(&self.sync.contents_dir);
        if normalized(&self.sync.metadata_file).starts_with(&contents_dir) {
            return Err(ConfigError::validation(format!(
                "Metadata file '{}' must not be inside the contents directory '{}'",
                self.sync.metadata_file.display(),
                self.sync.contents_dir.display()
            )));
        }

        validate_server_addr(&self.sync.server_addr)?;

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::validation(
                "Log level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}

// Lexical only: `./notes`, `notes` and `x/../notes` compare equal, symlinks
// are not resolved.
fn normalized(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    let mut normal = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normal.pop();
            }
            other => normal.push(other),
        }
    }
    normal
}

/// Accepted values of `logging.level`
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Check that `addr` has the form `host:port`
pub fn validate_server_addr(addr: &str) -> ConfigResult<()> {
    let invalid = || {
        ConfigError::validation(format!(
            "Server address '{}' must have the form host:port",
            addr
        ))
    };

    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            contents_dir: PathBuf::from("tidesync"),
            metadata_file: PathBuf::from("tidesync-metadata.json"),
            server_addr: "127.0.0.1:8790".to_string(),
            file_filter: FileFilter::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
        }
    }
}
