//! Configuration loader utilities

use crate::{Config, ConfigBuilder, ConfigError, ConfigResult, ENV_PREFIX};
use std::path::{Path, PathBuf};

/// Serialization format of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML
    Yaml,
    /// TOML
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Format implied by a file extension, YAML when unknown
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::Toml,
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }

    /// Render a configuration in this format
    pub fn render(self, config: &Config) -> ConfigResult<String> {
        match self {
            Self::Yaml => serde_yaml::to_string(config).map_err(|e| {
                ConfigError::serialization(format!("Failed to serialize to YAML: {}", e))
            }),
            Self::Toml => toml::to_string_pretty(config).map_err(|e| {
                ConfigError::serialization(format!("Failed to serialize to TOML: {}", e))
            }),
            Self::Json => serde_json::to_string_pretty(config).map_err(|e| {
                ConfigError::serialization(format!("Failed to serialize to JSON: {}", e))
            }),
        }
    }
}

/// Configuration loader with common loading patterns
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the first file found in the default locations
    pub fn load_default() -> ConfigResult<Config> {
        let mut builder = ConfigBuilder::new().add_defaults();

        if let Some(path) = Self::config_exists() {
            builder = builder.add_source_file(path);
        }

        builder.add_env_prefix(ENV_PREFIX).build()
    }

    /// Load configuration from a specific file, which must exist
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Configuration file not found",
                ),
            });
        }

        ConfigBuilder::new()
            .add_defaults()
            .add_required_file(path)
            .add_env_prefix(ENV_PREFIX)
            .build()
    }

    /// Save configuration to a file in the format its extension implies
    pub fn save_to_file<P: AsRef<Path>>(config: &Config, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = ConfigFormat::from_path(path).render(config)?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Configuration file paths in order of preference
    pub fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("tidesync.yaml"),
            PathBuf::from("tidesync.yml"),
            PathBuf::from("tidesync.toml"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            let tidesync_dir = config_dir.join("tidesync");
            paths.push(tidesync_dir.join("config.yaml"));
            paths.push(tidesync_dir.join("config.yml"));
            paths.push(tidesync_dir.join("config.toml"));
        }

        paths
    }

    /// The first configuration file that exists in the default locations
    pub fn config_exists() -> Option<PathBuf> {
        Self::default_config_paths()
            .into_iter()
            .find(|path| path.exists())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME").ok().map(|home| {
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
            })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|home| PathBuf::from(home).join(".config"))
                })
        }
    }
}
