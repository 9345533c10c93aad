//! Configuration builder for flexible configuration loading

use crate::{Config, ConfigFormat, ConfigResult};
use config::{ConfigBuilder as ConfigBuilderInner, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

/// Configuration builder for loading configuration from multiple sources
#[derive(Debug)]
pub struct ConfigBuilder {
    inner: ConfigBuilderInner<config::builder::DefaultState>,
    sources: Vec<ConfigSource>,
    env_separator: String,
}

#[derive(Debug, Clone)]
enum ConfigSource {
    File {
        path: PathBuf,
        format: FileFormat,
        required: bool,
    },
    Defaults,
    Environment {
        prefix: String,
    },
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            inner: config::Config::builder(),
            sources: Vec::new(),
            env_separator: "__".to_string(),
        }
    }

    /// Add default configuration values
    pub fn add_defaults(mut self) -> Self {
        self.sources.push(ConfigSource::Defaults);
        self
    }

    /// Add a configuration file source, skipped when the file does not exist
    pub fn add_source_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = detect_format(&path);
        self.sources.push(ConfigSource::File {
            path,
            format,
            required: false,
        });
        self
    }

    /// Add a configuration file source that must exist
    pub fn add_required_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = detect_format(&path);
        self.sources.push(ConfigSource::File {
            path,
            format,
            required: true,
        });
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
        });
        self
    }

    /// Set environment variable separator (default: "__")
    pub fn env_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.env_separator = separator.into();
        self
    }

    /// Build and validate the configuration
    pub fn build(mut self) -> ConfigResult<Config> {
        // Defaults are always the base layer
        self.inner = self
            .inner
            .add_source(config::Config::try_from(&Config::default())?);

        for source in &self.sources {
            match source {
                ConfigSource::File {
                    path,
                    format,
                    required,
                } => {
                    self.inner = self.inner.add_source(
                        File::from(path.clone())
                            .format(*format)
                            .required(*required),
                    );
                }
                ConfigSource::Environment { prefix } => {
                    self.inner = self.inner.add_source(
                        Environment::with_prefix(prefix).separator(&self.env_separator),
                    );
                }
                ConfigSource::Defaults => {}
            }
        }

        let config: Config = self.inner.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_format(path: &Path) -> FileFormat {
    match ConfigFormat::from_path(path) {
        ConfigFormat::Yaml => FileFormat::Yaml,
        ConfigFormat::Toml => FileFormat::Toml,
        ConfigFormat::Json => FileFormat::Json,
    }
}
