//! Bucket configuration
//!
//! Layered the usual way:
//! - built-in defaults (serde defaults per field)
//! - an optional TOML file
//! - `FILEBUCKET__*` environment variables, e.g. `FILEBUCKET__STORAGE__ROOT`
//!
//! Command-line flags are applied on top by the CLI.

use crate::storage::{HashScheme, MetadataBackend, DEFAULT_READ_BUFFER_SIZE};
use config::{Config, Environment, File, FileFormat};
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

pub const ENV_PREFIX: &str = "FILEBUCKET";

#[derive(Default, Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BucketConfig {
    #[serde(default)]
    #[validate(nested)]
    pub storage: StorageConfig,
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    /// Bucket root directory
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub hash_scheme: HashScheme,
    #[serde(default)]
    pub metadata_backend: MetadataBackend,
    /// Chunk size used when hashing files
    #[serde(default = "default_read_buffer_size")]
    #[validate(range(min = 4096, max = 16777216))]
    pub read_buffer_size: usize,
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            hash_scheme: HashScheme::default(),
            metadata_backend: MetadataBackend::default(),
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Filter directive used when neither RUST_LOG nor `-v` is given
    #[serde(default = "default_log_level")]
    #[validate(length(min = 1, max = 200))]
    pub level: String,
    /// Also write logs to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            json: false,
        }
    }
}

impl BucketConfig {
    /// Load defaults, then `path` (if given), then the environment.
    ///
    /// # Errors
    /// The file is missing or malformed, or the merged values fail validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .wrap_err_with(|| match path {
                Some(p) => format!("Failed to load config: {}", p.display()),
                None => "Failed to load config from environment".to_string(),
            })?;
        config.validate().wrap_err("Invalid configuration")?;

        if let Some(path) = path {
            tracing::info!("Loaded bucket configuration from: {}", path.display());
        }
        Ok(config)
    }

    /// Parse a TOML document (no environment layer).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .wrap_err("Failed to parse TOML config")?;
        config.validate().wrap_err("Invalid configuration")?;
        Ok(config)
    }
}
