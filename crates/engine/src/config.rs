//! Store configuration via `jstore.toml`
//!
//! On first open, a default `jstore.toml` is created in the data directory.
//! To change settings, edit the file and reopen the store.

use jstore_core::{Access, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the store data directory.
pub const CONFIG_FILE_NAME: &str = "jstore.toml";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Store configuration loaded from `jstore.toml`.
///
/// # Example
///
/// ```toml
/// document_cache_mb = 100
/// metadata_cache_entries = 1024
/// default_access = "protected"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Soft ceiling on cached document bodies, in megabytes.
    #[serde(default = "default_document_cache_mb")]
    pub document_cache_mb: u64,
    /// Maximum cached metadata entries after a load.
    #[serde(default = "default_metadata_cache_entries")]
    pub metadata_cache_entries: usize,
    /// Access level given to new documents: `"public"`, `"protected"` or `"private"`.
    #[serde(default = "default_access_str")]
    pub default_access: String,
}

fn default_document_cache_mb() -> u64 {
    100
}

fn default_metadata_cache_entries() -> usize {
    1024
}

fn default_access_str() -> String {
    Access::Protected.as_str().to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            document_cache_mb: default_document_cache_mb(),
            metadata_cache_entries: default_metadata_cache_entries(),
            default_access: default_access_str(),
        }
    }
}

impl StoreConfig {
    /// Parse the default access string.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if it is not one of the three access levels.
    pub fn access(&self) -> Result<Access> {
        self.default_access.parse().map_err(|_| {
            Error::Config(format!(
                "Invalid default_access '{}' in {}. Expected \"public\", \"protected\" or \"private\".",
                self.default_access, CONFIG_FILE_NAME
            ))
        })
    }

    /// Document cache capacity in bytes.
    pub fn document_cache_bytes(&self) -> u64 {
        self.document_cache_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# jstore configuration
#
# Soft ceiling on cached document bodies, in megabytes (default: 100).
# A single document larger than this is still cached.
document_cache_mb = 100

# Maximum number of cached metadata entries (default: 1024).
metadata_cache_entries = 1024

# Access level for newly created documents (default: "protected")
#   "public"    = anyone can read and write
#   "protected" = anyone can read, writes need a credential
#   "private"   = reads and writes need a credential
# Creating documents needs a credential unless this is "public".
default_access = "protected"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// `default_access` is invalid.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        // Validate the access level eagerly
        config.access()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
