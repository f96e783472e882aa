//! Runtime configuration with TOML preset support.
//!
//! Pool sizing for descriptors and staging memory is consolidated here.
//! Options serialize to/from TOML so deployments can override individual
//! values without restating the rest.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::KilnError;
use crate::upload::DEFAULT_PAGE_SIZE;

/// Top-level options container. All sub-structs use `#[serde(default)]` so
/// partial TOML files (e.g. only overriding `[descriptor]`) work
/// correctly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CoreOptions {
    /// Descriptor pool sizing.
    pub descriptor: DescriptorOptions,
    /// Staging upload sizing.
    pub upload: UploadOptions,
}

/// Descriptor pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DescriptorOptions {
    /// Slots per descriptor page. Requests larger than this get a
    /// one-off page of their own size.
    pub descriptors_per_page: u32,
}

impl Default for DescriptorOptions {
    fn default() -> Self {
        DescriptorOptions {
            descriptors_per_page: 256,
        }
    }
}

/// Staging upload sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UploadOptions {
    /// Bytes per staging page. A single write can never exceed this.
    pub page_size: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl CoreOptions {
    /// Load options from a TOML file. Missing fields use defaults.
    pub fn load(path: &Path) -> Result<Self, KilnError> {
        let content = std::fs::read_to_string(path).map_err(KilnError::Io)?;
        toml::from_str(&content)
            .map_err(|e| KilnError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    pub fn save(&self, path: &Path) -> Result<(), KilnError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| KilnError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(KilnError::Io)?;
        }
        std::fs::write(path, content).map_err(KilnError::Io)
    }
}
