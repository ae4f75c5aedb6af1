//! Upload configuration.
//!
//! Reads/writes JSON with snake_case fields; every option has a default, so a
//! file only needs the fields it changes.

use std::path::Path;

use mpu_protocol::AccessPolicy;
use serde::{Deserialize, Serialize};

use crate::{DEFAULT_CONCURRENCY, MIN_PART_SIZE, TransferError};

/// Options for one multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Number of parts uploaded at once. Must be at least 1.
    pub concurrency: usize,
    /// Requested part size; raised to [`MIN_PART_SIZE`] when smaller.
    pub min_part_size: u64,
    /// Checksum of the whole object, stored as metadata on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Hash the whole source before create when no `checksum` is given.
    pub whole_body_checksum: bool,
    /// Attach a SHA-256 checksum to every part.
    pub part_checksums: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_policy: Option<AccessPolicy>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            key: None,
            concurrency: DEFAULT_CONCURRENCY,
            min_part_size: MIN_PART_SIZE,
            checksum: None,
            whole_body_checksum: false,
            part_checksums: true,
            access_policy: None,
        }
    }
}

impl UploadConfig {
    pub fn from_json(json: &str) -> Result<Self, TransferError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&content)?;
        tracing::debug!(path = %path.as_ref().display(), "upload configuration loaded");
        Ok(config)
    }

    /// Writes configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TransferError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Part size actually used: never below [`MIN_PART_SIZE`].
    pub fn effective_min_part_size(&self) -> u64 {
        self.min_part_size.max(MIN_PART_SIZE)
    }
}
