use std::fmt;

use serde::{Deserialize, Serialize};

/// A part the remote service has accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: u32,
    /// Entity tag returned by the service for this part.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Base64 SHA-256 of the part bytes, when part checksums are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl CompletedPart {
    pub fn new(part_number: u32) -> Self {
        Self {
            part_number,
            etag: None,
            checksum: None,
            size: None,
        }
    }
}

/// Who may access the finished object.
///
/// Opaque to the upload logic; handed unmodified to the storage client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessPolicy(String);

impl AccessPolicy {
    pub fn new(policy: impl Into<String>) -> Self {
        Self(policy.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a multipart upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "initiated")]
    Initiated,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    /// The last attempt failed; the recorded parts remain valid for a resume.
    #[serde(rename = "failed_resumable")]
    FailedResumable,
    #[serde(rename = "aborted")]
    Aborted,
}

impl UploadStatus {
    /// Returns `true` once no further part may be uploaded.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initiated => "initiated",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
            Self::FailedResumable => "failed (resumable)",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Snapshot of an upload's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub upload_id: String,
    pub status: UploadStatus,
    pub completed_parts: usize,
    pub completed_bytes: u64,
    /// Source size, when the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
}

impl UploadProgress {
    /// Returns the upload progress as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        match self.total_bytes {
            Some(total) if total > 0 => self.completed_bytes as f64 / total as f64 * 100.0,
            _ => 0.0,
        }
    }
}
