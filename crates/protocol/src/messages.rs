use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::UploadId;
use crate::types::{AccessPolicy, CompletedPart};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Starts a new multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUploadRequest {
    pub bucket: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_policy: Option<AccessPolicy>,
    /// Checksum of the whole object, stored as object metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_checksum: Option<String>,
    /// Whether parts will carry SHA-256 checksums.
    #[serde(default)]
    pub part_checksums: bool,
}

/// Uploads the bytes of one part.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadPartRequest {
    pub upload_id: UploadId,
    pub part_number: u32,
    pub body: Vec<u8>,
    pub checksum: Option<String>,
}

// The body can be many megabytes; keep it out of logs.
impl fmt::Debug for UploadPartRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadPartRequest")
            .field("upload_id", &self.upload_id)
            .field("part_number", &self.part_number)
            .field("body_len", &self.body.len())
            .field("checksum", &self.checksum)
            .finish()
    }
}

/// Assembles the uploaded parts into the final object.
///
/// `parts` must be sorted by ascending part number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub upload_id: UploadId,
    pub parts: Vec<CompletedPart>,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Result of a single part upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPartResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Checksum the service computed, if it reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Result of assembling the object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}
