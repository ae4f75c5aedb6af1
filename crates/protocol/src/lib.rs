//! Identifier, part and request types for multipart object uploads.
//!
//! These types are transport-agnostic: a storage client translates them to
//! whatever wire format its service speaks.

pub mod id;
pub mod messages;
pub mod types;

pub use id::{PARAM_BUCKET, PARAM_KEY, PARAM_UPLOAD_ID, UploadId};
pub use messages::{
    CompleteUploadRequest, CompleteUploadResponse, CreateUploadRequest, UploadPartRequest,
    UploadPartResponse,
};
pub use types::{AccessPolicy, CompletedPart, UploadProgress, UploadStatus};

/// Errors produced while decoding protocol values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("missing parameter: {0}")]
    MissingParam(&'static str),
}
