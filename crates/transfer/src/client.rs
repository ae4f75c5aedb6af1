//! Storage client abstraction.
//!
//! The upload logic never talks to a service directly. A storage backend
//! (S3 or anything speaking the same multipart model) implements
//! [`MultipartClient`]; tests implement it with an in-memory mock.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use mpu_protocol::{
    CompleteUploadRequest, CompleteUploadResponse, CompletedPart, CreateUploadRequest, UploadId,
    UploadPartRequest, UploadPartResponse,
};

use crate::TransferError;

/// Future returned by [`MultipartClient`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote operations a multipart upload needs.
///
/// Implementations report failures as [`TransferError::Transport`] and must
/// not retry on their own behalf unless their transport layer does so
/// transparently; the resume mechanism is the recovery path.
pub trait MultipartClient: Send + Sync {
    /// Starts a new upload and returns its identifier.
    fn create_upload(
        &self,
        request: CreateUploadRequest,
    ) -> BoxFuture<'_, Result<UploadId, TransferError>>;

    /// Uploads one part.
    fn upload_part(
        &self,
        request: UploadPartRequest,
    ) -> BoxFuture<'_, Result<UploadPartResponse, TransferError>>;

    /// Lists the parts the service already holds for `upload_id`.
    fn list_parts(
        &self,
        upload_id: UploadId,
    ) -> BoxFuture<'_, Result<Vec<CompletedPart>, TransferError>>;

    /// Assembles the object from the listed parts.
    fn complete_upload(
        &self,
        request: CompleteUploadRequest,
    ) -> BoxFuture<'_, Result<CompleteUploadResponse, TransferError>>;

    /// Discards the upload and every part stored for it.
    fn abort_upload(&self, upload_id: UploadId) -> BoxFuture<'_, Result<(), TransferError>>;
}

/// Names a remote operation, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateUpload,
    UploadPart,
    ListParts,
    CompleteUpload,
    AbortUpload,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CreateUpload => "create-upload",
            Self::UploadPart => "upload-part",
            Self::ListParts => "list-parts",
            Self::CompleteUpload => "complete-upload",
            Self::AbortUpload => "abort-upload",
        };
        f.write_str(s)
    }
}
