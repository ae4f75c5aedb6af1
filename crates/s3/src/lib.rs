//! Amazon S3 backend for [`mpu_transfer`].
//!
//! [`S3MultipartClient`] maps each [`MultipartClient`] call onto the matching
//! S3 multipart API. Building the SDK client (region, endpoint, credentials)
//! stays with the caller.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    ChecksumAlgorithm, CompletedMultipartUpload, CompletedPart as S3CompletedPart,
    ObjectCannedAcl, Part,
};
use mpu_protocol::{
    CompleteUploadRequest, CompleteUploadResponse, CompletedPart, CreateUploadRequest, UploadId,
    UploadPartRequest, UploadPartResponse,
};
use mpu_transfer::{BoxFuture, MultipartClient, Operation, TransferError};
use tracing::debug;

/// Object metadata key holding the whole-object checksum.
pub const CHECKSUM_METADATA_KEY: &str = "sha256";

/// [`MultipartClient`] over an `aws_sdk_s3::Client`.
#[derive(Debug, Clone)]
pub struct S3MultipartClient {
    client: aws_sdk_s3::Client,
}

impl S3MultipartClient {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.client
    }
}

impl MultipartClient for S3MultipartClient {
    fn create_upload(
        &self,
        request: CreateUploadRequest,
    ) -> BoxFuture<'_, Result<UploadId, TransferError>> {
        Box::pin(async move {
            let mut call = self
                .client
                .create_multipart_upload()
                .bucket(&request.bucket)
                .key(&request.key)
                .set_acl(
                    request
                        .access_policy
                        .as_ref()
                        .map(|p| ObjectCannedAcl::from(p.as_str())),
                );
            if let Some(checksum) = &request.content_checksum {
                call = call.metadata(CHECKSUM_METADATA_KEY, checksum);
            }
            if request.part_checksums {
                call = call.checksum_algorithm(ChecksumAlgorithm::Sha256);
            }

            let output = call
                .send()
                .await
                .map_err(|e| TransferError::transport(Operation::CreateUpload, e))?;
            let upload_id = output.upload_id().ok_or_else(|| {
                TransferError::transport(Operation::CreateUpload, "response carried no upload id")
            })?;
            Ok(UploadId::new(request.bucket, request.key, upload_id))
        })
    }

    fn upload_part(
        &self,
        request: UploadPartRequest,
    ) -> BoxFuture<'_, Result<UploadPartResponse, TransferError>> {
        Box::pin(async move {
            let part_number = sdk_part_number(request.part_number, Operation::UploadPart)?;
            let id = &request.upload_id;
            let output = self
                .client
                .upload_part()
                .bucket(&id.bucket)
                .key(&id.key)
                .upload_id(&id.upload_id)
                .part_number(part_number)
                .set_checksum_sha256(request.checksum.clone())
                .body(ByteStream::from(request.body))
                .send()
                .await
                .map_err(|e| TransferError::transport(Operation::UploadPart, e))?;

            Ok(UploadPartResponse {
                etag: output.e_tag().map(str::to_string),
                checksum: output
                    .checksum_sha256()
                    .map(str::to_string)
                    .or(request.checksum),
            })
        })
    }

    fn list_parts(
        &self,
        upload_id: UploadId,
    ) -> BoxFuture<'_, Result<Vec<CompletedPart>, TransferError>> {
        Box::pin(async move {
            let mut parts = Vec::new();
            let mut marker: Option<String> = None;
            loop {
                let output = self
                    .client
                    .list_parts()
                    .bucket(&upload_id.bucket)
                    .key(&upload_id.key)
                    .upload_id(&upload_id.upload_id)
                    .set_part_number_marker(marker.take())
                    .send()
                    .await
                    .map_err(|e| TransferError::transport(Operation::ListParts, e))?;

                parts.extend(output.parts().iter().filter_map(from_listed_part));
                debug!(
                    upload_id = %upload_id.upload_id,
                    listed = parts.len(),
                    "listed uploaded parts"
                );

                if !output.is_truncated().unwrap_or(false) {
                    break;
                }
                match output.next_part_number_marker() {
                    Some(next) => marker = Some(next.to_string()),
                    None => break,
                }
            }
            Ok(parts)
        })
    }

    fn complete_upload(
        &self,
        request: CompleteUploadRequest,
    ) -> BoxFuture<'_, Result<CompleteUploadResponse, TransferError>> {
        Box::pin(async move {
            let id = &request.upload_id;
            let upload = completed_upload(&request.parts)?;
            let output = self
                .client
                .complete_multipart_upload()
                .bucket(&id.bucket)
                .key(&id.key)
                .upload_id(&id.upload_id)
                .multipart_upload(upload)
                .send()
                .await
                .map_err(|e| TransferError::transport(Operation::CompleteUpload, e))?;

            Ok(CompleteUploadResponse {
                etag: output.e_tag().map(str::to_string),
                location: output.location().map(str::to_string),
            })
        })
    }

    fn abort_upload(&self, upload_id: UploadId) -> BoxFuture<'_, Result<(), TransferError>> {
        Box::pin(async move {
            self.client
                .abort_multipart_upload()
                .bucket(&upload_id.bucket)
                .key(&upload_id.key)
                .upload_id(&upload_id.upload_id)
                .send()
                .await
                .map_err(|e| TransferError::transport(Operation::AbortUpload, e))?;
            Ok(())
        })
    }
}

fn sdk_part_number(part_number: u32, operation: Operation) -> Result<i32, TransferError> {
    i32::try_from(part_number).map_err(|e| TransferError::transport(operation, e))
}

/// Converts a listed part; parts without a number are dropped.
fn from_listed_part(part: &Part) -> Option<CompletedPart> {
    let part_number = u32::try_from(part.part_number()?).ok()?;
    Some(CompletedPart {
        part_number,
        etag: part.e_tag().map(str::to_string),
        checksum: part.checksum_sha256().map(str::to_string),
        size: part.size().and_then(|s| u64::try_from(s).ok()),
    })
}

/// Completion body with parts in ascending order.
fn completed_upload(parts: &[CompletedPart]) -> Result<CompletedMultipartUpload, TransferError> {
    let mut sdk_parts = parts
        .iter()
        .map(|p| {
            Ok(S3CompletedPart::builder()
                .part_number(sdk_part_number(p.part_number, Operation::CompleteUpload)?)
                .set_e_tag(p.etag.clone())
                .set_checksum_sha256(p.checksum.clone())
                .build())
        })
        .collect::<Result<Vec<_>, TransferError>>()?;
    sdk_parts.sort_by_key(|p| p.part_number());

    Ok(CompletedMultipartUpload::builder()
        .set_parts(Some(sdk_parts))
        .build())
}
