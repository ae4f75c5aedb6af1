//! Part upload strategies.
//!
//! Both strategies share one contract, implemented by `TransferCore`:
//!
//! 1. Split the source into parts of the configured size, numbered from 1.
//! 2. Skip every part the [`TransferState`] already holds.
//! 3. Upload the rest, optionally with a SHA-256 checksum per part.
//! 4. Once every part is recorded, issue a single completion call listing all
//!    parts in ascending order.
//!
//! A failed attempt issues no completion call and leaves the state resumable:
//! build a new transfer around the same state to continue.

mod parallel;
mod serial;

use std::sync::Arc;

use mpu_protocol::{CompleteUploadRequest, CompletedPart, UploadId, UploadPartRequest, UploadStatus};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::MultipartClient;
use crate::parts::PartSpec;
use crate::source::{DataSource, checksum_bytes};
use crate::state::TransferState;
use crate::{DEFAULT_CONCURRENCY, MIN_PART_SIZE, TransferError};

pub use parallel::ParallelTransfer;
pub use serial::SerialTransfer;

/// Settings a transfer runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Bytes per part; the last part may be smaller.
    pub part_size: u64,
    /// Attach a SHA-256 checksum to every part upload.
    pub part_checksums: bool,
    /// Number of parallel workers.
    pub concurrency: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            part_size: MIN_PART_SIZE,
            part_checksums: true,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Progress event emitted while a transfer runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// A part was uploaded and recorded.
    PartUploaded { part_number: u32, bytes: u64 },
    /// A part was already recorded by an earlier attempt.
    PartSkipped { part_number: u32 },
    /// The object was assembled.
    Completed { parts: usize },
    /// The attempt stopped; the state can be resumed.
    Failed { error: String },
}

/// Outcome of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub upload_id: UploadId,
    pub parts: usize,
    pub bytes: u64,
    pub etag: Option<String>,
    pub location: Option<String>,
}

/// A multipart transfer, serial or parallel.
pub enum Transfer {
    Serial(SerialTransfer),
    Parallel(ParallelTransfer),
}

impl Transfer {
    /// Uploads every remaining part and assembles the object.
    pub async fn upload(&self) -> Result<UploadSummary, TransferError> {
        match self {
            Self::Serial(t) => t.upload().await,
            Self::Parallel(t) => t.upload().await,
        }
    }

    /// Discards the remote upload and every part stored for it.
    pub async fn abort(&self) -> Result<(), TransferError> {
        self.core().abort().await
    }

    pub fn state(&self) -> &Arc<TransferState> {
        &self.core().state
    }

    pub fn upload_id(&self) -> &UploadId {
        self.core().state.upload_id()
    }

    /// Token that stops the transfer between parts when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.core().cancel.clone()
    }

    /// Sends progress events to `events`.
    pub fn with_events(self, events: mpsc::Sender<TransferEvent>) -> Self {
        match self {
            Self::Serial(t) => Self::Serial(t.with_events(events)),
            Self::Parallel(t) => Self::Parallel(t.with_events(events)),
        }
    }

    pub fn options(&self) -> TransferOptions {
        self.core().options
    }

    fn core(&self) -> &TransferCore {
        match self {
            Self::Serial(t) => &t.core,
            Self::Parallel(t) => &t.core,
        }
    }
}

/// State, source and client shared by both strategies.
#[derive(Clone)]
pub(crate) struct TransferCore {
    client: Arc<dyn MultipartClient>,
    state: Arc<TransferState>,
    source: Arc<dyn DataSource>,
    options: TransferOptions,
    events: Option<mpsc::Sender<TransferEvent>>,
    cancel: CancellationToken,
}

impl TransferCore {
    fn new(
        client: Arc<dyn MultipartClient>,
        state: Arc<TransferState>,
        source: Arc<dyn DataSource>,
        options: TransferOptions,
    ) -> Self {
        Self {
            client,
            state,
            source,
            options,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Marks the start of an attempt.
    fn begin(&self) -> Result<(), TransferError> {
        self.state.begin_attempt()?;
        self.state.set_total_bytes(self.source.size());
        debug!(
            upload_id = %self.state.upload_id(),
            completed_parts = self.state.completed_count(),
            part_size = self.options.part_size,
            concurrency = self.options.concurrency,
            "starting transfer attempt"
        );
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), TransferError> {
        if self.cancel.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Positioned read of one planned part.
    async fn read_range(&self, spec: PartSpec) -> Result<(Vec<u8>, Option<String>), TransferError> {
        self.read_blocking(move |source| source.read_at(spec.offset, spec.size))
            .await
    }

    /// Reads the next `len` bytes from the source's cursor.
    async fn read_next(&self, len: u64) -> Result<(Vec<u8>, Option<String>), TransferError> {
        self.read_blocking(move |source| source.read_next(len)).await
    }

    async fn skip_next(&self, len: u64) -> Result<u64, TransferError> {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || source.skip(len)).await?
    }

    /// Runs a blocking read (plus the optional checksum) off the async runtime.
    async fn read_blocking<F>(&self, read: F) -> Result<(Vec<u8>, Option<String>), TransferError>
    where
        F: FnOnce(&dyn DataSource) -> Result<Vec<u8>, TransferError> + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        let with_checksum = self.options.part_checksums;
        tokio::task::spawn_blocking(move || -> Result<_, TransferError> {
            let data = read(source.as_ref())?;
            let checksum = with_checksum.then(|| checksum_bytes(&data));
            Ok((data, checksum))
        })
        .await?
    }

    /// Uploads one part and records it in the state.
    async fn send_part(
        &self,
        part_number: u32,
        body: Vec<u8>,
        checksum: Option<String>,
    ) -> Result<(), TransferError> {
        let bytes = body.len() as u64;
        let request = UploadPartRequest {
            upload_id: self.state.upload_id().clone(),
            part_number,
            body,
            checksum: checksum.clone(),
        };
        let response = self.client.upload_part(request).await?;

        self.state.record_completed(CompletedPart {
            part_number,
            etag: response.etag,
            checksum: response.checksum.or(checksum),
            size: Some(bytes),
        });

        debug!(
            upload_id = %self.state.upload_id().upload_id,
            part = part_number,
            bytes,
            "part uploaded"
        );
        self.emit(TransferEvent::PartUploaded { part_number, bytes })
            .await;
        Ok(())
    }

    async fn skipped(&self, part_number: u32) {
        debug!(
            upload_id = %self.state.upload_id().upload_id,
            part = part_number,
            "part already uploaded, skipping"
        );
        self.emit(TransferEvent::PartSkipped { part_number }).await;
    }

    /// Assembles the object from every recorded part.
    async fn complete(&self) -> Result<UploadSummary, TransferError> {
        let upload_id = self.state.upload_id().clone();
        let parts = self.state.completed_parts();
        let count = parts.len();
        let bytes = self.state.completed_bytes();

        // Aborted while the last parts were in flight.
        let status = self.state.status();
        if status.is_terminal() {
            return Err(TransferError::InvalidState(status));
        }

        let request = CompleteUploadRequest {
            upload_id: upload_id.clone(),
            parts,
        };
        let response = match self.client.complete_upload(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(e).await),
        };

        if !self.state.finish_attempt(UploadStatus::Completed) {
            return Err(TransferError::InvalidState(self.state.status()));
        }
        info!(upload_id = %upload_id, parts = count, bytes, "multipart upload completed");
        self.emit(TransferEvent::Completed { parts: count }).await;

        Ok(UploadSummary {
            upload_id,
            parts: count,
            bytes,
            etag: response.etag,
            location: response.location,
        })
    }

    /// Ends the attempt, keeping recorded parts for a later resume.
    async fn fail(&self, error: TransferError) -> TransferError {
        if !self.state.finish_attempt(UploadStatus::FailedResumable) {
            debug!(
                upload_id = %self.state.upload_id(),
                status = %self.state.status(),
                error = %error,
                "attempt ended after the upload was finished"
            );
            return error;
        }
        warn!(
            upload_id = %self.state.upload_id(),
            completed_parts = self.state.completed_count(),
            error = %error,
            "transfer attempt failed"
        );
        self.emit(TransferEvent::Failed {
            error: error.to_string(),
        })
        .await;
        error
    }

    async fn abort(&self) -> Result<(), TransferError> {
        self.cancel.cancel();
        self.client
            .abort_upload(self.state.upload_id().clone())
            .await?;
        self.state.set_status(UploadStatus::Aborted);
        info!(upload_id = %self.state.upload_id(), "multipart upload aborted");
        Ok(())
    }

    async fn emit(&self, event: TransferEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}
