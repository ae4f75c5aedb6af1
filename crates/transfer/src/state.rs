use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use mpu_protocol::{CompletedPart, UploadId, UploadProgress, UploadStatus};
use tracing::info;

use crate::TransferError;
use crate::client::MultipartClient;

/// Progress record of one multipart upload (thread-safe).
///
/// Shared by every attempt against the same upload: parts recorded here are
/// never uploaded again.
pub struct TransferState {
    upload_id: UploadId,
    inner: RwLock<StateInner>,
}

struct StateInner {
    status: UploadStatus,
    /// Keyed by part number, so iteration is ascending.
    parts: BTreeMap<u32, CompletedPart>,
    total_bytes: Option<u64>,
}

impl TransferState {
    /// Creates the state for a freshly initiated upload.
    pub fn new(upload_id: UploadId) -> Self {
        Self::with_parts(upload_id, Vec::new())
    }

    /// Creates a state that already holds `parts`.
    ///
    /// Later duplicates of a part number replace earlier ones.
    pub fn with_parts(upload_id: UploadId, parts: impl IntoIterator<Item = CompletedPart>) -> Self {
        let parts = parts.into_iter().map(|p| (p.part_number, p)).collect();
        Self {
            upload_id,
            inner: RwLock::new(StateInner {
                status: UploadStatus::Initiated,
                parts,
                total_bytes: None,
            }),
        }
    }

    /// Rebuilds the state of an existing upload from the parts the service
    /// already holds.
    pub async fn from_upload_id(
        client: &dyn MultipartClient,
        upload_id: UploadId,
    ) -> Result<Self, TransferError> {
        let parts = client.list_parts(upload_id.clone()).await?;
        info!(
            upload_id = %upload_id,
            completed_parts = parts.len(),
            "resuming multipart upload"
        );
        Ok(Self::with_parts(upload_id, parts))
    }

    pub fn upload_id(&self) -> &UploadId {
        &self.upload_id
    }

    /// Completed parts in ascending part-number order.
    pub fn completed_parts(&self) -> Vec<CompletedPart> {
        self.read().parts.values().cloned().collect()
    }

    pub fn is_completed(&self, part_number: u32) -> bool {
        self.read().parts.contains_key(&part_number)
    }

    pub fn completed_count(&self) -> usize {
        self.read().parts.len()
    }

    /// Sum of the known sizes of completed parts.
    pub fn completed_bytes(&self) -> u64 {
        self.read().parts.values().filter_map(|p| p.size).sum()
    }

    /// Records a part as completed.
    ///
    /// Returns `false` (and keeps the existing record) if the part number was
    /// already recorded.
    pub fn record_completed(&self, part: CompletedPart) -> bool {
        let mut s = self.write();
        if s.parts.contains_key(&part.part_number) {
            return false;
        }
        s.parts.insert(part.part_number, part);
        true
    }

    pub fn status(&self) -> UploadStatus {
        self.read().status
    }

    pub(crate) fn set_status(&self, status: UploadStatus) {
        self.write().status = status;
    }

    /// Ends the current attempt with `status`.
    ///
    /// Returns `false` and leaves the state untouched once it is terminal, so
    /// an attempt finishing late never overrides an abort or a completion.
    pub(crate) fn finish_attempt(&self, status: UploadStatus) -> bool {
        let mut s = self.write();
        if s.status.is_terminal() {
            return false;
        }
        s.status = status;
        true
    }

    /// Moves the state to `InProgress` unless the upload already finished.
    pub(crate) fn begin_attempt(&self) -> Result<(), TransferError> {
        let mut s = self.write();
        if s.status.is_terminal() {
            return Err(TransferError::InvalidState(s.status));
        }
        s.status = UploadStatus::InProgress;
        Ok(())
    }

    pub(crate) fn set_total_bytes(&self, total: Option<u64>) {
        self.write().total_bytes = total;
    }

    /// Returns current progress as a protocol-compatible struct.
    pub fn progress(&self) -> UploadProgress {
        let s = self.read();
        UploadProgress {
            upload_id: self.upload_id.upload_id.clone(),
            status: s.status,
            completed_parts: s.parts.len(),
            completed_bytes: s.parts.values().filter_map(|p| p.size).sum(),
            total_bytes: s.total_bytes,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StateInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StateInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.read();
        f.debug_struct("TransferState")
            .field("upload_id", &self.upload_id)
            .field("status", &s.status)
            .field("completed_parts", &s.parts.len())
            .finish()
    }
}
