//! In-memory storage client and instrumented source shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use mpu_protocol::{
    CompleteUploadRequest, CompleteUploadResponse, CompletedPart, CreateUploadRequest, UploadId,
    UploadPartRequest, UploadPartResponse,
};

use crate::client::{BoxFuture, MultipartClient, Operation};
use crate::source::{DataSource, MemorySource};
use crate::TransferError;

/// A call the mock accepted.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Create(CreateUploadRequest),
    UploadPart {
        part_number: u32,
        size: usize,
        checksum: Option<String>,
    },
    List(String),
    Complete(Vec<u32>),
    Abort(String),
}

/// Mock storage client that records requests.
#[derive(Default)]
pub(crate) struct MockClient {
    next_id: AtomicUsize,
    remote_parts: Mutex<HashMap<String, Vec<CompletedPart>>>,
    calls: Mutex<Vec<Call>>,
    failing_parts: Mutex<HashSet<u32>>,
    fail_create: AtomicBool,
    fail_list: AtomicBool,
    fail_complete: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    part_delay: Option<Duration>,
}

impl MockClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes every part upload take `delay`, so parallel uploads overlap.
    pub(crate) fn with_part_delay(mut self, delay: Duration) -> Self {
        self.part_delay = Some(delay);
        self
    }

    pub(crate) fn seed_parts(&self, upload_id: &str, parts: Vec<CompletedPart>) {
        self.remote_parts
            .lock()
            .unwrap()
            .insert(upload_id.to_string(), parts);
    }

    pub(crate) fn fail_part(&self, part_number: u32) {
        self.failing_parts.lock().unwrap().insert(part_number);
    }

    pub(crate) fn heal_part(&self, part_number: u32) {
        self.failing_parts.lock().unwrap().remove(&part_number);
    }

    pub(crate) fn fail_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_complete(&self, fail: bool) {
        self.fail_complete.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Part numbers uploaded successfully, in call order.
    pub(crate) fn uploaded_parts(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::UploadPart { part_number, .. } => Some(part_number),
                _ => None,
            })
            .collect()
    }

    /// Part-number lists of every completion call.
    pub(crate) fn completions(&self) -> Vec<Vec<u32>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Complete(parts) => Some(parts),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn creates(&self) -> Vec<CreateUploadRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::List(_)))
            .count()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl MultipartClient for MockClient {
    fn create_upload(
        &self,
        request: CreateUploadRequest,
    ) -> BoxFuture<'_, Result<UploadId, TransferError>> {
        Box::pin(async move {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(TransferError::transport(
                    Operation::CreateUpload,
                    "injected create failure",
                ));
            }
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let id = UploadId::new(&request.bucket, &request.key, format!("upload-{n}"));
            self.record(Call::Create(request));
            Ok(id)
        })
    }

    fn upload_part(
        &self,
        request: UploadPartRequest,
    ) -> BoxFuture<'_, Result<UploadPartResponse, TransferError>> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            match self.part_delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let n = request.part_number;
            if self.failing_parts.lock().unwrap().contains(&n) {
                return Err(TransferError::transport(
                    Operation::UploadPart,
                    format!("injected failure on part {n}"),
                ));
            }

            self.record(Call::UploadPart {
                part_number: n,
                size: request.body.len(),
                checksum: request.checksum.clone(),
            });
            Ok(UploadPartResponse {
                etag: Some(format!("\"etag-{n}\"")),
                checksum: request.checksum,
            })
        })
    }

    fn list_parts(
        &self,
        upload_id: UploadId,
    ) -> BoxFuture<'_, Result<Vec<CompletedPart>, TransferError>> {
        Box::pin(async move {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(TransferError::transport(
                    Operation::ListParts,
                    "injected list failure",
                ));
            }
            self.record(Call::List(upload_id.upload_id.clone()));
            Ok(self
                .remote_parts
                .lock()
                .unwrap()
                .get(&upload_id.upload_id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn complete_upload(
        &self,
        request: CompleteUploadRequest,
    ) -> BoxFuture<'_, Result<CompleteUploadResponse, TransferError>> {
        Box::pin(async move {
            if self.fail_complete.load(Ordering::SeqCst) {
                return Err(TransferError::transport(
                    Operation::CompleteUpload,
                    "injected complete failure",
                ));
            }
            let numbers = request.parts.iter().map(|p| p.part_number).collect();
            self.record(Call::Complete(numbers));
            Ok(CompleteUploadResponse {
                etag: Some(format!("\"final-{}\"", request.parts.len())),
                location: Some(format!(
                    "/{}/{}",
                    request.upload_id.bucket, request.upload_id.key
                )),
            })
        })
    }

    fn abort_upload(&self, upload_id: UploadId) -> BoxFuture<'_, Result<(), TransferError>> {
        Box::pin(async move {
            self.record(Call::Abort(upload_id.upload_id));
            Ok(())
        })
    }
}

/// Memory source that counts how it is read.
pub(crate) struct CountingSource {
    inner: MemorySource,
    seekable: bool,
    pub(crate) checksum_calls: AtomicUsize,
    pub(crate) bytes_read: AtomicUsize,
}

impl CountingSource {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            inner: MemorySource::new(data),
            seekable: true,
            checksum_calls: AtomicUsize::new(0),
            bytes_read: AtomicUsize::new(0),
        }
    }

    /// Same bytes, but reported as a forward-only stream.
    pub(crate) fn forward_only(data: Vec<u8>) -> Self {
        Self {
            seekable: false,
            ..Self::new(data)
        }
    }
}

impl DataSource for CountingSource {
    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn size(&self) -> Option<u64> {
        if self.seekable {
            self.inner.size()
        } else {
            None
        }
    }

    fn read_at(&self, offset: u64, len: u64) -> Result<Vec<u8>, TransferError> {
        if !self.seekable {
            return Err(TransferError::Unsupported("positioned read"));
        }
        let data = self.inner.read_at(offset, len)?;
        self.bytes_read.fetch_add(data.len(), Ordering::SeqCst);
        Ok(data)
    }

    fn read_next(&self, len: u64) -> Result<Vec<u8>, TransferError> {
        let data = self.inner.read_next(len)?;
        self.bytes_read.fetch_add(data.len(), Ordering::SeqCst);
        Ok(data)
    }

    fn checksum(&self) -> Result<String, TransferError> {
        self.checksum_calls.fetch_add(1, Ordering::SeqCst);
        let data = self.inner.read_at(0, u64::MAX)?;
        self.bytes_read.fetch_add(data.len(), Ordering::SeqCst);
        Ok(crate::source::checksum_bytes(&data))
    }
}

/// `len` bytes of a repeating, position-dependent pattern.
pub(crate) fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
