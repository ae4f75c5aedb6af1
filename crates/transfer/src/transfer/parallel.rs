//! Bounded worker pool over a random-access source.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{TransferCore, TransferEvent, TransferOptions, UploadSummary};
use crate::client::MultipartClient;
use crate::parts::{PartSpec, plan_parts};
use crate::source::DataSource;
use crate::state::TransferState;
use crate::{PartFailure, TransferError};

/// Uploads parts with `concurrency` workers.
///
/// Parts are planned up front from the source size and handed out through a
/// shared queue; each worker reads its own byte range. Completions are
/// recorded through the shared [`TransferState`], whose lock serializes
/// writers.
pub struct ParallelTransfer {
    pub(super) core: TransferCore,
}

impl ParallelTransfer {
    pub fn new(
        client: Arc<dyn MultipartClient>,
        state: Arc<TransferState>,
        source: Arc<dyn DataSource>,
        options: TransferOptions,
    ) -> Self {
        Self {
            core: TransferCore::new(client, state, source, options),
        }
    }

    /// Sends progress events to `events`.
    pub fn with_events(mut self, events: mpsc::Sender<TransferEvent>) -> Self {
        self.core.events = Some(events);
        self
    }

    pub fn state(&self) -> &Arc<TransferState> {
        &self.core.state
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.core.cancel.clone()
    }

    /// Uploads every remaining part and assembles the object.
    ///
    /// The first failing part stops dispatch; parts already in flight finish
    /// and are recorded. All failures are reported together as
    /// [`TransferError::PartialFailure`].
    pub async fn upload(&self) -> Result<UploadSummary, TransferError> {
        let core = &self.core;
        let size = match core.source.size() {
            Some(size) if core.source.is_seekable() => size,
            _ => {
                return Err(TransferError::Unsupported(
                    "parallel transfer of a forward-only source",
                ));
            }
        };
        core.begin()?;

        let mut pending = VecDeque::new();
        for spec in plan_parts(size, core.options.part_size) {
            if core.state.is_completed(spec.number) {
                core.skipped(spec.number).await;
            } else {
                pending.push_back(spec);
            }
        }

        if let Err(e) = self.run_workers(pending).await {
            return Err(core.fail(e).await);
        }
        core.complete().await
    }

    /// Discards the remote upload and every part stored for it.
    pub async fn abort(&self) -> Result<(), TransferError> {
        self.core.abort().await
    }

    async fn run_workers(&self, pending: VecDeque<PartSpec>) -> Result<(), TransferError> {
        let total = pending.len();
        let queue = Arc::new(Mutex::new(pending));
        let stop = self.core.cancel.child_token();
        let mut workers = JoinSet::new();

        for worker in 0..worker_count(self.core.options.concurrency, total) {
            let core = self.core.clone();
            let queue = Arc::clone(&queue);
            let stop = stop.clone();
            workers.spawn(async move {
                let mut failures = Vec::new();
                while !stop.is_cancelled() {
                    let next = queue
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .pop_front();
                    let Some(spec) = next else {
                        break;
                    };

                    let result = match core.read_range(spec).await {
                        Ok((body, checksum)) => core.send_part(spec.number, body, checksum).await,
                        Err(e) => Err(e),
                    };
                    if let Err(error) = result {
                        warn!(worker, part = spec.number, error = %error, "part failed, stopping dispatch");
                        stop.cancel();
                        failures.push(PartFailure {
                            part_number: Some(spec.number),
                            error,
                        });
                    }
                }
                failures
            });
        }
        debug!(
            upload_id = %self.core.state.upload_id().upload_id,
            parts = total,
            workers = workers.len(),
            "dispatched parts"
        );

        let mut failures = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(worker_failures) => failures.extend(worker_failures),
                Err(e) => {
                    stop.cancel();
                    failures.push(PartFailure {
                        part_number: None,
                        error: e.into(),
                    });
                }
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|f| f.part_number);
            return Err(TransferError::PartialFailure { failures });
        }
        self.core.check_cancelled()
    }
}

/// Never more workers than pending parts, and at least one.
fn worker_count(concurrency: usize, pending: usize) -> usize {
    concurrency.min(pending).max(1)
}
