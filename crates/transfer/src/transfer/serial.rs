//! One part at a time, in ascending order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{TransferCore, TransferEvent, TransferOptions, UploadSummary};
use crate::client::MultipartClient;
use crate::parts::plan_parts;
use crate::source::DataSource;
use crate::state::TransferState;
use crate::{MAX_PARTS, TransferError};

/// Uploads parts sequentially with a single cursor over the source.
///
/// Works with forward-only sources. Random-access sources are read at the
/// planned offsets, so a retried attempt always starts from the beginning of
/// the source regardless of where an earlier attempt stopped.
pub struct SerialTransfer {
    pub(super) core: TransferCore,
}

impl SerialTransfer {
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
    /// Stops at the first failing part; earlier parts stay recorded.
    pub async fn upload(&self) -> Result<UploadSummary, TransferError> {
        self.core.begin()?;
        let source = &self.core.source;
        let result = match source.size() {
            Some(size) if source.is_seekable() => self.upload_planned(size).await,
            _ => self.upload_stream().await,
        };
        match result {
            Ok(()) => self.core.complete().await,
            Err(e) => Err(self.core.fail(e).await),
        }
    }

    /// Discards the remote upload and every part stored for it.
    pub async fn abort(&self) -> Result<(), TransferError> {
        self.core.abort().await
    }

    async fn upload_planned(&self, size: u64) -> Result<(), TransferError> {
        let core = &self.core;
        for spec in plan_parts(size, core.options.part_size) {
            core.check_cancelled()?;
            if core.state.is_completed(spec.number) {
                core.skipped(spec.number).await;
                continue;
            }
            let (body, checksum) = core.read_range(spec).await?;
            core.send_part(spec.number, body, checksum).await?;
        }
        Ok(())
    }

    /// Reads part-sized chunks from the cursor until the source runs dry.
    async fn upload_stream(&self) -> Result<(), TransferError> {
        let core = &self.core;
        let part_size = core.options.part_size.max(1);
        let mut number: u32 = 1;
        loop {
            core.check_cancelled()?;
            if u64::from(number) > MAX_PARTS {
                // A stream of exactly MAX_PARTS full parts ends here.
                if core.skip_next(1).await? == 0 {
                    break;
                }
                return Err(TransferError::Unsupported(
                    "stream needs more parts than allowed; raise the part size",
                ));
            }

            if core.state.is_completed(number) {
                let skipped = core.skip_next(part_size).await?;
                if skipped == 0 && number > 1 {
                    break;
                }
                core.skipped(number).await;
                if skipped < part_size {
                    break;
                }
            } else {
                let (body, checksum) = core.read_next(part_size).await?;
                let len = body.len() as u64;
                if len == 0 && number > 1 {
                    break;
                }
                core.send_part(number, body, checksum).await?;
                if len < part_size {
                    break;
                }
            }
            number += 1;
        }
        Ok(())
    }
}
