//! Entry point: validates configuration and picks a transfer strategy.

use std::sync::Arc;

use mpu_protocol::{AccessPolicy, CreateUploadRequest, UploadId};
use tracing::info;

use crate::client::MultipartClient;
use crate::config::UploadConfig;
use crate::source::DataSource;
use crate::state::TransferState;
use crate::transfer::{ParallelTransfer, SerialTransfer, Transfer, TransferOptions};
use crate::{MIN_PART_SIZE, TransferError};

/// Whether to start a new upload or continue an existing one.
#[derive(Debug, Clone, Default)]
pub enum Resume {
    /// Initiate a new upload.
    #[default]
    Fresh,
    /// Continue the upload with this id; completed parts are listed from the
    /// service.
    ById(String),
    /// Continue with a state kept from an earlier attempt.
    WithState(Arc<TransferState>),
}

impl Resume {
    pub fn is_resume(&self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

/// Builds a [`Transfer`].
///
/// Fields are public so the builder can be assembled from a loaded
/// [`UploadConfig`] as well as through the chained setters.
#[derive(Default)]
pub struct UploadBuilder {
    pub config: UploadConfig,
    pub resume: Resume,
    pub client: Option<Arc<dyn MultipartClient>>,
    pub source: Option<Arc<dyn DataSource>>,
}

impl UploadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: UploadConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = Some(bucket.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.config.key = Some(key.into());
        self
    }

    /// Sets the part size, raised to [`MIN_PART_SIZE`] when smaller.
    pub fn min_part_size(mut self, size: u64) -> Self {
        self.config.min_part_size = size.max(MIN_PART_SIZE);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Checksum of the whole object, stored as metadata on create.
    pub fn checksum(mut self, checksum: impl Into<String>) -> Self {
        self.config.checksum = Some(checksum.into());
        self
    }

    /// Hash the whole source before create unless a checksum was given.
    pub fn whole_body_checksum(mut self, enabled: bool) -> Self {
        self.config.whole_body_checksum = enabled;
        self
    }

    pub fn part_checksums(mut self, enabled: bool) -> Self {
        self.config.part_checksums = enabled;
        self
    }

    pub fn access_policy(mut self, policy: impl Into<String>) -> Self {
        self.config.access_policy = Some(AccessPolicy::new(policy));
        self
    }

    pub fn resume_upload_id(mut self, upload_id: impl Into<String>) -> Self {
        self.resume = Resume::ById(upload_id.into());
        self
    }

    pub fn resume_state(mut self, state: Arc<TransferState>) -> Self {
        self.resume = Resume::WithState(state);
        self
    }

    pub fn client(mut self, client: Arc<dyn MultipartClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Validates the configuration, initiates or resumes the upload, and
    /// returns the transfer that will upload its parts.
    ///
    /// A resumed state overrides the configured bucket and key. Create and
    /// list failures are returned unchanged.
    pub async fn build(self) -> Result<Transfer, TransferError> {
        let Self {
            mut config,
            resume,
            client,
            source,
        } = self;

        if let Resume::WithState(state) = &resume {
            let id = state.upload_id();
            config.bucket = Some(id.bucket.clone());
            config.key = Some(id.key.clone());
        }

        let bucket = required(config.bucket.as_deref(), "bucket")?;
        let key = required(config.key.as_deref(), "key")?;
        let client = client.ok_or_else(|| invalid("client is required"))?;
        let source = source.ok_or_else(|| invalid("source is required"))?;

        if resume.is_resume() && !source.is_seekable() {
            return Err(invalid("resuming an upload requires a random-access source"));
        }
        if config.concurrency == 0 {
            return Err(invalid("concurrency must be at least 1"));
        }
        if config.concurrency > 1 && !source.is_seekable() {
            return Err(invalid("concurrency above 1 requires a random-access source"));
        }

        let state = match resume {
            Resume::Fresh => {
                Arc::new(initiate(client.as_ref(), &source, &config, bucket, key).await?)
            }
            Resume::ById(upload_id) => {
                let upload_id = required(Some(upload_id.as_str()), "upload id")?;
                let id = UploadId::new(bucket, key, upload_id);
                Arc::new(TransferState::from_upload_id(client.as_ref(), id).await?)
            }
            Resume::WithState(state) => state,
        };

        let options = TransferOptions {
            part_size: config.effective_min_part_size(),
            part_checksums: config.part_checksums,
            concurrency: config.concurrency,
        };
        Ok(if options.concurrency == 1 {
            Transfer::Serial(SerialTransfer::new(client, state, source, options))
        } else {
            Transfer::Parallel(ParallelTransfer::new(client, state, source, options))
        })
    }
}

/// Starts a new upload, hashing the whole source first when asked to.
async fn initiate(
    client: &dyn MultipartClient,
    source: &Arc<dyn DataSource>,
    config: &UploadConfig,
    bucket: String,
    key: String,
) -> Result<TransferState, TransferError> {
    let content_checksum = match config.checksum.as_deref().filter(|c| !c.is_empty()) {
        Some(checksum) => Some(checksum.to_string()),
        None if config.whole_body_checksum => {
            let source = Arc::clone(source);
            Some(tokio::task::spawn_blocking(move || source.checksum()).await??)
        }
        None => None,
    };

    let upload_id = client
        .create_upload(CreateUploadRequest {
            bucket,
            key,
            access_policy: config.access_policy.clone(),
            content_checksum,
            part_checksums: config.part_checksums,
        })
        .await?;
    info!(
        upload_id = %upload_id,
        size = ?source.size(),
        "initiated multipart upload"
    );
    Ok(TransferState::new(upload_id))
}

fn required(value: Option<&str>, name: &str) -> Result<String, TransferError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(invalid(format!("{name} is required"))),
    }
}

fn invalid(msg: impl Into<String>) -> TransferError {
    TransferError::InvalidConfig(msg.into())
}
