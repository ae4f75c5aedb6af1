//! Resumable multipart uploads with serial and parallel strategies.
//!
//! [`UploadBuilder`] validates a configuration, decides whether to start a new
//! upload or resume an existing one, and returns a [`Transfer`]. Driving the
//! transfer uploads every part the service does not already hold and then
//! assembles the object.

mod builder;
mod client;
mod config;
mod parts;
mod source;
mod state;
mod transfer;

#[cfg(test)]
mod testing;

pub use builder::{Resume, UploadBuilder};
pub use client::{BoxFuture, MultipartClient, Operation};
pub use config::UploadConfig;
pub use parts::{PartSpec, effective_part_size, plan_parts};
pub use source::{
    DataSource, FileSource, MemorySource, StreamSource, checksum_bytes, checksum_reader,
};
pub use state::TransferState;
pub use transfer::{
    ParallelTransfer, SerialTransfer, Transfer, TransferEvent, TransferOptions, UploadSummary,
};

pub use mpu_protocol::{AccessPolicy, CompletedPart, UploadId, UploadProgress, UploadStatus};

/// Smallest part size the storage service accepts: 5 MiB.
///
/// Only the last part of an upload may be smaller.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Largest number of parts a single upload may have.
pub const MAX_PARTS: u64 = 10_000;

/// Default number of concurrent part uploads.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Boxed error from a storage client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{operation} failed: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: BoxError,
    },

    #[error("{} part upload(s) failed, first: {}", .failures.len(), first_failure(.failures))]
    PartialFailure { failures: Vec<PartFailure> },

    #[error("protocol error: {0}")]
    Protocol(#[from] mpu_protocol::ProtocolError),

    #[error("unsupported by source: {0}")]
    Unsupported(&'static str),

    #[error("upload is {0}")]
    InvalidState(UploadStatus),

    #[error("cancelled")]
    Cancelled,

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl TransferError {
    /// Wraps a client error for `operation`.
    pub fn transport(operation: Operation, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            operation,
            source: source.into(),
        }
    }
}

/// One failed part inside a [`TransferError::PartialFailure`].
#[derive(Debug)]
pub struct PartFailure {
    /// `None` when the worker died before reporting which part it held.
    pub part_number: Option<u32>,
    pub error: TransferError,
}

fn first_failure(failures: &[PartFailure]) -> String {
    match failures.first() {
        Some(PartFailure {
            part_number: Some(n),
            error,
        }) => format!("part {n}: {error}"),
        Some(PartFailure { error, .. }) => error.to_string(),
        None => "none".into(),
    }
}
