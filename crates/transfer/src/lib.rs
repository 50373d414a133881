//! Resumable chunked uploads.
//!
//! A client pushes a payload as byte ranges; [`UploadSession`] writes each
//! range into a per-transfer working file inside a date bucket, tracks how
//! many contiguous bytes have landed, and once the payload is complete asks a
//! [`ContainerCodec`] to flip the container's status to ready.
//! [`RetentionSweeper`] removes old buckets and forgets idle transfers.

mod catalog;
mod checksum;
mod codec;
mod session;
mod sweeper;
mod tracker;
mod validation;

use std::sync::Arc;

use chrono::{DateTime, Local};

pub use catalog::{BUCKET_FORMAT, CatalogStore, FsCatalogStore, PurgeReport, bucket_label};
pub use checksum::{checksum_bytes, verify_checksum};
pub use codec::{CodecError, ContainerCodec, StatusByteCodec};
pub use session::{SessionConfig, UploadSession};
pub use sweeper::{RetentionSweeper, SweepReport, SweeperConfig};
pub use tracker::{
    DEFAULT_TOMBSTONE_LIMIT, Lookup, TransferState, TransferStatus, TransferTracker,
};
pub use validation::validate_transfer_id;

/// Default extension for working files.
pub const DEFAULT_WORKING_EXTENSION: &str = "bkp";

/// Source of wall-clock time, injectable for tests that cross midnight.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Returns a [`Clock`] backed by the system time.
pub fn system_clock() -> Clock {
    Arc::new(Local::now)
}

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid transfer id: {0}")]
    InvalidTransferId(String),

    #[error("invalid length: {0}")]
    InvalidLength(String),

    #[error("read-back failed: {0}")]
    ReadBack(#[source] std::io::Error),

    #[error("finalize failed: {0}")]
    Finalize(#[from] CodecError),

    #[error("finalize write failed: {0}")]
    FinalizeWrite(#[source] std::io::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
