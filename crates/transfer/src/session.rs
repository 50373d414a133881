use std::path::PathBuf;
use std::sync::Arc;

use bkpsync_protocol::{Ack, ChunkEvent};
use tracing::Span;

use crate::catalog::CatalogStore;
use crate::codec::ContainerCodec;
use crate::tracker::{Lookup, TransferStatus, TransferTracker};
use crate::{Clock, DEFAULT_WORKING_EXTENSION, TransferError, system_clock, validate_transfer_id};

/// Upload session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Extension appended to the transfer id to name its working file.
    pub working_extension: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            working_extension: DEFAULT_WORKING_EXTENSION.into(),
        }
    }
}

/// Handles chunk submissions end to end.
///
/// Every call to [`handle_chunk`](Self::handle_chunk) yields exactly one
/// [`Ack`]; no error escapes to the transport.
pub struct UploadSession {
    config: SessionConfig,
    store: Arc<dyn CatalogStore>,
    codec: Arc<dyn ContainerCodec>,
    tracker: Arc<TransferTracker>,
    clock: Clock,
    span: Span,
}

impl UploadSession {
    /// Creates a session. Failures are logged under `span`.
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn CatalogStore>,
        codec: Arc<dyn ContainerCodec>,
        tracker: Arc<TransferTracker>,
        span: Span,
    ) -> Self {
        Self {
            config,
            store,
            codec,
            tracker,
            clock: system_clock(),
            span,
        }
    }

    /// Replaces the wall clock used to pick a new transfer's bucket.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn tracker(&self) -> &Arc<TransferTracker> {
        &self.tracker
    }

    fn working_path_for(&self, id: &str) -> PathBuf {
        self.store
            .bucket_for((self.clock)())
            .join(format!("{id}.{}", self.config.working_extension))
    }

    /// Processes one chunk and returns its acknowledgement.
    pub async fn handle_chunk(&self, event: ChunkEvent) -> Ack {
        let id = event.transfer_id.clone();

        if let Err(e) = validate_transfer_id(&id) {
            tracing::warn!(parent: &self.span, transfer_id = %id, "rejecting chunk: {e}");
            return Ack::failure(Some(id), None, e.to_string());
        }

        if event.total_length == 0 {
            let e = TransferError::InvalidLength("total length must be positive".into());
            tracing::warn!(parent: &self.span, transfer_id = %id, "rejecting chunk: {e}");
            return Ack::failure(Some(id), None, e.to_string());
        }

        let offset = event.start_offset;
        let Some(end) = offset.checked_add(event.bytes.len() as u64) else {
            let e = TransferError::InvalidLength(format!("chunk at offset {offset} overflows"));
            tracing::warn!(parent: &self.span, transfer_id = %id, "rejecting chunk: {e}");
            return Ack::failure(Some(id), None, e.to_string());
        };

        let state = match self.tracker.acquire(&id, || self.working_path_for(&id)) {
            Lookup::Active(state) => state,
            Lookup::Completed => return self.already_complete(id),
        };

        // Held until the ack is built: one chunk per transfer at a time.
        let mut transfer = state.lock().await;

        if transfer.status() == TransferStatus::Complete {
            return self.already_complete(id);
        }

        if !transfer.is_seeded() {
            let persisted = self.persisted_len(transfer.working_path().clone()).await;
            if persisted > event.total_length {
                // Longer than the declared payload: left over from an earlier
                // transfer with this id, so start over.
                tracing::warn!(
                    parent: &self.span,
                    transfer_id = %id,
                    persisted,
                    total_length = event.total_length,
                    "ignoring stale working file"
                );
                transfer.seed(0);
            } else {
                transfer.seed(persisted);
            }
        }
        transfer.declare_length(event.total_length);

        let expected = transfer.bytes_written();
        if offset > expected {
            tracing::warn!(
                parent: &self.span,
                transfer_id = %id,
                offset,
                expected,
                "rejecting non-contiguous chunk"
            );
            return Ack::failure(
                Some(id),
                Some(expected),
                format!("chunk starts at {offset} but only {expected} bytes received"),
            );
        }

        let path = transfer.working_path().clone();
        if let Err(e) = self
            .write_chunk(path.clone(), offset, event.bytes, event.checksum)
            .await
        {
            transfer.mark_failed();
            tracing::error!(
                parent: &self.span,
                transfer_id = %id,
                offset,
                path = %path.display(),
                "failed to write chunk: {e}"
            );
            return Ack::failure(Some(id), Some(offset), e.to_string());
        }
        transfer.record_write(end);

        // `bytes_written >= end`, so this also covers a seed that already
        // reached the declared length.
        if !transfer.completes_with(transfer.bytes_written()) {
            return Ack::partial(id, transfer.bytes_written());
        }

        match self.finalize(path.clone(), transfer.declared_length()).await {
            Ok(()) => {
                transfer.mark_complete();
                drop(transfer);
                self.tracker.complete(&id, &state);
                tracing::debug!(parent: &self.span, transfer_id = %id, "transfer finalized");
                Ack::processed(id)
            }
            Err(e) => {
                tracing::error!(
                    parent: &self.span,
                    transfer_id = %id,
                    path = %path.display(),
                    "failed to finalize transfer: {e}"
                );
                Ack::failure(Some(id), None, e.to_string())
            }
        }
    }

    /// Reports where a transfer should resume without writing anything.
    pub async fn resume_offset(&self, id: &str) -> Ack {
        if let Err(e) = validate_transfer_id(id) {
            return Ack::failure(Some(id.to_string()), None, e.to_string());
        }

        if self.tracker.is_completed(id) {
            return Ack::processed(id);
        }

        if let Some(state) = self.tracker.get(id) {
            let mut transfer = state.lock().await;
            if transfer.status() == TransferStatus::Complete {
                return Ack::processed(id);
            }
            if !transfer.is_seeded() {
                // Seeding needs the declared length; leave it to the first chunk.
                let persisted = self.persisted_len(transfer.working_path().clone()).await;
                return Ack::partial(id, persisted);
            }
            return Ack::partial(id, transfer.bytes_written());
        }

        let persisted = self.persisted_len(self.working_path_for(id)).await;
        Ack::partial(id, persisted)
    }

    fn already_complete(&self, id: String) -> Ack {
        tracing::warn!(parent: &self.span, transfer_id = %id, "chunk for completed transfer");
        Ack::failure(Some(id), None, "transfer already complete")
    }

    async fn persisted_len(&self, path: PathBuf) -> u64 {
        let store = Arc::clone(&self.store);
        let lookup = tokio::task::spawn_blocking(move || store.persisted_len(&path)).await;
        match lookup {
            Ok(Ok(len)) => len.unwrap_or(0),
            Ok(Err(e)) => {
                tracing::warn!(parent: &self.span, "failed to stat working file: {e}");
                0
            }
            Err(e) => {
                tracing::warn!(parent: &self.span, "stat task failed: {e}");
                0
            }
        }
    }

    async fn write_chunk(
        &self,
        path: PathBuf,
        offset: u64,
        bytes: Vec<u8>,
        checksum: String,
    ) -> Result<(), TransferError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            crate::verify_checksum(&bytes, &checksum)?;
            store.write(&path, offset, &bytes)?;
            Ok(())
        })
        .await?
    }

    /// Reads the assembled file back, cuts it to `declared_length`, marks it
    /// ready and writes it in place.
    ///
    /// Any failure leaves the on-disk status untouched, so repeating this is safe.
    async fn finalize(&self, path: PathBuf, declared_length: u64) -> Result<(), TransferError> {
        let store = Arc::clone(&self.store);
        let codec = Arc::clone(&self.codec);
        tokio::task::spawn_blocking(move || {
            let mut blob = store.read(&path).map_err(TransferError::ReadBack)?;
            blob.truncate(usize::try_from(declared_length).unwrap_or(usize::MAX));
            let ready = codec.finalize(blob)?;
            store
                .overwrite(&path, &ready)
                .map_err(TransferError::FinalizeWrite)?;
            Ok(())
        })
        .await?
    }
}
