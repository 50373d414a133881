//! Handler trait for processing upload traffic.
//!
//! Implementors provide the transfer logic while the server framework
//! handles connection management, framing and acknowledgement delivery.

use std::future::Future;
use std::pin::Pin;

use bkpsync_protocol::{Ack, ChunkEvent};
use bkpsync_transfer::UploadSession;

/// A boxed future returned by handler methods.
pub type HandlerFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for handling parsed events from a client.
///
/// Every call must resolve to an [`Ack`]; the server writes it back as an
/// `upload` event on the connection the request came from.
pub trait ChunkHandler: Send + Sync + 'static {
    /// Called for every well-formed binary chunk frame.
    fn on_chunk(&self, event: ChunkEvent) -> HandlerFuture<'_, Ack>;

    /// Called for a `status` query asking where `transfer_id` should resume.
    fn on_status(&self, transfer_id: String) -> HandlerFuture<'_, Ack> {
        Box::pin(async move {
            Ack::failure(Some(transfer_id), None, "status queries not supported")
        })
    }
}

impl ChunkHandler for UploadSession {
    fn on_chunk(&self, event: ChunkEvent) -> HandlerFuture<'_, Ack> {
        Box::pin(self.handle_chunk(event))
    }

    fn on_status(&self, transfer_id: String) -> HandlerFuture<'_, Ack> {
        Box::pin(async move { self.resume_offset(&transfer_id).await })
    }
}
