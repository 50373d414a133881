//! WebSocket server for bkpsync uploads.
//!
//! Accepts any number of clients, turns each binary frame into a chunk for a
//! [`ChunkHandler`] and writes the resulting acknowledgement back on the same
//! connection. Connection lifecycle (ping/pong, size limits, graceful
//! shutdown) is handled here so handlers only see parsed events.

mod connection;
mod handler;
mod server;

pub use connection::{ClientMeta, SendError, Sender};
pub use handler::{ChunkHandler, HandlerFuture};
pub use server::{ServerConfig, UploadServer};

/// Send buffer capacity per connection.
pub const SEND_BUFFER_SIZE: usize = 256;

/// Errors produced by the upload server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid bind address: {0}")]
    InvalidAddress(String),
}
