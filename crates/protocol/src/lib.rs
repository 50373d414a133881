//! Wire protocol shared by bkpsync clients and the upload server.
//!
//! Inbound chunks travel as binary WebSocket frames (see [`frame`]);
//! acknowledgements and resume queries travel as JSON text frames wrapped
//! in an [`Envelope`].

pub mod ack;
pub mod constants;
pub mod envelope;
pub mod frame;

pub use ack::{Ack, AckData, AckMeta};
pub use constants::EventType;
pub use envelope::{Envelope, StatusQuery};
pub use frame::{ChunkEvent, ChunkHeader, FrameError, encode_chunk_frame, parse_chunk_frame};
