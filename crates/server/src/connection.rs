//! Client connection management: read/write pumps, ping/pong, send buffering.

use std::sync::Arc;

use bkpsync_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_PONG_WAIT};
use bkpsync_protocol::{Ack, Envelope, EventType, StatusQuery, parse_chunk_frame};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use crate::SEND_BUFFER_SIZE;
use crate::handler::ChunkHandler;

/// Metadata about a connected client.
#[derive(Debug, Clone)]
pub struct ClientMeta {
    /// Server-assigned connection number.
    pub id: u64,
    pub remote_addr: String,
}

/// Handle for sending frames to one client.
///
/// Cloneable and cheap; wraps an `mpsc::Sender`.
#[derive(Clone)]
pub struct Sender {
    tx: mpsc::Sender<WsMessage>,
}

impl Sender {
    /// Sends an [`Envelope`] as JSON text, waiting for buffer space.
    ///
    /// Returns `Err` only if the connection is gone.
    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<(), SendError> {
        let json = serde_json::to_string(envelope).map_err(|_| SendError)?;
        self.tx
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|_| SendError)
    }

    /// Sends an acknowledgement as an `upload` event.
    pub async fn send_ack(&self, ack: &Ack) -> Result<(), SendError> {
        let envelope = Envelope::upload(ack).map_err(|_| SendError)?;
        self.send_envelope(&envelope).await
    }

    /// Sends an `error` event carrying `message`.
    pub async fn send_error(&self, message: &str) -> Result<(), SendError> {
        let envelope = Envelope::error(message).map_err(|_| SendError)?;
        self.send_envelope(&envelope).await
    }

    /// Returns `true` if the send channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Error returned when the connection is closed.
#[derive(Debug, thiserror::Error)]
#[error("send failed: connection closed")]
pub struct SendError;

/// Serves one WebSocket connection until it closes or `server_cancel` fires.
///
/// The write pump runs as a background task; the read pump runs on the
/// caller's task, so frames from one client are handled strictly in
/// arrival order.
pub async fn serve_connection<S, H>(
    ws_stream: S,
    meta: ClientMeta,
    handler: Arc<H>,
    server_cancel: CancellationToken,
) where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Send
        + 'static,
    H: ChunkHandler,
{
    let (tx, rx) = mpsc::channel::<WsMessage>(SEND_BUFFER_SIZE);
    let cancel = server_cancel.child_token();
    let sender = Sender { tx };

    let (ws_sink, ws_stream) = ws_stream.split();

    let writer = tokio::spawn(write_pump(ws_sink, rx, cancel.clone()));

    read_pump(ws_stream, sender.clone(), handler, cancel.clone()).await;

    // Let queued acks drain before the write pump closes the socket.
    drop(sender);
    let _ = tokio::time::timeout(WS_PING_PERIOD, writer).await;
    cancel.cancel();
    tracing::info!(client = meta.id, remote = %meta.remote_addr, "client disconnected");
}

/// Write pump: drains the send channel and sends WS pings.
async fn write_pump<S>(mut sink: S, mut rx: mpsc::Receiver<WsMessage>, cancel: CancellationToken)
where
    S: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Send + Unpin,
{
    let mut ping_interval = tokio::time::interval(WS_PING_PERIOD);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            msg = rx.recv() => {
                match msg {
                    Some(ws_msg) => {
                        if let Err(e) = sink.send(ws_msg).await {
                            tracing::error!("write pump send error: {e}");
                            break;
                        }
                    }
                    None => break, // All senders dropped.
                }
            }

            _ = ping_interval.tick() => {
                if let Err(e) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                    tracing::error!("write pump ping error: {e}");
                    break;
                }
            }
        }
    }

    // Best-effort close frame.
    let _ = sink.close().await;
}

/// Read pump: reads WS frames and dispatches them one at a time.
async fn read_pump<S, H>(mut stream: S, sender: Sender, handler: Arc<H>, cancel: CancellationToken)
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Send
        + Unpin,
    H: ChunkHandler,
{
    let mut pong_deadline = tokio::time::interval(WS_PONG_WAIT);
    pong_deadline.reset();
    let mut got_pong = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            _ = pong_deadline.tick() => {
                if !got_pong {
                    tracing::warn!("pong timeout, closing connection");
                    break;
                }
                got_pong = false;
            }

            frame = stream.next() => {
                // Any inbound traffic proves the client is alive.
                got_pong = true;

                let sent = match frame {
                    Some(Ok(WsMessage::Binary(data))) => {
                        if data.len() > WS_MAX_MESSAGE_SIZE {
                            tracing::error!("binary message exceeds max size ({} > {})", data.len(), WS_MAX_MESSAGE_SIZE);
                            sender.send_ack(&Ack::failure(None, None, "message too large")).await
                        } else {
                            dispatch_binary(&handler, &sender, &data).await
                        }
                    }
                    Some(Ok(WsMessage::Text(text))) => {
                        if text.len() > WS_MAX_MESSAGE_SIZE {
                            tracing::error!("message exceeds max size ({} > {})", text.len(), WS_MAX_MESSAGE_SIZE);
                            continue;
                        }
                        dispatch_text(&handler, &sender, &text).await
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        pong_deadline.reset();
                        Ok(())
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = sender.tx.try_send(WsMessage::Pong(data));
                        Ok(())
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        tracing::debug!("received close frame");
                        break;
                    }
                    Some(Ok(WsMessage::Frame(_))) => Ok(()), // Raw frames ignored.
                    Some(Err(e)) => {
                        tracing::error!("read pump error: {e}");
                        break;
                    }
                    None => break, // Stream ended.
                };

                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

/// Handles a text frame: only `status` queries are accepted.
async fn dispatch_text<H: ChunkHandler>(
    handler: &Arc<H>,
    sender: &Sender,
    text: &str,
) -> Result<(), SendError> {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(env) => env,
        Err(e) => {
            tracing::warn!("invalid envelope JSON: {e}");
            return sender.send_error(&format!("invalid envelope: {e}")).await;
        }
    };

    match envelope.event {
        EventType::Status => match envelope.parse_payload::<StatusQuery>() {
            Ok(Some(query)) => {
                let ack = handler.on_status(query.transfer_id).await;
                sender.send_ack(&ack).await
            }
            Ok(None) => sender.send_error("status query requires a payload").await,
            Err(e) => {
                tracing::warn!("invalid status payload: {e}");
                sender.send_error(&format!("invalid status payload: {e}")).await
            }
        },
        other => {
            tracing::warn!(event = other.as_str(), "unhandled event");
            sender
                .send_error(&format!("unsupported event: {}", other.as_str()))
                .await
        }
    }
}

/// Handles a binary frame: always answers with exactly one ack.
async fn dispatch_binary<H: ChunkHandler>(
    handler: &Arc<H>,
    sender: &Sender,
    data: &[u8],
) -> Result<(), SendError> {
    let ack = match parse_chunk_frame(data) {
        Ok(event) => handler.on_chunk(event).await,
        Err(e) => {
            tracing::warn!("failed to parse chunk frame: {e}");
            Ack::failure(None, None, e.to_string())
        }
    };
    sender.send_ack(&ack).await
}
