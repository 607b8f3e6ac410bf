//! Socket transport seam.
//!
//! The engine sees a connected socket as two halves: [`WireSender`] for
//! outbound frames and [`WireReceiver`] for inbound ones, so the session
//! loop can write while a read is parked. The production implementation
//! rides a `tokio-tungstenite` WebSocket; tests substitute channel-backed
//! fakes.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use roost_core::{GatewayError, Result};
use roost_rpc::{Frame, decode_frame, encode_frame};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound half of a connected socket.
#[async_trait]
pub trait WireSender: Send {
    /// Write one frame.
    async fn send_frame(&mut self, frame: Frame) -> Result<()>;

    /// Close the socket. Errors on close are ignored — the socket is being
    /// abandoned either way.
    async fn close(&mut self);
}

/// Inbound half of a connected socket.
#[async_trait]
pub trait WireReceiver: Send {
    /// Read the next frame.
    ///
    /// `None` means the socket closed. `Some(Err(Protocol))` is a malformed
    /// frame — the socket is still usable. `Some(Err(Connection))` means the
    /// transport failed.
    async fn next_frame(&mut self) -> Option<Result<Frame>>;
}

/// Production [`WireSender`] over a WebSocket.
pub struct WsSender {
    sink: SplitSink<WsStream, Message>,
}

/// Production [`WireReceiver`] over a WebSocket.
pub struct WsReceiver {
    stream: SplitStream<WsStream>,
}

/// Open a WebSocket to the gateway and split it into its two halves.
pub async fn dial(url: &str) -> Result<(WsSender, WsReceiver)> {
    let (stream, _response) = connect_async(url)
        .await
        .map_err(|e| GatewayError::connection(format!("dial {url}: {e}")))?;
    let (sink, stream) = stream.split();
    Ok((WsSender { sink }, WsReceiver { stream }))
}

#[async_trait]
impl WireSender for WsSender {
    async fn send_frame(&mut self, frame: Frame) -> Result<()> {
        let text = encode_frame(&frame).map_err(GatewayError::from)?;
        self.sink
            .send(Message::text(text))
            .await
            .map_err(|e| GatewayError::connection(format!("socket write: {e}")))
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

#[async_trait]
impl WireReceiver for WsReceiver {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(decode_frame(text.as_str()).map_err(GatewayError::from));
                }
                Ok(Message::Binary(_)) => {
                    return Some(Err(GatewayError::protocol(
                        "binary frames are not part of the gateway protocol",
                    )));
                }
                // Transport-level ping/pong is handled by tungstenite itself;
                // protocol liveness rides dedicated text frames.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Close(reason)) => {
                    debug!(?reason, "socket sent close");
                    return None;
                }
                Err(e) => {
                    return Some(Err(GatewayError::connection(format!("socket read: {e}"))));
                }
            }
        }
    }
}
