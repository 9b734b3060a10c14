//! Chat WebSocket connection and Engine.IO frame handling

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::packet::{EnginePacket, OpenHandshake, SocketPacket};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct ChatSocket {
    stream: WsStream,
}

impl ChatSocket {
    /// Connect to the Socket.IO websocket endpoint.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        tracing::info!("Connecting WebSocket to {}", ws_url);

        let (stream, response) = connect_async(ws_url)
            .await
            .context("WebSocket connection failed")?;

        tracing::info!("WebSocket connected (status={})", response.status());

        Ok(Self { stream })
    }

    /// Wait for the Engine.IO open packet, which must be the first frame.
    pub async fn handshake(&mut self) -> Result<OpenHandshake> {
        let frame = self
            .recv_frame()
            .await?
            .context("Connection closed before handshake")?;
        match EnginePacket::decode(&frame).context("Malformed open packet")? {
            EnginePacket::Open(open) => {
                tracing::info!(
                    "Engine.IO session open (sid={}, ping={}ms/{}ms)",
                    open.sid,
                    open.ping_interval,
                    open.ping_timeout
                );
                Ok(open)
            }
            other => anyhow::bail!("Expected open packet, got {:?}", other),
        }
    }

    /// Send a text frame.
    pub async fn send_text(&mut self, msg: &str) -> Result<()> {
        tracing::debug!("WS send: {}", msg);
        self.stream
            .send(Message::Text(msg.to_string()))
            .await
            .context("Failed to send WebSocket message")
    }

    /// Send a Socket.IO packet wrapped in an Engine.IO message.
    pub async fn send_packet(&mut self, packet: SocketPacket) -> Result<()> {
        self.send_text(&EnginePacket::Message(packet).encode()).await
    }

    /// Receive the next Engine.IO packet.
    ///
    /// Server pings are answered with a pong before the ping is handed back,
    /// so the caller only uses it to refresh its liveness deadline.
    /// Frames that fail to decode are logged and skipped.
    pub async fn recv_packet(&mut self) -> Result<Option<EnginePacket>> {
        loop {
            let Some(frame) = self.recv_frame().await? else {
                return Ok(None);
            };
            match EnginePacket::decode(&frame) {
                Ok(EnginePacket::Ping(data)) => {
                    self.send_text(&EnginePacket::Pong(data.clone()).encode())
                        .await
                        .context("Failed to answer ping")?;
                    return Ok(Some(EnginePacket::Ping(data)));
                }
                Ok(packet) => return Ok(Some(packet)),
                Err(e) => {
                    tracing::warn!("Dropping undecodable frame ({}): {}", e, frame);
                }
            }
        }
    }

    /// Close the websocket.
    pub async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("WebSocket close failed: {:#}", e);
        }
    }

    /// Receive the next text frame, ignoring pings/pongs.
    async fn recv_frame(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("WS recv: {}", text);
                    return Ok(Some(text));
                }
                Some(Ok(Message::Ping(data))) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .context("Failed to send pong")?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("WebSocket closed: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(other)) => {
                    tracing::debug!("WS frame (ignored): {:?}", other);
                }
                Some(Err(e)) => {
                    return Err(e).context("WebSocket receive error");
                }
                None => {
                    return Ok(None);
                }
            }
        }
    }
}
