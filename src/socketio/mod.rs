//! Socket.IO transport for the `/chat` namespace
//!
//! Keeps one persistent websocket session to the chat server, reconnecting
//! with exponential backoff. The rest of the program talks to it through
//! two channels: `OutboundEvent` commands in, `TransportEvent` values out.

pub mod packet;
pub mod session;
pub mod websocket;

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::models::{ChatMessage, RoomRequest, SendMessage};
use packet::{EnginePacket, PacketKind, SocketPacket};
use websocket::ChatSocket;

/// Inbound event carrying the room history after a join.
pub const EVENT_PREVIOUS_MESSAGES: &str = "previous_messages";
/// Inbound event carrying one live message.
pub const EVENT_RECEIVE_MESSAGE: &str = "receive_message";
pub const EVENT_JOIN: &str = "join";
pub const EVENT_LEAVE: &str = "leave";

/// How long the websocket connect and Engine.IO open may take.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the server gets to acknowledge the namespace connect.
const NAMESPACE_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A session that stayed up this long resets the reconnect backoff.
const STABILITY_THRESHOLD: Duration = Duration::from_secs(60);

/// Something the transport observed.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Namespace connected (first connect and every reconnect).
    Connected { sid: String },
    /// Session lost. A reconnect attempt follows.
    Disconnected { reason: String },
    PreviousMessages(Vec<ChatMessage>),
    ReceiveMessage(ChatMessage),
}

/// Something the client wants to tell the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    Join(RoomRequest),
    Leave(RoomRequest),
    SendMessage(SendMessage),
}

impl OutboundEvent {
    /// Whether a command queued while offline is still worth sending after
    /// a reconnect. Room changes are not: the connected handler re-joins
    /// the current room on its own.
    pub fn survives_reconnect(&self) -> bool {
        matches!(self, OutboundEvent::SendMessage(_))
    }

    /// Build the Socket.IO event packet for this command.
    pub fn to_packet(&self, namespace: &str, send_event: &str) -> Result<SocketPacket> {
        let (name, payload) = match self {
            OutboundEvent::Join(req) => (EVENT_JOIN, serde_json::to_value(req)?),
            OutboundEvent::Leave(req) => (EVENT_LEAVE, serde_json::to_value(req)?),
            OutboundEvent::SendMessage(msg) => (send_event, serde_json::to_value(msg)?),
        };
        Ok(SocketPacket::event(namespace, name, payload))
    }
}

/// Sink for outbound events. The chat core only ever emits through this.
pub trait Emitter {
    fn emit(&mut self, event: OutboundEvent);
}

#[cfg(test)]
impl Emitter for Vec<OutboundEvent> {
    fn emit(&mut self, event: OutboundEvent) {
        self.push(event);
    }
}

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub server_url: String,
    pub namespace: String,
    pub send_event: String,
    pub max_backoff_secs: u64,
}

/// Cloneable command handle into a running transport.
#[derive(Clone)]
pub struct TransportHandle {
    cmd_tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl Emitter for TransportHandle {
    fn emit(&mut self, event: OutboundEvent) {
        if self.cmd_tx.send(event).is_err() {
            tracing::error!("Transport channel closed -- event dropped");
        }
    }
}

/// A running transport task.
pub struct Transport {
    pub handle: TransportHandle,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
    task: JoinHandle<()>,
}

impl Transport {
    /// Spawn the transport task. Connection starts immediately.
    pub fn start(settings: TransportSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (evt_tx, events) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_transport(settings, cmd_rx, evt_tx));

        Self {
            handle: TransportHandle { cmd_tx },
            events,
            task,
        }
    }

    /// Drop our command handle and wait for the task to finish.
    ///
    /// A live session flushes queued commands first. While offline, queued
    /// sends are dropped with a warning. Other clones of the handle keep the
    /// transport alive.
    pub async fn shutdown(self) {
        let Transport { handle, events, task } = self;
        drop(handle);
        // Keep the event receiver open until the task exits so the
        // transport does not treat a closed receiver as an early shutdown.
        if let Err(e) = task.await {
            tracing::warn!("Transport task failed: {}", e);
        }
        drop(events);
    }
}

/// Reason the inner session loop exited.
enum SessionEnd {
    /// Every command handle or the event receiver is gone. Do not reconnect.
    Shutdown,
    /// Error or server-initiated close. Should reconnect.
    Dropped(anyhow::Error),
}

/// Run sessions with automatic reconnection.
///
/// On transient errors or server-initiated disconnects, reconnects with
/// exponential backoff (1s, 2s, 4s, ... capped at `max_backoff_secs`).
/// Sends issued while offline wait in `pending` for the next session.
/// Once every command handle is gone the task stops, even when offline.
async fn run_transport(
    settings: TransportSettings,
    mut cmd_rx: mpsc::UnboundedReceiver<OutboundEvent>,
    evt_tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut backoff = 1u64;
    let mut pending = VecDeque::new();

    loop {
        let delay = match run_session(&settings, &mut cmd_rx, &mut pending, &evt_tx).await {
            Ok(SessionEnd::Shutdown) => {
                tracing::info!("Transport shut down");
                return;
            }
            Ok(SessionEnd::Dropped(e)) => {
                // Session was stable, start over with the shortest delay.
                backoff = 1;
                tracing::warn!("Chat session lost after stable period: {:#}", e);
                let _ = evt_tx.send(TransportEvent::Disconnected {
                    reason: format!("{:#}", e),
                });
                1
            }
            Err(e) => {
                tracing::warn!("Chat session failed: {:#}. Reconnecting in {}s...", e, backoff);
                let _ = evt_tx.send(TransportEvent::Disconnected {
                    reason: format!("{:#}", e),
                });
                let delay = backoff;
                backoff = next_backoff(backoff, settings.max_backoff_secs);
                delay
            }
        };

        let sleep = time::sleep(Duration::from_secs(delay));
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => queue_offline(&mut pending, cmd),
                    None => {
                        if !pending.is_empty() {
                            tracing::warn!("Dropping {} unsent messages", pending.len());
                        }
                        tracing::info!("All command handles dropped, stopping transport");
                        return;
                    }
                },
                _ = evt_tx.closed() => {
                    tracing::info!("Event receiver dropped, stopping transport");
                    return;
                }
            }
        }
    }
}

/// Keep a command issued while offline if it is still worth sending.
fn queue_offline(pending: &mut VecDeque<OutboundEvent>, cmd: OutboundEvent) {
    if cmd.survives_reconnect() {
        pending.push_back(cmd);
    } else {
        tracing::debug!("Dropping stale offline command: {:?}", cmd);
    }
}

/// Doubling backoff with an upper bound.
fn next_backoff(current: u64, max: u64) -> u64 {
    current.saturating_mul(2).min(max.max(1))
}

/// Run one full session: websocket, Engine.IO open, namespace connect,
/// event loop.
///
/// Returns `Ok(SessionEnd::Dropped)` only when the session had been up long
/// enough to count as stable; shorter sessions surface as `Err` so the
/// caller keeps growing the backoff.
async fn run_session(
    settings: &TransportSettings,
    cmd_rx: &mut mpsc::UnboundedReceiver<OutboundEvent>,
    pending: &mut VecDeque<OutboundEvent>,
    evt_tx: &mpsc::UnboundedSender<TransportEvent>,
) -> Result<SessionEnd> {
    let namespace = settings.namespace.as_str();
    let ws_url = session::endpoint_url(&settings.server_url)?;

    // 1. Connect WebSocket and read the Engine.IO open packet
    let (mut ws, open) = time::timeout(CONNECT_TIMEOUT, async {
        let mut ws = ChatSocket::connect(&ws_url).await?;
        let open = ws.handshake().await?;
        Ok::<_, anyhow::Error>((ws, open))
    })
    .await
    .context("Timed out connecting to chat server")??;

    // 2. Join the namespace
    ws.send_packet(SocketPacket::connect(namespace)).await?;
    let sid = time::timeout(NAMESPACE_CONNECT_TIMEOUT, await_namespace(&mut ws, namespace))
        .await
        .context("Timed out waiting for namespace connect")??;
    tracing::info!("Connected to namespace {} (sid={})", namespace, sid);

    // 3. Flush commands queued while offline
    while let Ok(cmd) = cmd_rx.try_recv() {
        queue_offline(pending, cmd);
    }
    while let Some(cmd) = pending.front() {
        let packet = cmd.to_packet(namespace, &settings.send_event)?;
        ws.send_packet(packet).await?;
        pending.pop_front();
    }

    if evt_tx.send(TransportEvent::Connected { sid }).is_err() {
        ws.close().await;
        return Ok(SessionEnd::Shutdown);
    }

    // 4. Event loop
    let connected_at = Instant::now();
    let liveness = open.liveness_window();
    let mut ping_deadline = Box::pin(time::sleep(liveness));

    let end = loop {
        tokio::select! {
            packet = ws.recv_packet() => {
                match packet {
                    Ok(Some(EnginePacket::Ping(_))) => {
                        ping_deadline = Box::pin(time::sleep(liveness));
                    }
                    Ok(Some(EnginePacket::Message(packet))) => {
                        if packet.namespace != namespace {
                            tracing::debug!("Ignoring packet for namespace {}", packet.namespace);
                            continue;
                        }
                        match packet.kind {
                            PacketKind::Disconnect => {
                                break SessionEnd::Dropped(anyhow::anyhow!("Namespace disconnected by server"));
                            }
                            PacketKind::ConnectError => {
                                break SessionEnd::Dropped(anyhow::anyhow!("Server rejected namespace: {}", packet.error_message()));
                            }
                            _ => {
                                if let Some(event) = dispatch(&packet) {
                                    if evt_tx.send(event).is_err() {
                                        break SessionEnd::Shutdown;
                                    }
                                }
                            }
                        }
                    }
                    Ok(Some(EnginePacket::Close)) => {
                        break SessionEnd::Dropped(anyhow::anyhow!("Engine.IO session closed by server"));
                    }
                    Ok(Some(other)) => {
                        tracing::debug!("Ignoring engine packet: {:?}", other);
                    }
                    Ok(None) => {
                        break SessionEnd::Dropped(anyhow::anyhow!("WebSocket closed by server"));
                    }
                    Err(e) => {
                        break SessionEnd::Dropped(e.context("WebSocket recv error"));
                    }
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => {
                        let packet = cmd.to_packet(namespace, &settings.send_event)?;
                        if let Err(e) = ws.send_packet(packet).await {
                            break SessionEnd::Dropped(e);
                        }
                    }
                    None => {
                        // Everything queued has been sent; leave politely.
                        if let Err(e) = ws.send_packet(SocketPacket::disconnect(namespace)).await {
                            tracing::debug!("Namespace disconnect failed: {:#}", e);
                        }
                        break SessionEnd::Shutdown;
                    }
                }
            }
            _ = &mut ping_deadline => {
                break SessionEnd::Dropped(anyhow::anyhow!(
                    "No ping from server within {}ms",
                    liveness.as_millis()
                ));
            }
            _ = evt_tx.closed() => {
                break SessionEnd::Shutdown;
            }
        }
    };

    ws.close().await;

    match end {
        SessionEnd::Shutdown => Ok(SessionEnd::Shutdown),
        SessionEnd::Dropped(e) if connected_at.elapsed() >= STABILITY_THRESHOLD => {
            Ok(SessionEnd::Dropped(e))
        }
        SessionEnd::Dropped(e) => Err(e),
    }
}

/// Wait for the namespace connect acknowledgement and return its sid.
async fn await_namespace(ws: &mut ChatSocket, namespace: &str) -> Result<String> {
    loop {
        match ws.recv_packet().await? {
            Some(EnginePacket::Message(packet)) if packet.namespace == namespace => {
                match packet.kind {
                    PacketKind::Connect => {
                        let sid = packet
                            .data
                            .as_ref()
                            .and_then(|d| d.get("sid"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        return Ok(sid);
                    }
                    PacketKind::ConnectError => {
                        anyhow::bail!("Server rejected namespace: {}", packet.error_message());
                    }
                    other => {
                        tracing::debug!("Packet before namespace connect: {:?}", other);
                    }
                }
            }
            Some(other) => {
                tracing::debug!("Packet before namespace connect: {:?}", other);
            }
            None => anyhow::bail!("Connection closed before namespace connect"),
        }
    }
}

/// Map an inbound Socket.IO packet to a transport event.
fn dispatch(packet: &SocketPacket) -> Option<TransportEvent> {
    if packet.kind == PacketKind::BinaryEvent || packet.kind == PacketKind::BinaryAck {
        tracing::warn!("Binary packets are not supported, skipping");
        return None;
    }

    let (name, payload) = packet.event_parts()?;
    match name {
        EVENT_PREVIOUS_MESSAGES => Some(TransportEvent::PreviousMessages(
            ChatMessage::batch_from_value(payload),
        )),
        EVENT_RECEIVE_MESSAGE => Some(TransportEvent::ReceiveMessage(ChatMessage::from_value(
            payload,
        ))),
        other => {
            tracing::debug!("Unhandled event {}: {}", other, payload);
            None
        }
    }
}
