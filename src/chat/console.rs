//! Line-oriented `listen` and `send` commands.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time;

use super::render::{Alignment, RenderedMessage};
use super::{ChatClient, ViewChange};
use crate::config::Config;
use crate::socketio::{Transport, TransportEvent};

/// How long `send` waits for the first successful connect.
const SEND_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// One printable line per message; `>` marks our own messages.
pub fn format_line(message: &RenderedMessage) -> String {
    let marker = match message.alignment {
        Alignment::Own => '>',
        Alignment::Other => ' ',
    };
    format!(
        "{} [{}] {} ({}): {}",
        marker, message.time_label, message.assignment, message.username, message.body
    )
}

/// Print what a handled event changed.
fn print_change(client: &ChatClient, change: ViewChange) {
    match change {
        ViewChange::Replaced => {
            println!(
                "--- {} ({} earlier messages) ---",
                client.current_room(),
                client.view().len()
            );
            for message in client.view().items() {
                println!("{}", format_line(message));
            }
        }
        ViewChange::Appended => {
            if let Some(message) = client.view().latest() {
                println!("{}", format_line(message));
            }
        }
        ViewChange::DiscardedStale | ViewChange::Unchanged => {}
    }
}

/// Join a room and print its history and live messages until Ctrl-C.
///
/// A given `room` is joined for this run only.
pub async fn listen(config: &Config, room: Option<String>) -> Result<()> {
    let mut client = ChatClient::open_in(config, room.as_deref())?;
    let mut transport = Transport::start(config.transport_settings());
    let mut handle = transport.handle.clone();

    println!(
        "Listening in {} as {} ({})... (Ctrl-C to stop)",
        client.current_room(),
        client.identity().assignment,
        client.identity().username
    );

    loop {
        tokio::select! {
            event = transport.events.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    TransportEvent::Connected { .. } => println!("* connected"),
                    TransportEvent::Disconnected { ref reason } => {
                        println!("* disconnected: {}", reason)
                    }
                    _ => {}
                }
                let change = client.handle(event, &mut handle);
                print_change(&client, change);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                break;
            }
        }
    }

    drop(handle);
    transport.shutdown().await;
    Ok(())
}

/// Connect, join, send one message and disconnect.
///
/// A given `room` is used for this message only.
///
/// The message is not printed locally; `listen` shows it once the server
/// broadcasts it.
pub async fn send_once(config: &Config, room: Option<String>, text: String) -> Result<()> {
    anyhow::ensure!(!text.is_empty(), "Message is empty, nothing sent");

    let mut client = ChatClient::open_in(config, room.as_deref())?;
    let mut transport = Transport::start(config.transport_settings());
    let mut handle = transport.handle.clone();

    let events = &mut transport.events;
    let connected = time::timeout(SEND_CONNECT_TIMEOUT, async {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Connected { .. } => return Some(event),
                TransportEvent::Disconnected { reason } => {
                    tracing::warn!("Connect attempt failed: {}", reason);
                }
                _ => {}
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
    .with_context(|| format!("Could not reach chat server at {}", config.server_url))?;

    client.handle(connected, &mut handle);

    let mut input = text;
    client.submit(&mut input, &mut handle);
    let room = client.current_room().to_string();

    drop(handle);
    transport.shutdown().await;

    println!("Message sent to {}", room);
    Ok(())
}
