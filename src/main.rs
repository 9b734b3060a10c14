//! MedTrack chat client
//!
//! Room-scoped real-time chat against the MedTrack Socket.IO server, from
//! the command line or a terminal UI.

mod chat;
mod config;
mod models;
mod socketio;
mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, Identity, RoomStore, StateFile};

#[derive(Parser)]
#[command(name = "medtrack-chat")]
#[command(about = "Room-scoped chat client for MedTrack", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Chat server URL (overrides config)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Assignment to chat as (overrides config)
    #[arg(long, global = true)]
    assignment: Option<String>,

    /// Username to chat as (overrides config)
    #[arg(long, global = true)]
    username: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the identity given with --assignment and --username
    Login,

    /// Forget the stored identity
    Logout,

    /// Show configuration, identity and current room
    Status,

    /// Show or set the room joined on start
    Room {
        /// Room to switch to
        name: Option<String>,
    },

    /// Print room history and live messages until Ctrl-C
    Listen {
        /// Room to join for this run only (the saved room is unchanged)
        #[arg(short, long)]
        room: Option<String>,
    },

    /// Send one message
    Send {
        /// Room to send to this time only (the saved room is unchanged)
        #[arg(short, long)]
        room: Option<String>,

        /// Message content
        message: String,
    },

    /// Launch the terminal user interface
    Tui,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, except in the TUI where they feed the debug pane.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let log_buffer = tui::LogBuffer::new();
    if matches!(cli.command, Commands::Tui) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(log_buffer.clone()),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    let login = match (&cli.command, &cli.assignment, &cli.username) {
        (Commands::Login, Some(assignment), Some(username)) => Some(Identity {
            assignment: assignment.clone(),
            username: username.clone(),
        }),
        _ => None,
    };
    let config = Config::load()?.with_overrides(cli.server, cli.assignment, cli.username);

    match cli.command {
        Commands::Login => {
            let identity = login.context("login needs both --assignment and --username")?;
            config.check_assignment(&identity.assignment)?;
            let mut stored = Config::load()?;
            stored.set_identity(&identity);
            stored.save()?;
            println!("Logged in as {} ({})", identity.assignment, identity.username);
        }
        Commands::Logout => {
            let mut stored = Config::load()?;
            stored.clear_identity();
            stored.save()?;
            println!("Logged out");
        }
        Commands::Status => {
            println!("Config:    {}", Config::config_path()?.display());
            println!("Server:    {}", config.server_url);
            println!("Namespace: {}", config.namespace);
            match config.identity() {
                Ok(identity) => {
                    println!("Identity:  {} ({})", identity.assignment, identity.username)
                }
                Err(e) => println!("Identity:  not set ({})", e),
            }
            let room = StateFile::open_default()?
                .load_room()
                .unwrap_or_else(|| config.default_room.clone());
            println!("Room:      {}", room);
        }
        Commands::Room { name } => {
            let mut store = StateFile::open_default()?;
            match name {
                Some(name) => {
                    anyhow::ensure!(!name.is_empty(), "Room name is empty");
                    store.save_room(&name)?;
                    println!("Room set to {}", name);
                }
                None => {
                    let room = store
                        .load_room()
                        .unwrap_or_else(|| config.default_room.clone());
                    println!("{}", room);
                }
            }
        }
        Commands::Listen { room } => {
            chat::console::listen(&config, room).await?;
        }
        Commands::Send { room, message } => {
            tracing::info!("Sending message...");
            chat::console::send_once(&config, room, message).await?;
        }
        Commands::Tui => {
            tui::run(config, log_buffer).await?;
        }
    }

    Ok(())
}
