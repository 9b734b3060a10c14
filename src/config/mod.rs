//! Configuration and persisted client state

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::socketio::{session, TransportSettings};

/// Room joined when nothing has been persisted yet.
pub const DEFAULT_ROOM: &str = "Medical";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("org", "medtrack", "medtrack-chat")
        .context("Could not determine config directory")
}

fn default_server_url() -> String {
    "http://localhost:8083".to_string()
}

fn default_namespace() -> String {
    "/chat".to_string()
}

fn default_send_event() -> String {
    "send_message".to_string()
}

fn default_room() -> String {
    DEFAULT_ROOM.to_string()
}

fn default_rooms() -> Vec<String> {
    ["Medical", "Triage", "Security", "Command"]
        .iter()
        .map(|r| r.to_string())
        .collect()
}

fn default_max_backoff_secs() -> u64 {
    64
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Chat server base URL (http/https/ws/wss)
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Socket.IO namespace of the chat
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Event name used for outbound messages
    #[serde(default = "default_send_event")]
    pub send_event: String,
    #[serde(default = "default_room")]
    pub default_room: String,
    /// Rooms offered in the room picker
    #[serde(default = "default_rooms")]
    pub rooms: Vec<String>,
    /// Accepted assignments. Empty means any.
    #[serde(default)]
    pub assignments: Vec<String>,
    /// Stored identity (from last login)
    #[serde(default)]
    pub assignment: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            namespace: default_namespace(),
            send_event: default_send_event(),
            default_room: default_room(),
            rooms: default_rooms(),
            assignments: Vec::new(),
            assignment: None,
            username: None,
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

/// Who this client speaks as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Role/team label, also used for self/other alignment.
    pub assignment: String,
    pub username: String,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Apply one-off command line overrides.
    pub fn with_overrides(
        mut self,
        server: Option<String>,
        assignment: Option<String>,
        username: Option<String>,
    ) -> Self {
        if let Some(server) = server {
            self.server_url = server;
        }
        if assignment.is_some() {
            self.assignment = assignment;
        }
        if username.is_some() {
            self.username = username;
        }
        self
    }

    /// Resolve the identity to chat as.
    pub fn identity(&self) -> Result<Identity> {
        let assignment = self
            .assignment
            .clone()
            .filter(|a| !a.trim().is_empty())
            .context("No assignment set. Run `medtrack-chat login` or pass --assignment.")?;
        let username = self
            .username
            .clone()
            .filter(|u| !u.trim().is_empty())
            .context("No username set. Run `medtrack-chat login` or pass --username.")?;
        self.check_assignment(&assignment)?;
        Ok(Identity {
            assignment,
            username,
        })
    }

    /// Reject assignments outside a configured allow-list.
    pub fn check_assignment(&self, assignment: &str) -> Result<()> {
        if !self.assignments.is_empty() && !self.assignments.iter().any(|a| a == assignment) {
            anyhow::bail!(
                "Invalid assignment {:?}. Known assignments: {}",
                assignment,
                self.assignments.join(", ")
            );
        }
        Ok(())
    }

    pub fn set_identity(&mut self, identity: &Identity) {
        self.assignment = Some(identity.assignment.clone());
        self.username = Some(identity.username.clone());
    }

    pub fn clear_identity(&mut self) {
        self.assignment = None;
        self.username = None;
    }

    /// Settings for the socket transport.
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            server_url: self.server_url.clone(),
            namespace: session::normalize_namespace(&self.namespace),
            send_event: self.send_event.clone(),
            max_backoff_secs: self.max_backoff_secs,
        }
    }
}

/// Storage for the selected room, surviving restarts.
pub trait RoomStore {
    fn load_room(&self) -> Option<String>;
    fn save_room(&mut self, room: &str) -> Result<()>;
}

/// Persisted client state file contents.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ClientState {
    current_room: Option<String>,
}

/// `state.toml` in the platform data directory.
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// State file at the default location.
    pub fn open_default() -> Result<Self> {
        let dir = project_dirs()?.data_dir().to_path_buf();
        Ok(Self::at(dir.join("state.toml")))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    fn read(&self) -> Result<ClientState> {
        if !self.path.exists() {
            return Ok(ClientState::default());
        }
        let content = fs::read_to_string(&self.path).context("Failed to read state file")?;
        toml::from_str(&content).context("Failed to parse state file")
    }
}

impl RoomStore for StateFile {
    fn load_room(&self) -> Option<String> {
        match self.read() {
            Ok(state) => state.current_room.filter(|r| !r.is_empty()),
            Err(e) => {
                tracing::warn!("Ignoring unreadable state file: {:#}", e);
                None
            }
        }
    }

    fn save_room(&mut self, room: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create state directory")?;
        }
        let state = ClientState {
            current_room: Some(room.to_string()),
        };
        let content = toml::to_string_pretty(&state).context("Failed to serialize state")?;
        fs::write(&self.path, content).context("Failed to write state file")?;
        Ok(())
    }
}

/// Room kept in memory only. Used for one-off runs that must not change the
/// saved room, and in tests.
#[derive(Default, Clone)]
pub struct MemoryRoomStore {
    pub room: Arc<Mutex<Option<String>>>,
}

impl MemoryRoomStore {
    pub fn with_room(room: &str) -> Self {
        Self {
            room: Arc::new(Mutex::new(Some(room.to_string()))),
        }
    }

    pub fn saved(&self) -> Option<String> {
        self.room
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RoomStore for MemoryRoomStore {
    fn load_room(&self) -> Option<String> {
        self.saved()
    }

    fn save_room(&mut self, room: &str) -> Result<()> {
        *self.room.lock().unwrap_or_else(PoisonError::into_inner) = Some(room.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.default_room, "Medical");
        assert_eq!(config.namespace, "/chat");
        assert_eq!(config.max_backoff_secs, 64);
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str(
            r#"
            server_url = "http://192.168.1.20:8083"
            send_event = "send_message_public"
            assignment = "Aid 3"
            username = "Robin"
            "#,
        )
        .unwrap();
        assert_eq!(config.server_url, "http://192.168.1.20:8083");
        assert_eq!(config.send_event, "send_message_public");
        assert_eq!(config.rooms, default_rooms());
        let identity = config.identity().unwrap();
        assert_eq!(identity.assignment, "Aid 3");
        assert_eq!(identity.username, "Robin");
    }

    #[test]
    fn test_identity_required() {
        let config = Config::default();
        assert!(config.identity().is_err());

        let config = Config::default().with_overrides(None, Some("Medical".into()), Some("  ".into()));
        assert!(config.identity().is_err());
    }

    #[test]
    fn test_assignment_allow_list() {
        let config = Config {
            assignments: vec!["Aid 1".into(), "Med Tracking".into()],
            ..Config::default()
        }
        .with_overrides(None, Some("Aid 9".into()), Some("Kim".into()));
        let err = config.identity().unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid assignment"));

        let config = config.with_overrides(None, Some("Aid 1".into()), None);
        assert_eq!(config.identity().unwrap().assignment, "Aid 1");
    }

    #[test]
    fn test_overrides_and_identity_roundtrip() {
        let mut config = Config::default().with_overrides(Some("https://chat.example.org".into()), None, None);
        assert_eq!(config.server_url, "https://chat.example.org");

        config.set_identity(&Identity {
            assignment: "Security".into(),
            username: "Ash".into(),
        });
        let restored: Config = toml::from_str(&toml::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(restored.assignment.as_deref(), Some("Security"));

        config.clear_identity();
        assert!(config.identity().is_err());
    }

    #[test]
    fn test_transport_settings_normalizes_namespace() {
        let config = Config {
            namespace: "chat".into(),
            ..Config::default()
        };
        assert_eq!(config.transport_settings().namespace, "/chat");
    }

    #[test]
    fn test_state_file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("medtrack-chat-test-{}", std::process::id()));
        let path = dir.join("nested").join("state.toml");
        let mut store = StateFile::at(path.clone());
        assert_eq!(store.load_room(), None);

        store.save_room("Triage").unwrap();
        assert_eq!(StateFile::at(path).load_room().as_deref(), Some("Triage"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_state_file_garbage_is_ignored() {
        let dir = std::env::temp_dir().join(format!("medtrack-chat-garbage-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.toml");
        fs::write(&path, "current_room = [").unwrap();
        assert_eq!(StateFile::at(path).load_room(), None);
        let _ = fs::remove_dir_all(dir);
    }
}
