//! Socket.IO endpoint resolution

use anyhow::{Context, Result};
use url::Url;

/// Engine.IO protocol revision spoken by Flask-SocketIO 5.x.
const ENGINE_IO_VERSION: &str = "4";

/// Build the websocket URL for a chat server base URL.
///
/// `http://host:8083` becomes `ws://host:8083/socket.io/?EIO=4&transport=websocket`.
/// A path on the base URL is kept as a prefix (for servers behind a proxy).
pub fn endpoint_url(server_url: &str) -> Result<String> {
    let mut url = Url::parse(server_url)
        .with_context(|| format!("Invalid server URL: {}", server_url))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => anyhow::bail!("Unsupported server URL scheme: {}", other),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("Cannot use scheme {} for {}", scheme, server_url))?;

    let prefix = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{}/socket.io/", prefix));
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", "websocket");

    Ok(url.to_string())
}

/// Normalize a namespace so it always starts with `/`.
pub fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim();
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
