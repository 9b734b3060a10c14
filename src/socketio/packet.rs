//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Only the websocket transport is spoken, so every websocket text frame
//! carries exactly one Engine.IO packet:
//!
//! ```text
//! 0{"sid":..}          open (server -> client)
//! 1                    close
//! 2 / 3                ping / pong
//! 4<socket.io packet>  message
//! ```
//!
//! A Socket.IO packet is `<type>[<attachments>-][/<nsp>,][<ack id>][<json>]`.

use serde::Deserialize;
use serde_json::Value;

/// Codec errors for frames that cannot be interpreted at all.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,
    #[error("unknown engine.io packet type {0:?}")]
    UnknownEngineType(char),
    #[error("unknown socket.io packet type {0:?}")]
    UnknownSocketType(char),
    #[error("invalid open handshake: {0}")]
    BadHandshake(String),
    #[error("invalid packet payload: {0}")]
    BadPayload(String),
}

/// Parameters announced by the server in the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for our pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl OpenHandshake {
    /// How long we may go without hearing a ping before the link is dead.
    pub fn liveness_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

/// One Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Decode one websocket text frame.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let rest = chars.as_str();
        match kind {
            '0' => serde_json::from_str(rest)
                .map(EnginePacket::Open)
                .map_err(|e| ProtocolError::BadHandshake(e.to_string())),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(rest.to_string())),
            '3' => Ok(EnginePacket::Pong(rest.to_string())),
            '4' => SocketPacket::decode(rest).map(EnginePacket::Message),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(ProtocolError::UnknownEngineType(other)),
        }
    }

    /// Encode for sending. The client never sends `Open`.
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(packet) => format!("4{}", packet.encode()),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
    BinaryEvent,
    BinaryAck,
}

impl PacketKind {
    fn from_char(c: char) -> Result<Self, ProtocolError> {
        Ok(match c {
            '0' => PacketKind::Connect,
            '1' => PacketKind::Disconnect,
            '2' => PacketKind::Event,
            '3' => PacketKind::Ack,
            '4' => PacketKind::ConnectError,
            '5' => PacketKind::BinaryEvent,
            '6' => PacketKind::BinaryAck,
            other => return Err(ProtocolError::UnknownSocketType(other)),
        })
    }

    fn as_char(self) -> char {
        match self {
            PacketKind::Connect => '0',
            PacketKind::Disconnect => '1',
            PacketKind::Event => '2',
            PacketKind::Ack => '3',
            PacketKind::ConnectError => '4',
            PacketKind::BinaryEvent => '5',
            PacketKind::BinaryAck => '6',
        }
    }

    fn is_binary(self) -> bool {
        matches!(self, PacketKind::BinaryEvent | PacketKind::BinaryAck)
    }
}

/// A Socket.IO packet carried inside an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: PacketKind,
    /// Namespace, always starting with `/`.
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    /// Namespace connect request.
    pub fn connect(namespace: &str) -> Self {
        Self {
            kind: PacketKind::Connect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    /// Namespace disconnect.
    pub fn disconnect(namespace: &str) -> Self {
        Self {
            kind: PacketKind::Disconnect,
            namespace: namespace.to_string(),
            ack_id: None,
            data: None,
        }
    }

    /// Named event with a single payload argument.
    pub fn event(namespace: &str, name: &str, payload: Value) -> Self {
        Self {
            kind: PacketKind::Event,
            namespace: namespace.to_string(),
            ack_id: None,
            data: Some(Value::Array(vec![Value::String(name.to_string()), payload])),
        }
    }

    /// Decode the part after the Engine.IO `4` prefix.
    pub fn decode(input: &str) -> Result<Self, ProtocolError> {
        let mut chars = input.chars();
        let kind = PacketKind::from_char(chars.next().ok_or(ProtocolError::Empty)?)?;
        let mut rest = chars.as_str();

        // Binary packets announce their attachment count as `N-`.
        if kind.is_binary() {
            let dash = rest
                .find('-')
                .ok_or_else(|| ProtocolError::BadPayload("missing attachment count".into()))?;
            rest = &rest[dash + 1..];
        }

        let mut namespace = "/".to_string();
        if rest.starts_with('/') {
            match rest.find(',') {
                Some(comma) => {
                    namespace = rest[..comma].to_string();
                    rest = &rest[comma + 1..];
                }
                None => {
                    namespace = rest.to_string();
                    rest = "";
                }
            }
        }

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse()
                .map_err(|_| ProtocolError::BadPayload("ack id out of range".into()))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(rest)
                    .map_err(|e| ProtocolError::BadPayload(e.to_string()))?,
            )
        };

        Ok(Self {
            kind,
            namespace,
            ack_id,
            data,
        })
    }

    /// Encode without the Engine.IO prefix.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.as_char());
        if self.namespace != "/" && !self.namespace.is_empty() {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(ref data) = self.data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Split an event packet into its name and first argument.
    ///
    /// Events without an argument yield `Value::Null`.
    pub fn event_parts(&self) -> Option<(&str, &Value)> {
        if self.kind != PacketKind::Event {
            return None;
        }
        let args = self.data.as_ref()?.as_array()?;
        let name = args.first()?.as_str()?;
        Some((name, args.get(1).unwrap_or(&Value::Null)))
    }

    /// Error message of a connect error packet.
    pub fn error_message(&self) -> String {
        match self.data {
            Some(Value::String(ref s)) => s.clone(),
            Some(ref v) => v
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| v.to_string()),
            None => "connection refused".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let frame = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        match EnginePacket::decode(frame).unwrap() {
            EnginePacket::Open(open) => {
                assert_eq!(open.sid, "abc");
                assert_eq!(open.ping_interval, 25000);
                assert_eq!(open.liveness_window().as_secs(), 45);
            }
            other => panic!("expected open, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_bad_open() {
        assert!(matches!(
            EnginePacket::decode("0{}"),
            Err(ProtocolError::BadHandshake(_))
        ));
    }

    #[test]
    fn test_decode_ping_close() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(EnginePacket::decode("1").unwrap(), EnginePacket::Close);
        assert_eq!(EnginePacket::decode(""), Err(ProtocolError::Empty));
        assert_eq!(
            EnginePacket::decode("x"),
            Err(ProtocolError::UnknownEngineType('x'))
        );
    }

    #[test]
    fn test_decode_namespaced_event() {
        let frame = r#"42/chat,["receive_message",{"content":"hi","room":"Medical"}]"#;
        let EnginePacket::Message(packet) = EnginePacket::decode(frame).unwrap() else {
            panic!("expected message");
        };
        assert_eq!(packet.namespace, "/chat");
        assert_eq!(packet.ack_id, None);
        let (name, payload) = packet.event_parts().unwrap();
        assert_eq!(name, "receive_message");
        assert_eq!(payload["content"], "hi");
    }

    #[test]
    fn test_decode_event_with_ack_id() {
        let packet = SocketPacket::decode(r#"2/chat,17["previous_messages",[]]"#).unwrap();
        assert_eq!(packet.ack_id, Some(17));
        assert_eq!(packet.event_parts().unwrap().0, "previous_messages");
    }

    #[test]
    fn test_decode_default_namespace() {
        let packet = SocketPacket::decode(r#"2["hello"]"#).unwrap();
        assert_eq!(packet.namespace, "/");
        let (name, payload) = packet.event_parts().unwrap();
        assert_eq!(name, "hello");
        assert!(payload.is_null());
    }

    #[test]
    fn test_decode_connect_ack_and_error() {
        let ack = SocketPacket::decode(r#"0/chat,{"sid":"xyz"}"#).unwrap();
        assert_eq!(ack.kind, PacketKind::Connect);
        assert_eq!(ack.namespace, "/chat");

        let err = SocketPacket::decode(r#"4/chat,{"message":"Not authorized"}"#).unwrap();
        assert_eq!(err.kind, PacketKind::ConnectError);
        assert_eq!(err.error_message(), "Not authorized");
    }

    #[test]
    fn test_decode_namespace_without_payload() {
        let packet = SocketPacket::decode("1/chat,").unwrap();
        assert_eq!(packet.kind, PacketKind::Disconnect);
        assert_eq!(packet.namespace, "/chat");
        assert!(packet.data.is_none());
    }

    #[test]
    fn test_decode_binary_event_header() {
        let packet = SocketPacket::decode(r#"51-/chat,["upload",{"_placeholder":true,"num":0}]"#)
            .unwrap();
        assert_eq!(packet.kind, PacketKind::BinaryEvent);
        assert_eq!(packet.namespace, "/chat");
        // Binary events are not plain events.
        assert!(packet.event_parts().is_none());
    }

    #[test]
    fn test_decode_bad_json() {
        assert!(matches!(
            SocketPacket::decode("2/chat,[oops"),
            Err(ProtocolError::BadPayload(_))
        ));
    }

    #[test]
    fn test_encode_outbound() {
        assert_eq!(
            EnginePacket::Message(SocketPacket::connect("/chat")).encode(),
            "40/chat,"
        );
        assert_eq!(
            EnginePacket::Message(SocketPacket::disconnect("/chat")).encode(),
            "41/chat,"
        );
        assert_eq!(
            EnginePacket::Message(SocketPacket::event("/chat", "join", json!({"room": "Medical"})))
                .encode(),
            r#"42/chat,["join",{"room":"Medical"}]"#
        );
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
    }

    #[test]
    fn test_encode_default_namespace_omitted() {
        assert_eq!(SocketPacket::connect("/").encode(), "0");
    }
}
