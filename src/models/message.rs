//! Chat message records as they travel over the `/chat` namespace

use serde::de;
use serde::{Deserialize, Serialize};

/// Accept a string, number, bool or null and turn it into a `String`.
///
/// The server forwards database rows verbatim, so columns are not always
/// strings. Null and missing values become the empty string.
fn lenient_string<'de, D: de::Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = String;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("string, number, bool or null")
        }
        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }
        fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<String, E> {
            Ok(v)
        }
        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }
        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }
        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }
        fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }
        fn visit_unit<E: de::Error>(self) -> std::result::Result<String, E> {
            Ok(String::new())
        }
        fn visit_none<E: de::Error>(self) -> std::result::Result<String, E> {
            Ok(String::new())
        }
        fn visit_some<D2: de::Deserializer<'de>>(
            self,
            d: D2,
        ) -> std::result::Result<String, D2::Error> {
            d.deserialize_any(self)
        }
    }
    d.deserialize_any(Visitor)
}

/// A chat message. Never mutated after it is received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Database row id, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: String,
    /// Sender's role/team, e.g. "Medical" or "Aid 3".
    #[serde(default, deserialize_with = "lenient_string")]
    pub assignment: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub room: String,
    /// Raw timestamp as sent by the server. Display only.
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: String,
}

impl ChatMessage {
    /// Decode one message from an arbitrary JSON value.
    ///
    /// Never fails: anything that is not a usable object degrades to a
    /// message with empty fields.
    pub fn from_value(value: &serde_json::Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!("Malformed chat message ({}): {}", e, value);
                // Keep whatever string fields are present.
                let field = |name: &str| {
                    value
                        .get(name)
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string()
                };
                Self {
                    id: None,
                    content: field("content"),
                    assignment: field("assignment"),
                    username: field("username"),
                    room: field("room"),
                    created_at: field("created_at"),
                }
            }
        }
    }

    /// Decode a history batch. Non-array payloads yield an empty batch.
    pub fn batch_from_value(value: &serde_json::Value) -> Vec<Self> {
        match value.as_array() {
            Some(items) => items.iter().map(Self::from_value).collect(),
            None => {
                tracing::warn!("History payload is not an array, treating as empty");
                Vec::new()
            }
        }
    }
}

/// Payload of the `join` and `leave` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRequest {
    pub room: String,
}

impl RoomRequest {
    pub fn new(room: impl Into<String>) -> Self {
        Self { room: room.into() }
    }
}

/// Payload of the outbound send event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    /// Message body. The server stores it as `content`.
    pub message: String,
    pub room: String,
    pub assignment: String,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_database_row() {
        let v = json!({
            "id": 7,
            "room": "Medical",
            "assignment": "Aid 2",
            "username": "Pat",
            "content": "Runner down at mile 20",
            "created_at": "2024-10-27 09:15:00"
        });
        let msg = ChatMessage::from_value(&v);
        assert_eq!(msg.id, Some(7));
        assert_eq!(msg.room, "Medical");
        assert_eq!(msg.assignment, "Aid 2");
        assert_eq!(msg.username, "Pat");
        assert_eq!(msg.content, "Runner down at mile 20");
        assert_eq!(msg.created_at, "2024-10-27 09:15:00");
    }

    #[test]
    fn test_missing_and_null_fields_become_empty() {
        let msg = ChatMessage::from_value(&json!({"content": "hi", "username": null}));
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.username, "");
        assert_eq!(msg.assignment, "");
        assert_eq!(msg.created_at, "");
    }

    #[test]
    fn test_non_string_fields_are_stringified() {
        let msg = ChatMessage::from_value(&json!({"content": 42, "created_at": 1730000000000u64}));
        assert_eq!(msg.content, "42");
        assert_eq!(msg.created_at, "1730000000000");
    }

    #[test]
    fn test_non_object_degrades_to_empty() {
        assert_eq!(ChatMessage::from_value(&json!("oops")), ChatMessage::default());
        assert_eq!(ChatMessage::from_value(&json!([1, 2])), ChatMessage::default());
    }

    #[test]
    fn test_bad_id_keeps_text_fields() {
        let msg = ChatMessage::from_value(&json!({"id": "x", "content": "still here"}));
        assert_eq!(msg.id, None);
        assert_eq!(msg.content, "still here");
    }

    #[test]
    fn test_batch_keeps_order() {
        let batch = ChatMessage::batch_from_value(&json!([
            {"content": "first"},
            "garbage",
            {"content": "third"}
        ]));
        let bodies: Vec<&str> = batch.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(bodies, vec!["first", "", "third"]);
    }

    #[test]
    fn test_batch_non_array_is_empty() {
        assert!(ChatMessage::batch_from_value(&json!({"content": "x"})).is_empty());
    }

    #[test]
    fn test_send_payload_shape() {
        let payload = SendMessage {
            message: "hello".to_string(),
            room: "Triage".to_string(),
            assignment: "Medical".to_string(),
            username: "Sam".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"message": "hello", "room": "Triage", "assignment": "Medical", "username": "Sam"})
        );
        assert_eq!(
            serde_json::to_value(RoomRequest::new("Medical")).unwrap(),
            json!({"room": "Medical"})
        );
    }
}
