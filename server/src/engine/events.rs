use chrono::Utc;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Unique identifier for a live connection (one per transport session, not per user).
pub type ConnectionId = Uuid;

/// Command sent by a client over its connection.
///
/// On the wire every command is a JSON object `{"event": .., "data": ..}`.
/// Field contents are not validated here; a frame either decodes into one of
/// these variants or is dropped by the transport before reaching the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Join (or create) a channel under the given username.
    Join { channel: String, username: String },

    /// Post a chat message into a channel.
    Message {
        channel: String,
        text: String,
        username: String,
    },

    /// Remove a participant from a channel. Only honored for the channel owner.
    Kick { channel: String, target: String },
}

/// Event pushed from the relay to one or more connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RelayEvent {
    /// Username of the owner of a channel that was just created.
    Owner(String),

    /// Full participant snapshot of a channel, replacing any previous list.
    Participants(Vec<String>),

    /// Every username currently online, in any channel.
    AllUsers(Vec<String>),

    /// A user-authored or system message in a channel.
    Message(ChatMessage),

    /// The receiving connection was removed from the named channel.
    Kicked(String),
}

/// A chat line. Never stored; it only lives for the duration of a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    /// Text written by a user. `ts` is milliseconds since the Unix epoch.
    User {
        username: String,
        text: String,
        ts: i64,
    },

    /// Server-generated notice (joins, departures, kicks).
    System { text: String },
}

impl ChatMessage {
    /// Build a user message stamped with the current server time.
    pub fn user(username: impl Into<String>, text: impl Into<String>) -> Self {
        Self::User {
            username: username.into(),
            text: text.into(),
            ts: Utc::now().timestamp_millis(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    #[cfg(test)]
    pub fn text(&self) -> &str {
        match self {
            Self::User { text, .. } | Self::System { text } => text,
        }
    }

    #[cfg(test)]
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }
}

/// User messages serialize as `{username, text, ts}`, system messages as
/// `{system: true, text}` with no username or timestamp.
impl Serialize for ChatMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::User { username, text, ts } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("username", username)?;
                map.serialize_entry("text", text)?;
                map.serialize_entry("ts", ts)?;
                map.end()
            }
            Self::System { text } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("system", &true)?;
                map.serialize_entry("text", text)?;
                map.end()
            }
        }
    }
}
