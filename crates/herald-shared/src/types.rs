use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::constants::{LINK_BASE, SUPERGROUP_PREFIX};

/// Platform user identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform chat identifier. Its sign and prefix encode the chat kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl ChatId {
    pub fn kind(&self) -> DestinationKind {
        DestinationKind::from_id(self.0)
    }

    /// Canonical link to a message in this chat.
    ///
    /// Public chats link through their handle. Private supergroups and
    /// channels use the `/c/` form with the `-100` prefix stripped. Basic
    /// groups and private chats have no shareable message links.
    pub fn message_link(&self, message_id: MessageId, handle: Option<&str>) -> Option<String> {
        if let Some(handle) = handle.filter(|h| !h.is_empty()) {
            return Some(format!("{LINK_BASE}/{handle}/{}", message_id.0));
        }
        match self.kind() {
            DestinationKind::Supergroup => Some(format!(
                "{LINK_BASE}/c/{}/{}",
                SUPERGROUP_PREFIX - self.0,
                message_id.0
            )),
            DestinationKind::Private | DestinationKind::Group => None,
        }
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one physical message inside a chat.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    Private,
    Group,
    Supergroup,
}

impl DestinationKind {
    pub fn from_id(id: i64) -> Self {
        if id > 0 {
            Self::Private
        } else if id.to_string().starts_with("-100") {
            Self::Supergroup
        } else {
            Self::Group
        }
    }
}

/// Opaque identity of a logical post. A fresh one is minted for every
/// create, repost and edit; identifiers are never reused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    /// Millisecond timestamp followed by 8 random hex characters.
    pub fn generate() -> Self {
        let mut random = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut random);
        Self(format!(
            "{}{}",
            chrono::Utc::now().timestamp_millis(),
            hex::encode(random)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A message that already exists somewhere on the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Where an action was triggered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "chat_id")]
pub enum Surface {
    /// The operator's private session with the bot.
    Private,
    /// Inside a specific destination; the action targets only that chat.
    Chat(ChatId),
}

impl Default for Surface {
    fn default() -> Self {
        Self::Private
    }
}
