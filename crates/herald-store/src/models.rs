//! Domain model structs persisted in the database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use herald_shared::{ChatId, Content, MessageId, PostId, UserId};

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// One physical copy of a post: the chat it was delivered to and the
/// message that holds it there.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    /// Public handle of the chat at delivery time, for canonical links.
    #[serde(default)]
    pub chat_handle: Option<String>,
}

impl Placement {
    pub fn link(&self) -> Option<String> {
        self.chat_id
            .message_link(self.message_id, self.chat_handle.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A logical post and the placements of its current instantiation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub author: UserId,
    /// What was delivered. `content.source` is not persisted.
    pub content: Content,
    /// Placements in delivery order.
    pub placements: Vec<Placement>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// A post with no placements yet, stamped with the current time.
    pub fn new(id: PostId, author: UserId, content: Content) -> Self {
        Self {
            id,
            author,
            content,
            placements: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
