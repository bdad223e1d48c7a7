//! The messaging-platform seam.
//!
//! Everything Herald does to a destination chat goes through [`Platform`].
//! The production implementation is [`TelegramClient`]; tests substitute a
//! scripted fake.
//!
//! [`TelegramClient`]: crate::telegram::TelegramClient

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use herald_shared::{Button, ChatId, Content, MessageId, MessageRef, UserId, UserSettings};

/// Errors returned by platform calls. Callers treat every variant as
/// "this destination failed this attempt".
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Platform rejected the request ({code}): {description}")]
    Api { code: i64, description: String },

    #[error("Rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Malformed platform response: {0}")]
    Decode(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl PlatformError {
    /// Whether the target chat or message no longer exists.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { code, description } => {
                *code == 404 || description.to_ascii_lowercase().contains("not found")
            }
            _ => false,
        }
    }
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Public metadata of a destination chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: ChatId,
    pub title: String,
    /// Public handle, if the chat has one.
    #[serde(default)]
    pub handle: Option<String>,
}

/// A message the platform just created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub chat_handle: Option<String>,
}

impl SentMessage {
    pub fn link(&self) -> Option<String> {
        self.chat_id
            .message_link(self.message_id, self.chat_handle.as_deref())
    }
}

/// Operations Herald needs from a messaging platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// The bot's own user id, used to check it still administers a chat.
    fn bot_id(&self) -> UserId;

    /// Deliver `content` to `chat` as a fresh message.
    async fn send(
        &self,
        chat: ChatId,
        content: &Content,
        settings: &UserSettings,
    ) -> PlatformResult<SentMessage>;

    /// Forward an existing message, keeping the "forwarded from" tag.
    async fn forward(
        &self,
        chat: ChatId,
        source: MessageRef,
        settings: &UserSettings,
    ) -> PlatformResult<SentMessage>;

    async fn delete(&self, target: MessageRef) -> PlatformResult<()>;

    async fn edit_text(
        &self,
        target: MessageRef,
        text: &str,
        buttons: &[Button],
        settings: &UserSettings,
    ) -> PlatformResult<()>;

    async fn edit_caption(
        &self,
        target: MessageRef,
        caption: &str,
        buttons: &[Button],
        settings: &UserSettings,
    ) -> PlatformResult<()>;

    /// Replace the media of `target` with the payload of `content`.
    async fn edit_media(
        &self,
        target: MessageRef,
        content: &Content,
        settings: &UserSettings,
    ) -> PlatformResult<()>;

    async fn edit_reply_markup(&self, target: MessageRef, buttons: &[Button]) -> PlatformResult<()>;

    async fn get_chat(&self, chat: ChatId) -> PlatformResult<ChatInfo>;

    /// User ids of every administrator of `chat`.
    async fn get_chat_administrators(&self, chat: ChatId) -> PlatformResult<Vec<UserId>>;
}
