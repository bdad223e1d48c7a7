//! Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use herald_shared::{Button, ChatId, Content, MessageId, MessageRef, UserId, UserSettings};

use crate::markup;
use crate::platform::{ChatInfo, Platform, PlatformError, PlatformResult, SentMessage};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiChat {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl From<ApiChat> for ChatInfo {
    fn from(chat: ApiChat) -> Self {
        Self {
            id: ChatId(chat.id),
            title: chat.title.or(chat.first_name).unwrap_or_default(),
            handle: chat.username,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message_id: i64,
    chat: ApiChat,
}

impl From<ApiMessage> for SentMessage {
    fn from(msg: ApiMessage) -> Self {
        Self {
            chat_id: ChatId(msg.chat.id),
            message_id: MessageId(msg.message_id),
            chat_handle: msg.chat.username,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiMember {
    user: ApiUser,
}

/// Unwrap the Bot API envelope into its `result`.
fn decode_response<T: DeserializeOwned>(response: ApiResponse) -> PlatformResult<T> {
    if !response.ok {
        let code = response.error_code.unwrap_or_default();
        if let Some(retry_after) = response.parameters.and_then(|p| p.retry_after) {
            return Err(PlatformError::RateLimited { retry_after });
        }
        return Err(PlatformError::Api {
            code,
            description: response.description.unwrap_or_default(),
        });
    }

    let result = response
        .result
        .ok_or_else(|| PlatformError::Decode("missing result".into()))?;
    serde_json::from_value(result).map_err(|e| PlatformError::Decode(e.to_string()))
}

/// A [`Platform`] backed by the Telegram Bot API over HTTPS.
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    bot_id: UserId,
}

impl TelegramClient {
    /// Build a client and learn the bot's own id with `getMe`.
    pub async fn connect(api_url: &str, token: &str) -> PlatformResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let mut client = Self {
            http,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            bot_id: UserId(0),
        };

        let me: ApiUser = client.call("getMe", &Value::Object(Default::default())).await?;
        client.bot_id = UserId(me.id);
        info!(bot_id = me.id, "Connected to Bot API");
        Ok(client)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> PlatformResult<T> {
        debug!(method, "Bot API call");
        let response: ApiResponse = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        decode_response(response).map_err(|e| {
            warn!(method, "Bot API call failed: {e}");
            e
        })
    }
}

#[async_trait]
impl Platform for TelegramClient {
    fn bot_id(&self) -> UserId {
        self.bot_id
    }

    async fn send(
        &self,
        chat: ChatId,
        content: &Content,
        settings: &UserSettings,
    ) -> PlatformResult<SentMessage> {
        let (method, body) = markup::send_request(chat, content, settings)?;
        let msg: ApiMessage = self.call(method, &body).await?;
        Ok(msg.into())
    }

    async fn forward(
        &self,
        chat: ChatId,
        source: MessageRef,
        settings: &UserSettings,
    ) -> PlatformResult<SentMessage> {
        let body = markup::forward_request(chat, source, settings);
        let msg: ApiMessage = self.call("forwardMessage", &body).await?;
        Ok(msg.into())
    }

    async fn delete(&self, target: MessageRef) -> PlatformResult<()> {
        let _: bool = self
            .call("deleteMessage", &markup::delete_request(target))
            .await?;
        Ok(())
    }

    async fn edit_text(
        &self,
        target: MessageRef,
        text: &str,
        buttons: &[Button],
        settings: &UserSettings,
    ) -> PlatformResult<()> {
        let body = markup::edit_text_request(target, text, buttons, settings);
        let _: Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn edit_caption(
        &self,
        target: MessageRef,
        caption: &str,
        buttons: &[Button],
        settings: &UserSettings,
    ) -> PlatformResult<()> {
        let body = markup::edit_caption_request(target, caption, buttons, settings);
        let _: Value = self.call("editMessageCaption", &body).await?;
        Ok(())
    }

    async fn edit_media(
        &self,
        target: MessageRef,
        content: &Content,
        settings: &UserSettings,
    ) -> PlatformResult<()> {
        let body = markup::edit_media_request(target, content, settings)?;
        let _: Value = self.call("editMessageMedia", &body).await?;
        Ok(())
    }

    async fn edit_reply_markup(&self, target: MessageRef, buttons: &[Button]) -> PlatformResult<()> {
        let body = markup::edit_reply_markup_request(target, buttons);
        let _: Value = self.call("editMessageReplyMarkup", &body).await?;
        Ok(())
    }

    async fn get_chat(&self, chat: ChatId) -> PlatformResult<ChatInfo> {
        let chat: ApiChat = self
            .call("getChat", &serde_json::json!({ "chat_id": chat.0 }))
            .await?;
        Ok(chat.into())
    }

    async fn get_chat_administrators(&self, chat: ChatId) -> PlatformResult<Vec<UserId>> {
        let members: Vec<ApiMember> = self
            .call(
                "getChatAdministrators",
                &serde_json::json!({ "chat_id": chat.0 }),
            )
            .await?;
        Ok(members.into_iter().map(|m| UserId(m.user.id)).collect())
    }
}
