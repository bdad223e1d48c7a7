//! Scripted in-memory platform for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use herald_platform::{ChatInfo, Platform, PlatformError, PlatformResult, SentMessage};
use herald_shared::{Button, ChatId, Content, ContentKind, MessageId, MessageRef, UserId, UserSettings};

pub const BOT: UserId = UserId(4242);

/// A platform call as the fake saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send { chat: ChatId, kind: ContentKind },
    Forward { chat: ChatId, source: MessageRef },
    Delete(MessageRef),
    EditText { target: MessageRef, text: String },
    EditCaption { target: MessageRef, caption: String },
    EditMedia { target: MessageRef, kind: ContentKind },
    EditReplyMarkup { target: MessageRef, buttons: usize },
}

#[derive(Default)]
struct State {
    chats: HashMap<ChatId, ChatInfo>,
    admins: HashMap<ChatId, Vec<UserId>>,
    failing_admins: HashSet<ChatId>,
    rejecting: HashSet<ChatId>,
    live: HashSet<(ChatId, MessageId)>,
    next_message: i64,
    counts: HashMap<&'static str, usize>,
    log: Vec<Call>,
}

#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<State>,
}

fn rejected(description: &str) -> PlatformError {
    PlatformError::Api {
        code: 400,
        description: description.to_string(),
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chat(&self, chat: ChatId, title: &str, admins: &[UserId]) {
        let mut state = self.state.lock().unwrap();
        state.chats.insert(
            chat,
            ChatInfo {
                id: chat,
                title: title.to_string(),
                handle: None,
            },
        );
        state.admins.insert(chat, admins.to_vec());
    }

    /// Make `chat` public under `handle`.
    pub fn set_handle(&self, chat: ChatId, handle: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(info) = state.chats.get_mut(&chat) {
            info.handle = Some(handle.to_string());
        }
    }

    pub fn set_admins(&self, chat: ChatId, admins: &[UserId]) {
        self.state.lock().unwrap().admins.insert(chat, admins.to_vec());
    }

    pub fn fail_admins(&self, chat: ChatId) {
        self.state.lock().unwrap().failing_admins.insert(chat);
    }

    /// Every write to `chat` fails from now on.
    pub fn reject(&self, chat: ChatId) {
        self.state.lock().unwrap().rejecting.insert(chat);
    }

    pub fn calls(&self, method: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.counts.get(method).copied().unwrap_or(0)
    }

    pub fn log(&self) -> Vec<Call> {
        self.state.lock().unwrap().log.clone()
    }

    fn record(&self, method: &'static str, call: Option<Call>) -> std::sync::MutexGuard<'_, State> {
        let mut state = self.state.lock().unwrap();
        *state.counts.entry(method).or_default() += 1;
        if let Some(call) = call {
            state.log.push(call);
        }
        state
    }

    fn deliver(&self, method: &'static str, chat: ChatId, call: Call) -> PlatformResult<SentMessage> {
        let mut state = self.record(method, Some(call));
        if state.rejecting.contains(&chat) {
            return Err(rejected("Forbidden: bot is not an admin"));
        }
        state.next_message += 1;
        let message_id = MessageId(state.next_message);
        state.live.insert((chat, message_id));
        let chat_handle = state.chats.get(&chat).and_then(|info| info.handle.clone());
        Ok(SentMessage {
            chat_id: chat,
            message_id,
            chat_handle,
        })
    }

    fn edit(&self, method: &'static str, call: Call, target: MessageRef) -> PlatformResult<()> {
        let state = self.record(method, Some(call));
        if state.rejecting.contains(&target.chat_id) {
            return Err(rejected("Forbidden: bot is not an admin"));
        }
        if !state.live.contains(&(target.chat_id, target.message_id)) {
            return Err(rejected("Bad Request: message to edit not found"));
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for FakePlatform {
    fn bot_id(&self) -> UserId {
        BOT
    }

    async fn send(
        &self,
        chat: ChatId,
        content: &Content,
        _settings: &UserSettings,
    ) -> PlatformResult<SentMessage> {
        self.deliver("send", chat, Call::Send { chat, kind: content.kind })
    }

    async fn forward(
        &self,
        chat: ChatId,
        source: MessageRef,
        _settings: &UserSettings,
    ) -> PlatformResult<SentMessage> {
        self.deliver("forward", chat, Call::Forward { chat, source })
    }

    async fn delete(&self, target: MessageRef) -> PlatformResult<()> {
        let mut state = self.record("delete", Some(Call::Delete(target)));
        if state.rejecting.contains(&target.chat_id) {
            return Err(rejected("Forbidden: bot is not an admin"));
        }
        if !state.live.remove(&(target.chat_id, target.message_id)) {
            return Err(rejected("Bad Request: message to delete not found"));
        }
        Ok(())
    }

    async fn edit_text(
        &self,
        target: MessageRef,
        text: &str,
        _buttons: &[Button],
        _settings: &UserSettings,
    ) -> PlatformResult<()> {
        let call = Call::EditText {
            target,
            text: text.to_string(),
        };
        self.edit("edit_text", call, target)
    }

    async fn edit_caption(
        &self,
        target: MessageRef,
        caption: &str,
        _buttons: &[Button],
        _settings: &UserSettings,
    ) -> PlatformResult<()> {
        let call = Call::EditCaption {
            target,
            caption: caption.to_string(),
        };
        self.edit("edit_caption", call, target)
    }

    async fn edit_media(
        &self,
        target: MessageRef,
        content: &Content,
        _settings: &UserSettings,
    ) -> PlatformResult<()> {
        let call = Call::EditMedia {
            target,
            kind: content.kind,
        };
        self.edit("edit_media", call, target)
    }

    async fn edit_reply_markup(&self, target: MessageRef, buttons: &[Button]) -> PlatformResult<()> {
        let call = Call::EditReplyMarkup {
            target,
            buttons: buttons.len(),
        };
        self.edit("edit_reply_markup", call, target)
    }

    async fn get_chat(&self, chat: ChatId) -> PlatformResult<ChatInfo> {
        let state = self.record("get_chat", None);
        state
            .chats
            .get(&chat)
            .cloned()
            .ok_or_else(|| rejected("Bad Request: chat not found"))
    }

    async fn get_chat_administrators(&self, chat: ChatId) -> PlatformResult<Vec<UserId>> {
        let state = self.record("get_chat_administrators", None);
        if state.failing_admins.contains(&chat) {
            return Err(rejected("Bad Request: member list is inaccessible"));
        }
        state
            .admins
            .get(&chat)
            .cloned()
            .ok_or_else(|| rejected("Bad Request: chat not found"))
    }
}
