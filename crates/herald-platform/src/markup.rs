//! Request bodies for the Bot API.
//!
//! Kept free of I/O so the per-kind dispatch can be tested directly.

use serde_json::{json, Value};

use herald_shared::{keyboard_rows, Button, ChatId, Content, ContentKind, MessageRef, UserSettings};

use crate::platform::PlatformError;

pub const PARSE_MODE: &str = "HTML";

/// Inline keyboard markup for a list of URL buttons.
pub fn inline_keyboard(buttons: &[Button]) -> Value {
    let rows: Vec<Vec<Value>> = keyboard_rows(buttons)
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|b| json!({ "text": b.name, "url": b.url }))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

/// Bot API method that delivers a fresh message of `kind`.
pub fn send_method(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Text => "sendMessage",
        ContentKind::Sticker => "sendSticker",
        ContentKind::Document => "sendDocument",
        ContentKind::Photo => "sendPhoto",
        ContentKind::Audio => "sendAudio",
        ContentKind::Voice => "sendVoice",
        ContentKind::Video => "sendVideo",
        ContentKind::VideoNote => "sendVideoNote",
        ContentKind::Animation => "sendAnimation",
    }
}

/// Request field carrying the payload of `kind`, or the body for text.
fn payload_field(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Text => "text",
        ContentKind::Sticker => "sticker",
        ContentKind::Document => "document",
        ContentKind::Photo => "photo",
        ContentKind::Audio => "audio",
        ContentKind::Voice => "voice",
        ContentKind::Video => "video",
        ContentKind::VideoNote => "video_note",
        ContentKind::Animation => "animation",
    }
}

fn link_preview(settings: &UserSettings) -> Value {
    json!({ "is_disabled": settings.disable_link_preview })
}

/// Method name and body for delivering `content` to `chat`.
pub fn send_request(
    chat: ChatId,
    content: &Content,
    settings: &UserSettings,
) -> Result<(&'static str, Value), PlatformError> {
    let kind = content.kind;
    let mut body = json!({
        "chat_id": chat.0,
        "disable_notification": settings.quiet,
        "protect_content": settings.protect_content,
        "reply_markup": inline_keyboard(&content.buttons),
    });

    if kind.has_payload() {
        let file = content
            .payload()
            .ok_or_else(|| PlatformError::Unsupported(format!("{kind} without a file")))?;
        body[payload_field(kind)] = json!(file);
    } else {
        body["text"] = json!(content.text);
        body["parse_mode"] = json!(PARSE_MODE);
        body["link_preview_options"] = link_preview(settings);
    }

    if kind.accepts_caption() && !content.text.is_empty() {
        body["caption"] = json!(content.text);
        body["parse_mode"] = json!(PARSE_MODE);
    }
    if kind.accepts_spoiler() && settings.spoiler {
        body["has_spoiler"] = json!(true);
    }
    if kind.accepts_caption_above() && settings.caption_above {
        body["show_caption_above_media"] = json!(true);
    }

    Ok((send_method(kind), body))
}

pub fn forward_request(chat: ChatId, source: MessageRef, settings: &UserSettings) -> Value {
    json!({
        "chat_id": chat.0,
        "from_chat_id": source.chat_id.0,
        "message_id": source.message_id.0,
        "disable_notification": settings.quiet,
        "protect_content": settings.protect_content,
    })
}

pub fn delete_request(target: MessageRef) -> Value {
    json!({ "chat_id": target.chat_id.0, "message_id": target.message_id.0 })
}

pub fn edit_text_request(
    target: MessageRef,
    text: &str,
    buttons: &[Button],
    settings: &UserSettings,
) -> Value {
    json!({
        "chat_id": target.chat_id.0,
        "message_id": target.message_id.0,
        "text": text,
        "parse_mode": PARSE_MODE,
        "link_preview_options": link_preview(settings),
        "reply_markup": inline_keyboard(buttons),
    })
}

pub fn edit_caption_request(
    target: MessageRef,
    caption: &str,
    buttons: &[Button],
    settings: &UserSettings,
) -> Value {
    json!({
        "chat_id": target.chat_id.0,
        "message_id": target.message_id.0,
        "caption": caption,
        "parse_mode": PARSE_MODE,
        "show_caption_above_media": settings.caption_above,
        "reply_markup": inline_keyboard(buttons),
    })
}

/// Body of an in-place media replacement. Fails for kinds that have no
/// input-media form.
pub fn edit_media_request(
    target: MessageRef,
    content: &Content,
    settings: &UserSettings,
) -> Result<Value, PlatformError> {
    let kind = content.kind;
    let media_type = kind
        .input_media_type()
        .ok_or_else(|| PlatformError::Unsupported(format!("cannot swap in a {kind}")))?;
    let file = content
        .payload()
        .ok_or_else(|| PlatformError::Unsupported(format!("{kind} without a file")))?;

    let mut media = json!({
        "type": media_type,
        "media": file,
        "caption": content.text,
        "parse_mode": PARSE_MODE,
    });
    if kind.accepts_spoiler() {
        media["has_spoiler"] = json!(settings.spoiler);
    }
    if kind.accepts_caption_above() {
        media["show_caption_above_media"] = json!(settings.caption_above);
    }

    Ok(json!({
        "chat_id": target.chat_id.0,
        "message_id": target.message_id.0,
        "media": media,
        "reply_markup": inline_keyboard(&content.buttons),
    }))
}

pub fn edit_reply_markup_request(target: MessageRef, buttons: &[Button]) -> Value {
    json!({
        "chat_id": target.chat_id.0,
        "message_id": target.message_id.0,
        "reply_markup": inline_keyboard(buttons),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_shared::MessageId;

    fn buttons() -> Vec<Button> {
        vec![
            Button { name: "A".into(), url: "https://a.example".into(), same_row: false },
            Button { name: "B".into(), url: "https://b.example".into(), same_row: true },
            Button { name: "C".into(), url: "https://c.example".into(), same_row: false },
        ]
    }

    #[test]
    fn test_inline_keyboard_rows() {
        let markup = inline_keyboard(&buttons());
        let rows = markup["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_array().unwrap().len(), 2);
        assert_eq!(rows[1][0]["text"], "C");
    }

    #[test]
    fn test_every_kind_has_a_send_method() {
        for kind in ContentKind::ALL {
            let content = if kind.has_payload() {
                Content::media(kind, "FILE", "caption")
            } else {
                Content::text("body")
            };
            let (method, body) = send_request(ChatId(-100), &content, &UserSettings::default()).unwrap();
            assert!(method.starts_with("send"));
            assert_eq!(body["chat_id"], -100);
        }
    }

    #[test]
    fn test_text_request_applies_settings() {
        let settings = UserSettings {
            quiet: true,
            disable_link_preview: true,
            ..Default::default()
        };
        let content = Content::text("Hello").with_buttons(buttons());
        let (method, body) = send_request(ChatId(-1), &content, &settings).unwrap();

        assert_eq!(method, "sendMessage");
        assert_eq!(body["text"], "Hello");
        assert_eq!(body["disable_notification"], true);
        assert_eq!(body["link_preview_options"]["is_disabled"], true);
        assert!(body.get("caption").is_none());
    }

    #[test]
    fn test_photo_request_spoiler_and_caption_above() {
        let settings = UserSettings {
            spoiler: true,
            caption_above: true,
            ..Default::default()
        };
        let content = Content::media(ContentKind::Photo, "AgAD", "look");
        let (method, body) = send_request(ChatId(-1), &content, &settings).unwrap();

        assert_eq!(method, "sendPhoto");
        assert_eq!(body["photo"], "AgAD");
        assert_eq!(body["caption"], "look");
        assert_eq!(body["has_spoiler"], true);
        assert_eq!(body["show_caption_above_media"], true);
    }

    #[test]
    fn test_sticker_ignores_caption_and_spoiler() {
        let settings = UserSettings { spoiler: true, ..Default::default() };
        let content = Content::media(ContentKind::Sticker, "CAAC", "ignored");
        let (_, body) = send_request(ChatId(-1), &content, &settings).unwrap();

        assert_eq!(body["sticker"], "CAAC");
        assert!(body.get("caption").is_none());
        assert!(body.get("has_spoiler").is_none());
    }

    #[test]
    fn test_edit_media_rejects_kinds_without_input_media() {
        let target = MessageRef { chat_id: ChatId(-1), message_id: MessageId(3) };
        let voice = Content::media(ContentKind::Voice, "AwAD", "");
        assert!(edit_media_request(target, &voice, &UserSettings::default()).is_err());

        let video = Content::media(ContentKind::Video, "BAAD", "new");
        let body = edit_media_request(target, &video, &UserSettings::default()).unwrap();
        assert_eq!(body["media"]["type"], "video");
        assert_eq!(body["media"]["media"], "BAAD");
    }
}
