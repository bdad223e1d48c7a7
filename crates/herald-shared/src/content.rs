//! Post content: the kind of message, its payload, body text and buttons.
//!
//! Everything here is platform-agnostic; the mapping from a [`ContentKind`]
//! to concrete platform calls lives in `herald-platform`.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_CAPTION_LEN, MAX_TEXT_LEN};
use crate::error::ContentError;
use crate::types::MessageRef;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Every message shape a post can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Sticker,
    Document,
    Photo,
    Audio,
    Voice,
    Video,
    VideoNote,
    Animation,
}

impl ContentKind {
    pub const ALL: [ContentKind; 9] = [
        Self::Text,
        Self::Sticker,
        Self::Document,
        Self::Photo,
        Self::Audio,
        Self::Voice,
        Self::Video,
        Self::VideoNote,
        Self::Animation,
    ];

    /// Stable storage code.
    pub fn code(self) -> i64 {
        match self {
            Self::Text => 1,
            Self::Sticker => 2,
            Self::Document => 3,
            Self::Photo => 4,
            Self::Audio => 5,
            Self::Voice => 6,
            Self::Video => 7,
            Self::VideoNote => 8,
            Self::Animation => 9,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Whether the kind carries a file handle rather than just text.
    pub fn has_payload(self) -> bool {
        !matches!(self, Self::Text)
    }

    /// Whether the message can carry a caption alongside its payload.
    pub fn accepts_caption(self) -> bool {
        !matches!(self, Self::Text | Self::Sticker | Self::VideoNote)
    }

    pub fn accepts_spoiler(self) -> bool {
        matches!(self, Self::Photo | Self::Video | Self::Animation)
    }

    pub fn accepts_caption_above(self) -> bool {
        matches!(self, Self::Photo | Self::Video | Self::Animation)
    }

    /// Length limit applied to the body text.
    pub fn text_limit(self) -> usize {
        match self {
            Self::Text => MAX_TEXT_LEN,
            _ => MAX_CAPTION_LEN,
        }
    }

    /// Name of the input-media form used to replace an existing message's
    /// media in place. `None` means the kind cannot be swapped in.
    pub fn input_media_type(self) -> Option<&'static str> {
        match self {
            Self::Photo => Some("photo"),
            Self::Video => Some("video"),
            Self::Animation => Some("animation"),
            Self::Audio => Some("audio"),
            Self::Document => Some("document"),
            Self::Text | Self::Sticker | Self::Voice | Self::VideoNote => None,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Sticker => "sticker",
            Self::Document => "document",
            Self::Photo => "photo",
            Self::Audio => "audio",
            Self::Voice => "voice",
            Self::Video => "video",
            Self::VideoNote => "video note",
            Self::Animation => "animation",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Buttons
// ---------------------------------------------------------------------------

/// A URL button attached below a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub name: String,
    pub url: String,
    /// Place this button on the same row as the previous one.
    #[serde(default)]
    pub same_row: bool,
}

/// Group buttons into keyboard rows.
///
/// A `same_row` button with no preceding row starts a new one.
pub fn keyboard_rows(buttons: &[Button]) -> Vec<Vec<&Button>> {
    let mut rows: Vec<Vec<&Button>> = Vec::new();
    for button in buttons {
        match rows.last_mut() {
            Some(row) if button.same_row => row.push(button),
            _ => rows.push(vec![button]),
        }
    }
    rows
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Everything needed to (re)produce a post at a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub kind: ContentKind,
    /// Platform file handle; absent for text posts.
    #[serde(default)]
    pub file_id: Option<String>,
    /// Message body for text posts, caption otherwise.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub buttons: Vec<Button>,
    /// The authored message this content was taken from, used when the
    /// author prefers forwarding over re-sending.
    #[serde(default)]
    pub source: Option<MessageRef>,
}

impl Content {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Text,
            file_id: None,
            text: body.into(),
            buttons: Vec::new(),
            source: None,
        }
    }

    pub fn media(kind: ContentKind, file_id: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            kind,
            file_id: Some(file_id.into()),
            text: caption.into(),
            buttons: Vec::new(),
            source: None,
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = buttons;
        self
    }

    /// The payload handle, treating an empty string as absent.
    pub fn payload(&self) -> Option<&str> {
        self.file_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Reject content that no destination could accept.
    pub fn validate(&self) -> Result<(), ContentError> {
        let len = self.text.chars().count();
        let limit = self.kind.text_limit();
        if len > limit {
            return Err(if self.kind == ContentKind::Text {
                ContentError::TextTooLong { len, max: limit }
            } else {
                ContentError::CaptionTooLong { len, max: limit }
            });
        }

        match (self.kind.has_payload(), self.payload()) {
            (false, _) if self.text.trim().is_empty() => Err(ContentError::Empty),
            (true, None) => Err(ContentError::MissingPayload(self.kind)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(name: &str, same_row: bool) -> Button {
        Button {
            name: name.into(),
            url: format!("https://example.org/{name}"),
            same_row,
        }
    }

    #[test]
    fn test_codes_round_trip_every_kind() {
        for kind in ContentKind::ALL {
            assert_eq!(ContentKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ContentKind::from_code(0), None);
        assert_eq!(ContentKind::from_code(10), None);
    }

    #[test]
    fn test_keyboard_rows_grouping() {
        let buttons = vec![
            button("a", false),
            button("b", true),
            button("c", false),
            button("d", true),
            button("e", true),
        ];
        let rows = keyboard_rows(&buttons);
        let names: Vec<Vec<&str>> = rows
            .iter()
            .map(|row| row.iter().map(|b| b.name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["a", "b"], vec!["c", "d", "e"]]);
    }

    #[test]
    fn test_leading_same_row_button_starts_a_row() {
        let buttons = vec![button("first", true), button("second", true)];
        let rows = keyboard_rows(&buttons);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn test_validate_text_limits() {
        assert!(Content::text("Hello").validate().is_ok());
        assert!(matches!(
            Content::text("x".repeat(MAX_TEXT_LEN + 1)).validate(),
            Err(ContentError::TextTooLong { .. })
        ));
        assert!(matches!(Content::text("  ").validate(), Err(ContentError::Empty)));
    }

    #[test]
    fn test_validate_caption_limits() {
        let photo = Content::media(ContentKind::Photo, "AgAD", "y".repeat(MAX_CAPTION_LEN + 1));
        assert!(matches!(photo.validate(), Err(ContentError::CaptionTooLong { .. })));

        let ok = Content::media(ContentKind::Photo, "AgAD", "");
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_payload() {
        let mut sticker = Content::media(ContentKind::Sticker, "", "");
        assert!(matches!(sticker.validate(), Err(ContentError::MissingPayload(ContentKind::Sticker))));
        sticker.file_id = None;
        assert!(sticker.validate().is_err());
    }

    #[test]
    fn test_limits_count_characters_not_bytes() {
        let body = "é".repeat(MAX_TEXT_LEN);
        assert!(Content::text(body).validate().is_ok());
    }
}
