use thiserror::Error;

use crate::content::ContentKind;

/// Content rejected before any destination is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("Message text is {len} characters long (max {max})")]
    TextTooLong { len: usize, max: usize },

    #[error("Caption is {len} characters long (max {max})")]
    CaptionTooLong { len: usize, max: usize },

    #[error("Post has no content")]
    Empty,

    #[error("A {0} post needs a file")]
    MissingPayload(ContentKind),

    #[error("Unknown content kind code: {0}")]
    UnknownKind(i64),

    #[error("Posts of kind {0} cannot be edited")]
    UneditableKind(ContentKind),

    #[error("Cannot replace existing media with a {0}")]
    UnsupportedReplacement(ContentKind),
}

/// Unknown setting name supplied by a caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown setting: {0}")]
pub struct UnknownSetting(pub String);
