//! Types shared by every Herald crate: identifiers, post content and user
//! delivery settings.

pub mod constants;
pub mod content;
pub mod error;
pub mod settings;
pub mod types;

pub use content::{keyboard_rows, Button, Content, ContentKind};
pub use error::{ContentError, UnknownSetting};
pub use settings::{SettingField, UserSettings};
pub use types::{ChatId, DestinationKind, MessageId, MessageRef, PostId, Surface, UserId};
