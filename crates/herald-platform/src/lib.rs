// Messaging-platform access: the `Platform` trait and its Bot API client.

pub mod markup;
pub mod platform;
pub mod telegram;

pub use markup::inline_keyboard;
pub use platform::{ChatInfo, Platform, PlatformError, PlatformResult, SentMessage};
pub use telegram::TelegramClient;
