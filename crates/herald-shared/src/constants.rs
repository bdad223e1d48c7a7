/// Maximum length of a text post body, in characters
pub const MAX_TEXT_LEN: usize = 4096;

/// Maximum length of a media caption, in characters
pub const MAX_CAPTION_LEN: usize = 1024;

/// Placeholder body used when an edit would otherwise send empty text
pub const EMPTY_EDIT_PLACEHOLDER: &str = ".";

/// Lifetime of cached destination metadata and admin rosters (20 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 20 * 60;

/// Attempts allowed per fan-out batch before the cooldown kicks in
pub const DEFAULT_BATCH_SIZE: u32 = 23;

/// Pause inserted after each full batch, in seconds
pub const DEFAULT_BATCH_COOLDOWN_SECS: u64 = 60;

/// Delay between consecutive sends or edits, in milliseconds
pub const DEFAULT_SEND_SPACING_MS: u64 = 50;

/// Delay between consecutive deletions, in milliseconds
pub const DEFAULT_DELETE_SPACING_MS: u64 = 200;

/// Upper bound on concurrently executing triggered actions
pub const DEFAULT_MAX_CONCURRENT_ACTIONS: usize = 50;

/// Public link prefix for messaging-platform chats
pub const LINK_BASE: &str = "https://t.me";

/// Prefix shared by supergroup and channel identifiers
pub const SUPERGROUP_PREFIX: i64 = -1_000_000_000_000;
