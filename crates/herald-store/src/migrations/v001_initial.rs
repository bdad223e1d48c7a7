//! v001 -- Initial schema creation.
//!
//! Creates `connections`, `posts`, `post_placements`, `user_settings` and
//! `cache_entries`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Connections (user -> destination chats they may post to)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS connections (
    user_id      INTEGER NOT NULL,
    chat_id      INTEGER NOT NULL,
    connected_at TEXT NOT NULL,                -- RFC-3339

    PRIMARY KEY (user_id, chat_id)
);

-- ----------------------------------------------------------------
-- Posts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id         TEXT PRIMARY KEY NOT NULL,      -- timestamp + random hex
    author_id  INTEGER NOT NULL,
    kind       INTEGER NOT NULL,               -- ContentKind code 1..=9
    file_id    TEXT,
    body       TEXT NOT NULL DEFAULT '',
    buttons    TEXT NOT NULL DEFAULT '[]',     -- JSON array
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id, created_at DESC);

-- ----------------------------------------------------------------
-- Placements (where the current instantiation of a post lives)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS post_placements (
    post_id     TEXT NOT NULL,
    position    INTEGER NOT NULL,
    chat_id     INTEGER NOT NULL,
    message_id  INTEGER NOT NULL,
    chat_handle TEXT,                          -- public @handle, if any

    PRIMARY KEY (post_id, position),
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- User settings
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS user_settings (
    user_id              INTEGER PRIMARY KEY NOT NULL,
    quiet                INTEGER NOT NULL DEFAULT 0,
    protect_content      INTEGER NOT NULL DEFAULT 0,
    spoiler              INTEGER NOT NULL DEFAULT 0,
    disable_link_preview INTEGER NOT NULL DEFAULT 0,
    caption_above        INTEGER NOT NULL DEFAULT 0,
    forward_tag          INTEGER NOT NULL DEFAULT 0
);

-- ----------------------------------------------------------------
-- Shared cache tier
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS cache_entries (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,                  -- JSON
    expires_at INTEGER NOT NULL                -- unix millis
);

CREATE INDEX IF NOT EXISTS idx_cache_expiry ON cache_entries(expires_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
