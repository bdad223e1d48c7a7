//! The connection registry: which destination chats each user may post to.

use chrono::Utc;
use rusqlite::params;

use herald_shared::{ChatId, UserId};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Chats connected by `user`, in the order they were connected.
    pub fn connections(&self, user: UserId) -> Result<Vec<ChatId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT chat_id FROM connections
             WHERE user_id = ?1
             ORDER BY rowid ASC",
        )?;

        let rows = stmt.query_map(params![user.0], |row| row.get::<_, i64>(0).map(ChatId))?;

        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }

    /// Connect `chat` for `user`. Returns `false` if it was already connected.
    pub fn add_connection(&self, user: UserId, chat: ChatId) -> Result<bool> {
        let affected = self.conn()?.execute(
            "INSERT OR IGNORE INTO connections (user_id, chat_id, connected_at)
             VALUES (?1, ?2, ?3)",
            params![user.0, chat.0, Utc::now().to_rfc3339()],
        )?;
        if affected == 0 {
            tracing::debug!(user = %user, chat = %chat, "chat already connected");
        }
        Ok(affected > 0)
    }

    /// Disconnect one chat.  Returns `true` if a row was deleted.
    pub fn remove_connection(&self, user: UserId, chat: ChatId) -> Result<bool> {
        let affected = self.conn()?.execute(
            "DELETE FROM connections WHERE user_id = ?1 AND chat_id = ?2",
            params![user.0, chat.0],
        )?;
        Ok(affected > 0)
    }

    /// Disconnect every chat of `user`.  Returns how many were removed.
    pub fn clear_connections(&self, user: UserId) -> Result<usize> {
        let affected = self
            .conn()?
            .execute("DELETE FROM connections WHERE user_id = ?1", params![user.0])?;
        Ok(affected)
    }
}
