//! Backing rows for the shared cache tier.
//!
//! Values are opaque JSON strings with an absolute wall-clock expiry, so any
//! process opening the same database file sees the same entries.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;

/// A live cache row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRow {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl Database {
    /// Fetch `key` if present and not expired at `now`.
    pub fn cache_get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheRow>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT value, expires_at FROM cache_entries
                 WHERE key = ?1 AND expires_at > ?2",
                params![key, now.timestamp_millis()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        Ok(row.and_then(|(value, millis)| {
            Utc.timestamp_millis_opt(millis)
                .single()
                .map(|expires_at| CacheRow { value, expires_at })
        }))
    }

    /// Insert or overwrite `key`.
    pub fn cache_set(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 expires_at = excluded.expires_at",
            params![key, value, expires_at.timestamp_millis()],
        )?;
        Ok(())
    }

    /// Drop rows that expired before `now`.  Returns how many were removed.
    pub fn cache_purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn()?.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1",
            params![now.timestamp_millis()],
        )?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_set_then_get() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.cache_set("chat:-1", "{\"title\":\"x\"}", now + Duration::minutes(20))
            .unwrap();

        let row = db.cache_get("chat:-1", now).unwrap().expect("should hit");
        assert_eq!(row.value, "{\"title\":\"x\"}");
    }

    #[test]
    fn test_expired_rows_miss_and_purge() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.cache_set("admins:-1", "[]", now + Duration::seconds(1)).unwrap();

        assert!(db.cache_get("admins:-1", now + Duration::seconds(2)).unwrap().is_none());
        assert_eq!(db.cache_purge_expired(now + Duration::seconds(2)).unwrap(), 1);
    }

    #[test]
    fn test_overwrite_extends_entry() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.cache_set("k", "old", now + Duration::seconds(1)).unwrap();
        db.cache_set("k", "new", now + Duration::minutes(5)).unwrap();

        let row = db.cache_get("k", now + Duration::seconds(30)).unwrap().unwrap();
        assert_eq!(row.value, "new");
    }
}
