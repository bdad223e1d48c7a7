//! Per-user delivery settings.

use rusqlite::{params, OptionalExtension};

use herald_shared::{SettingField, UserId, UserSettings};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Read a user's settings, creating the default row on first access.
    pub fn settings(&self, user: UserId) -> Result<UserSettings> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO user_settings (user_id) VALUES (?1)",
            params![user.0],
        )?;

        let settings = conn
            .query_row(
                "SELECT quiet, protect_content, spoiler, disable_link_preview,
                        caption_above, forward_tag
                 FROM user_settings WHERE user_id = ?1",
                params![user.0],
                |row| {
                    Ok(UserSettings {
                        quiet: row.get(0)?,
                        protect_content: row.get(1)?,
                        spoiler: row.get(2)?,
                        disable_link_preview: row.get(3)?,
                        caption_above: row.get(4)?,
                        forward_tag: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(settings.unwrap_or_default())
    }

    /// Set a single field.
    pub fn update_setting(&self, user: UserId, field: SettingField, value: bool) -> Result<()> {
        // Column names come from a closed enum, never from user input.
        let sql = format!(
            "INSERT INTO user_settings (user_id, {col}) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET {col} = excluded.{col}",
            col = field.name()
        );
        self.conn()?.execute(&sql, params![user.0, value])?;
        Ok(())
    }

    /// Put every field back to its default.
    pub fn reset_settings(&self, user: UserId) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO user_settings (user_id) VALUES (?1)",
            params![user.0],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_read_creates_defaults() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.settings(UserId(1)).unwrap(), UserSettings::default());

        let rows: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM user_settings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_update_each_field() {
        let db = Database::open_in_memory().unwrap();
        for field in SettingField::ALL {
            db.update_setting(UserId(1), field, true).unwrap();
            assert!(db.settings(UserId(1)).unwrap().get(field));
        }
    }

    #[test]
    fn test_reset_restores_defaults() {
        let db = Database::open_in_memory().unwrap();
        db.update_setting(UserId(1), SettingField::Quiet, true).unwrap();
        db.update_setting(UserId(1), SettingField::ForwardTag, true).unwrap();

        db.reset_settings(UserId(1)).unwrap();
        assert_eq!(db.settings(UserId(1)).unwrap(), UserSettings::default());
    }
}
