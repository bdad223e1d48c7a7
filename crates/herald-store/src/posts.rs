//! CRUD operations for [`Post`] records and their placements.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use herald_shared::{Button, ChatId, Content, ContentKind, MessageId, PostId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Placement, Post};

impl Database {
    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Insert or fully replace a post together with its placements.
    pub fn upsert_post(&self, post: &Post) -> Result<()> {
        let buttons = serde_json::to_string(&post.content.buttons)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO posts (id, author_id, kind, file_id, body, buttons, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 author_id = excluded.author_id,
                 kind      = excluded.kind,
                 file_id   = excluded.file_id,
                 body      = excluded.body,
                 buttons   = excluded.buttons",
            params![
                post.id.as_str(),
                post.author.0,
                post.content.kind.code(),
                post.content.file_id,
                post.content.text,
                buttons,
                post.created_at.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "DELETE FROM post_placements WHERE post_id = ?1",
            params![post.id.as_str()],
        )?;
        for (position, placement) in post.placements.iter().enumerate() {
            tx.execute(
                "INSERT INTO post_placements (post_id, position, chat_id, message_id, chat_handle)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    post.id.as_str(),
                    position as i64,
                    placement.chat_id.0,
                    placement.message_id.0,
                    placement.chat_handle,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a post by id, or `None` if there is no such post.
    pub fn get_post(&self, id: &PostId) -> Result<Option<Post>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, author_id, kind, file_id, body, buttons, created_at
                 FROM posts WHERE id = ?1",
                params![id.as_str()],
                read_post_row,
            )
            .optional()?;

        match row {
            Some(row) => Ok(Some(row.into_post(load_placements(&conn, id)?)?)),
            None => Ok(None),
        }
    }

    /// List every post written by `author`, newest first.
    pub fn posts_by_author(&self, author: UserId) -> Result<Vec<Post>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, author_id, kind, file_id, body, buttons, created_at
             FROM posts
             WHERE author_id = ?1
             ORDER BY created_at DESC",
        )?;

        let rows = stmt
            .query_map(params![author.0], read_post_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            let id = PostId(row.id.clone());
            let placements = load_placements(&conn, &id)?;
            posts.push(row.into_post(placements)?);
        }
        Ok(posts)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a post and its placements.  Returns `true` if it existed.
    pub fn delete_post(&self, id: &PostId) -> Result<bool> {
        let affected = self
            .conn()?
            .execute("DELETE FROM posts WHERE id = ?1", params![id.as_str()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Raw column values of a `posts` row, before domain validation.
struct PostRow {
    id: String,
    author_id: i64,
    kind: i64,
    file_id: Option<String>,
    body: String,
    buttons: String,
    created_at: String,
}

fn read_post_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        kind: row.get(2)?,
        file_id: row.get(3)?,
        body: row.get(4)?,
        buttons: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl PostRow {
    fn into_post(self, placements: Vec<Placement>) -> Result<Post> {
        let kind = ContentKind::from_code(self.kind).ok_or_else(|| {
            StoreError::Corrupt(format!("post {} has unknown kind {}", self.id, self.kind))
        })?;
        let buttons: Vec<Button> = serde_json::from_str(&self.buttons)?;
        let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt(format!("post {} created_at: {e}", self.id)))?;

        Ok(Post {
            id: PostId(self.id),
            author: UserId(self.author_id),
            content: Content {
                kind,
                file_id: self.file_id,
                text: self.body,
                buttons,
                source: None,
            },
            placements,
            created_at,
        })
    }
}

fn load_placements(conn: &Connection, id: &PostId) -> Result<Vec<Placement>> {
    let mut stmt = conn.prepare(
        "SELECT chat_id, message_id, chat_handle FROM post_placements
         WHERE post_id = ?1
         ORDER BY position ASC",
    )?;
    let placements = stmt
        .query_map(params![id.as_str()], |row| {
            Ok(Placement {
                chat_id: ChatId(row.get(0)?),
                message_id: MessageId(row.get(1)?),
                chat_handle: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(placements)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post() -> Post {
        let content = Content::text("Hello").with_buttons(vec![Button {
            name: "Docs".into(),
            url: "https://example.org".into(),
            same_row: false,
        }]);
        let mut post = Post::new(PostId::generate(), UserId(7), content);
        post.placements = vec![
            Placement {
                chat_id: ChatId(-1002),
                message_id: MessageId(11),
                chat_handle: Some("herald_news".into()),
            },
            Placement {
                chat_id: ChatId(-1001),
                message_id: MessageId(12),
                chat_handle: None,
            },
        ];
        post
    }

    #[test]
    fn test_upsert_and_get() {
        let db = Database::open_in_memory().unwrap();
        let post = sample_post();
        db.upsert_post(&post).unwrap();

        let loaded = db.get_post(&post.id).unwrap().expect("post should exist");
        assert_eq!(loaded.content, post.content);
        assert_eq!(loaded.placements, post.placements);
        assert_eq!(loaded.author, UserId(7));
        assert_eq!(
            loaded.placements[0].link().as_deref(),
            Some("https://t.me/herald_news/11")
        );
    }

    #[test]
    fn test_upsert_replaces_placements() {
        let db = Database::open_in_memory().unwrap();
        let mut post = sample_post();
        db.upsert_post(&post).unwrap();

        post.placements.truncate(1);
        post.content.text = "Edited".into();
        db.upsert_post(&post).unwrap();

        let loaded = db.get_post(&post.id).unwrap().unwrap();
        assert_eq!(loaded.placements.len(), 1);
        assert_eq!(loaded.content.text, "Edited");
    }

    #[test]
    fn test_missing_post_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_post(&PostId::from("nope")).unwrap().is_none());
    }

    #[test]
    fn test_delete_cascades_placements() {
        let db = Database::open_in_memory().unwrap();
        let post = sample_post();
        db.upsert_post(&post).unwrap();

        assert!(db.delete_post(&post.id).unwrap());
        assert!(!db.delete_post(&post.id).unwrap());
        let orphans: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM post_placements", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_posts_by_author() {
        let db = Database::open_in_memory().unwrap();
        let first = sample_post();
        let mut other = sample_post();
        other.author = UserId(8);
        db.upsert_post(&first).unwrap();
        db.upsert_post(&other).unwrap();

        let mine = db.posts_by_author(UserId(7)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, first.id);
        assert_eq!(mine[0].placements.len(), 2);
    }

    #[test]
    fn test_unknown_kind_is_corrupt() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .unwrap()
            .execute(
                "INSERT INTO posts (id, author_id, kind, body, buttons, created_at)
                 VALUES ('bad', 1, 42, '', '[]', ?1)",
                params![Utc::now().to_rfc3339()],
            )
            .unwrap();
        assert!(matches!(
            db.get_post(&PostId::from("bad")),
            Err(StoreError::Corrupt(_))
        ));
    }
}
