//! Async facade over the SQLite store.
//!
//! `rusqlite` is blocking, so every call hops onto the blocking pool.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, warn};

use herald_shared::{ChatId, PostId, SettingField, UserId, UserSettings};
use herald_store::{CacheRow, Database, Post, Result, StoreError};

#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                StoreError::Background(e.to_string())
            })?
    }

    // -- Connection registry --

    pub async fn connections(&self, user: UserId) -> Result<Vec<ChatId>> {
        self.run(move |db| db.connections(user)).await
    }

    pub async fn add_connection(&self, user: UserId, chat: ChatId) -> Result<bool> {
        self.run(move |db| db.add_connection(user, chat)).await
    }

    pub async fn remove_connection(&self, user: UserId, chat: ChatId) -> Result<bool> {
        self.run(move |db| db.remove_connection(user, chat)).await
    }

    pub async fn clear_connections(&self, user: UserId) -> Result<usize> {
        self.run(move |db| db.clear_connections(user)).await
    }

    // -- Post records --

    pub async fn post(&self, id: PostId) -> Result<Option<Post>> {
        self.run(move |db| db.get_post(&id)).await
    }

    pub async fn upsert_post(&self, post: Post) -> Result<()> {
        self.run(move |db| db.upsert_post(&post)).await
    }

    pub async fn delete_post(&self, id: PostId) -> Result<bool> {
        self.run(move |db| db.delete_post(&id)).await
    }

    pub async fn posts_by_author(&self, author: UserId) -> Result<Vec<Post>> {
        self.run(move |db| db.posts_by_author(author)).await
    }

    // -- Settings --

    /// Read `user`'s settings. A storage failure falls back to defaults.
    pub async fn settings(&self, user: UserId) -> UserSettings {
        match self.run(move |db| db.settings(user)).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(user = %user, error = %e, "Failed to read settings, using defaults");
                UserSettings::default()
            }
        }
    }

    pub async fn update_setting(&self, user: UserId, field: SettingField, value: bool) -> Result<()> {
        self.run(move |db| db.update_setting(user, field, value)).await
    }

    pub async fn reset_settings(&self, user: UserId) -> Result<()> {
        self.run(move |db| db.reset_settings(user)).await
    }

    // -- Shared cache rows --

    pub async fn cache_get(&self, key: String, now: DateTime<Utc>) -> Result<Option<CacheRow>> {
        self.run(move |db| db.cache_get(&key, now)).await
    }

    pub async fn cache_set(&self, key: String, value: String, expires_at: DateTime<Utc>) -> Result<()> {
        self.run(move |db| db.cache_set(&key, &value, expires_at)).await
    }

    pub async fn cache_purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        self.run(move |db| db.cache_purge_expired(now)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_shared::Content;

    fn store() -> Store {
        Store::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_connection_registry_round_trip() {
        let store = store();
        assert!(store.add_connection(UserId(1), ChatId(-100)).await.unwrap());
        assert!(!store.add_connection(UserId(1), ChatId(-100)).await.unwrap());
        assert!(store.add_connection(UserId(1), ChatId(-200)).await.unwrap());

        assert_eq!(
            store.connections(UserId(1)).await.unwrap(),
            vec![ChatId(-100), ChatId(-200)]
        );
        assert!(store.remove_connection(UserId(1), ChatId(-100)).await.unwrap());
        assert_eq!(store.clear_connections(UserId(1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_post_lifecycle() {
        let store = store();
        let post = Post::new(PostId::generate(), UserId(1), Content::text("Hello"));
        store.upsert_post(post.clone()).await.unwrap();

        let loaded = store.post(post.id.clone()).await.unwrap().unwrap();
        assert_eq!(loaded.content.text, "Hello");
        assert_eq!(store.posts_by_author(UserId(1)).await.unwrap().len(), 1);

        assert!(store.delete_post(post.id.clone()).await.unwrap());
        assert!(store.post(post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_settings_toggle() {
        let store = store();
        store
            .update_setting(UserId(3), SettingField::Spoiler, true)
            .await
            .unwrap();
        assert!(store.settings(UserId(3)).await.spoiler);

        store.reset_settings(UserId(3)).await.unwrap();
        assert_eq!(store.settings(UserId(3)).await, UserSettings::default());
    }
}
