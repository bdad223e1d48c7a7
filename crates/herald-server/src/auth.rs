//! Destination authorization.
//!
//! A user's connection set is re-checked on every use: each destination
//! must still exist, the user must still administer it and so must the
//! bot. Checking is split from pruning. [`Verifier::verify`] only reports
//! what should be pruned and [`Verifier::resolve_authorized_destinations`]
//! applies it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use herald_platform::{ChatInfo, Platform};
use herald_shared::{ChatId, Surface, UserId};
use herald_store::StoreError;

use crate::cache::{CacheError, TieredCache};
use crate::store::Store;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Administrators of a chat as last seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    admins: Vec<UserId>,
}

impl Roster {
    pub fn new(admins: Vec<UserId>) -> Self {
        Self { admins }
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }
}

/// Why a destination failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnostic {
    ChatNotFound,
    AdminUnverifiable,
    NotAdmin,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ChatNotFound => "chat not found",
            Self::AdminUnverifiable => "failed to verify admin status",
            Self::NotAdmin => "you are not an admin",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prune {
    pub chat: ChatId,
    pub diagnostic: Diagnostic,
}

/// Result of checking a connection set, before anything is pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    pub authorized: Vec<ChatId>,
    pub prune: Vec<Prune>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Resolution {
    Authorized(Vec<ChatId>),
    /// The user has no connections at all.
    NotConnected,
    /// At least one destination failed and was pruned. Nothing is
    /// authorized until the user retries.
    Rejected(Vec<Prune>),
    /// Nothing survived verification and nothing was pruned either. Any
    /// pruning already yields `Rejected`, so this only covers a verifier
    /// pass that returns neither list.
    NoValidConnections,
}

impl Resolution {
    /// The destinations to act on, if any were authorized.
    pub fn destinations(&self) -> Option<&[ChatId]> {
        match self {
            Self::Authorized(chats) => Some(chats),
            _ => None,
        }
    }

    /// Instruction shown when nothing was authorized.
    pub fn message(&self) -> String {
        match self {
            Self::Authorized(chats) => format!("{} destination(s) ready", chats.len()),
            Self::NotConnected => {
                "You are not connected to any chats. Connect one first.".to_string()
            }
            Self::Rejected(pruned) => {
                let lines: Vec<String> = pruned
                    .iter()
                    .map(|p| format!("{} ({})", p.chat, p.diagnostic))
                    .collect();
                format!(
                    "These chats were disconnected:\n{}\nFix access and try again.",
                    lines.join("\n")
                )
            }
            Self::NoValidConnections => {
                "No valid connections found. Connect a chat first.".to_string()
            }
        }
    }
}

/// Per-chat outcome of a connect request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ConnectOutcome {
    Connected { chat: ChatId, title: String },
    AlreadyConnected { chat: ChatId, title: String },
    Refused { chat: ChatId, diagnostic: Diagnostic },
}

pub struct Verifier {
    platform: Arc<dyn Platform>,
    cache: Arc<TieredCache>,
    store: Store,
}

impl Verifier {
    pub fn new(platform: Arc<dyn Platform>, cache: Arc<TieredCache>, store: Store) -> Self {
        Self {
            platform,
            cache,
            store,
        }
    }

    /// Destinations `user` may act on from `surface`.
    ///
    /// Any failing destination is removed from the registry and the whole
    /// resolution is rejected.
    pub async fn resolve_authorized_destinations(
        &self,
        surface: Surface,
        user: UserId,
    ) -> Result<Resolution, VerifyError> {
        if let Surface::Chat(chat) = surface {
            return Ok(Resolution::Authorized(vec![chat]));
        }

        let connections = self.store.connections(user).await?;
        if connections.is_empty() {
            return Ok(Resolution::NotConnected);
        }

        let verification = self.verify(user, &connections).await?;

        for pruned in &verification.prune {
            self.store.remove_connection(user, pruned.chat).await?;
            info!(
                user = %user,
                chat = %pruned.chat,
                reason = %pruned.diagnostic,
                "Disconnected failing destination"
            );
        }

        if !verification.prune.is_empty() {
            return Ok(Resolution::Rejected(verification.prune));
        }
        if verification.authorized.is_empty() {
            return Ok(Resolution::NoValidConnections);
        }
        Ok(Resolution::Authorized(verification.authorized))
    }

    /// Check every destination in `chats` for `user`. Does not touch the
    /// registry.
    pub async fn verify(&self, user: UserId, chats: &[ChatId]) -> Result<Verification, VerifyError> {
        let mut verification = Verification::default();
        for &chat in chats {
            match self.check(user, chat).await? {
                None => verification.authorized.push(chat),
                Some(diagnostic) => verification.prune.push(Prune { chat, diagnostic }),
            }
        }
        Ok(verification)
    }

    async fn check(&self, user: UserId, chat: ChatId) -> Result<Option<Diagnostic>, VerifyError> {
        if self.chat_info(chat).await?.is_none() {
            return Ok(Some(Diagnostic::ChatNotFound));
        }

        let Some(roster) = self.roster(chat, false).await? else {
            return Ok(Some(Diagnostic::AdminUnverifiable));
        };
        if !roster.contains(user) {
            return Ok(Some(Diagnostic::NotAdmin));
        }

        let bot = self.platform.bot_id();
        if !roster.contains(bot) {
            debug!(chat = %chat, "Bot missing from cached roster, reloading");
            match self.roster(chat, true).await? {
                Some(fresh) if fresh.contains(bot) => {}
                _ => return Ok(Some(Diagnostic::AdminUnverifiable)),
            }
        }

        Ok(None)
    }

    /// Verify and add each of `chats` to `user`'s connection set.
    ///
    /// Only the user's own admin rights are required here; the bot's are
    /// checked whenever the set is used.
    pub async fn connect(
        &self,
        user: UserId,
        chats: &[ChatId],
    ) -> Result<Vec<ConnectOutcome>, VerifyError> {
        let mut outcomes = Vec::with_capacity(chats.len());
        for &chat in chats {
            let Some(info) = self.chat_info(chat).await? else {
                outcomes.push(ConnectOutcome::Refused {
                    chat,
                    diagnostic: Diagnostic::ChatNotFound,
                });
                continue;
            };

            let diagnostic = match self.roster(chat, false).await? {
                None => Some(Diagnostic::AdminUnverifiable),
                Some(roster) if !roster.contains(user) => Some(Diagnostic::NotAdmin),
                Some(_) => None,
            };
            if let Some(diagnostic) = diagnostic {
                outcomes.push(ConnectOutcome::Refused { chat, diagnostic });
                continue;
            }

            let title = info.title;
            if self.store.add_connection(user, chat).await? {
                info!(user = %user, chat = %chat, "Connected destination");
                outcomes.push(ConnectOutcome::Connected { chat, title });
            } else {
                outcomes.push(ConnectOutcome::AlreadyConnected { chat, title });
            }
        }
        Ok(outcomes)
    }

    /// Metadata from the cache, else from the platform. `None` when the
    /// chat cannot be fetched.
    async fn chat_info(&self, chat: ChatId) -> Result<Option<ChatInfo>, VerifyError> {
        if let Some(info) = self.cache.chat_info(chat).await? {
            return Ok(Some(info));
        }

        match self.platform.get_chat(chat).await {
            Ok(info) => {
                self.cache.put_chat_info(&info).await?;
                Ok(Some(info))
            }
            Err(e) => {
                warn!(chat = %chat, error = %e, "Chat lookup failed");
                Ok(None)
            }
        }
    }

    /// Administrator roster, from the cache unless `reload` is set.
    async fn roster(&self, chat: ChatId, reload: bool) -> Result<Option<Roster>, VerifyError> {
        if !reload {
            if let Some(roster) = self.cache.roster(chat).await? {
                return Ok(Some(roster));
            }
        }

        match self.platform.get_chat_administrators(chat).await {
            Ok(admins) => {
                let roster = Roster::new(admins);
                self.cache.put_roster(chat, &roster).await?;
                Ok(Some(roster))
            }
            Err(e) => {
                warn!(chat = %chat, error = %e, "Administrator lookup failed");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use herald_store::Database;

    use crate::test_support::{FakePlatform, BOT};

    const USER: UserId = UserId(7);
    const A: ChatId = ChatId(-1001);
    const B: ChatId = ChatId(-1002);

    #[test]
    fn test_resolution_wire_form() {
        let json = serde_json::to_value(Resolution::NoValidConnections).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "no_valid_connections" }));
        assert!(Resolution::NoValidConnections.destinations().is_none());
        assert!(Resolution::NoValidConnections.message().contains("Connect a chat"));

        let json = serde_json::to_value(Resolution::Authorized(vec![A])).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "authorized", "detail": [-1001] }));
        assert_eq!(Resolution::Authorized(vec![A]).destinations(), Some(&[A][..]));
    }

    struct Harness {
        platform: Arc<FakePlatform>,
        store: Store,
        cache: Arc<TieredCache>,
        verifier: Verifier,
    }

    fn harness() -> Harness {
        let platform = Arc::new(FakePlatform::new());
        let store = Store::new(Arc::new(Database::open_in_memory().unwrap()));
        let cache = Arc::new(TieredCache::open(
            store.clone(),
            Duration::from_secs(1200),
            64,
        ));
        let verifier = Verifier::new(platform.clone(), cache.clone(), store.clone());
        Harness {
            platform,
            store,
            cache,
            verifier,
        }
    }

    #[tokio::test]
    async fn test_chat_surface_short_circuits() {
        let h = harness();
        let resolution = h
            .verifier
            .resolve_authorized_destinations(Surface::Chat(A), USER)
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::Authorized(vec![A]));
        assert_eq!(h.platform.calls("get_chat"), 0);
    }

    #[tokio::test]
    async fn test_no_connections() {
        let h = harness();
        let resolution = h
            .verifier
            .resolve_authorized_destinations(Surface::Private, USER)
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::NotConnected);
    }

    #[tokio::test]
    async fn test_connect_then_revoke_admin() {
        let h = harness();
        h.platform.add_chat(A, "Alpha", &[USER, BOT]);

        let outcomes = h.verifier.connect(USER, &[A]).await.unwrap();
        assert!(matches!(outcomes[0], ConnectOutcome::Connected { .. }));

        let resolution = h
            .verifier
            .resolve_authorized_destinations(Surface::Private, USER)
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::Authorized(vec![A]));

        // Revoke and let the cached roster reflect it.
        h.platform.set_admins(A, &[BOT]);
        h.cache.put_roster(A, &Roster::new(vec![BOT])).await.unwrap();

        let resolution = h
            .verifier
            .resolve_authorized_destinations(Surface::Private, USER)
            .await
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::Rejected(vec![Prune { chat: A, diagnostic: Diagnostic::NotAdmin }])
        );
        assert!(resolution.destinations().is_none());
        assert!(h.store.connections(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_rejects_everything() {
        let h = harness();
        h.platform.add_chat(A, "Alpha", &[USER, BOT]);
        h.store.add_connection(USER, A).await.unwrap();
        h.store.add_connection(USER, B).await.unwrap();

        let resolution = h
            .verifier
            .resolve_authorized_destinations(Surface::Private, USER)
            .await
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::Rejected(vec![Prune { chat: B, diagnostic: Diagnostic::ChatNotFound }])
        );
        // The healthy destination stays connected for the next attempt.
        assert_eq!(h.store.connections(USER).await.unwrap(), vec![A]);
    }

    #[tokio::test]
    async fn test_verify_has_no_side_effects() {
        let h = harness();
        h.store.add_connection(USER, B).await.unwrap();

        let verification = h.verifier.verify(USER, &[B]).await.unwrap();
        assert!(verification.authorized.is_empty());
        assert_eq!(verification.prune.len(), 1);
        assert_eq!(h.store.connections(USER).await.unwrap(), vec![B]);
    }

    #[tokio::test]
    async fn test_unreadable_roster_is_unverifiable() {
        let h = harness();
        h.platform.add_chat(A, "Alpha", &[USER, BOT]);
        h.platform.fail_admins(A);

        let verification = h.verifier.verify(USER, &[A]).await.unwrap();
        assert_eq!(verification.prune[0].diagnostic, Diagnostic::AdminUnverifiable);
    }

    #[tokio::test]
    async fn test_bot_missing_triggers_one_reload() {
        let h = harness();
        h.platform.add_chat(A, "Alpha", &[USER, BOT]);
        h.cache.put_roster(A, &Roster::new(vec![USER])).await.unwrap();

        let verification = h.verifier.verify(USER, &[A]).await.unwrap();
        assert_eq!(verification.authorized, vec![A]);
        assert_eq!(h.platform.calls("get_chat_administrators"), 1);

        // The reload refreshed the cache.
        assert!(h.cache.roster(A).await.unwrap().unwrap().contains(BOT));
    }

    #[tokio::test]
    async fn test_bot_not_admin_after_reload() {
        let h = harness();
        h.platform.add_chat(A, "Alpha", &[USER]);

        let verification = h.verifier.verify(USER, &[A]).await.unwrap();
        assert_eq!(
            verification.prune,
            vec![Prune { chat: A, diagnostic: Diagnostic::AdminUnverifiable }]
        );
        assert_eq!(h.platform.calls("get_chat_administrators"), 2);
    }

    #[tokio::test]
    async fn test_lookups_are_cached() {
        let h = harness();
        h.platform.add_chat(A, "Alpha", &[USER, BOT]);
        h.verifier.verify(USER, &[A]).await.unwrap();
        h.verifier.verify(USER, &[A]).await.unwrap();

        assert_eq!(h.platform.calls("get_chat"), 1);
        assert_eq!(h.platform.calls("get_chat_administrators"), 1);
    }

    #[tokio::test]
    async fn test_connect_refusals() {
        let h = harness();
        h.platform.add_chat(A, "Alpha", &[UserId(99), BOT]);

        let outcomes = h.verifier.connect(USER, &[A, B]).await.unwrap();
        assert_eq!(
            outcomes,
            vec![
                ConnectOutcome::Refused { chat: A, diagnostic: Diagnostic::NotAdmin },
                ConnectOutcome::Refused { chat: B, diagnostic: Diagnostic::ChatNotFound },
            ]
        );
        assert!(h.store.connections(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_twice() {
        let h = harness();
        h.platform.add_chat(A, "Alpha", &[USER]);
        h.verifier.connect(USER, &[A]).await.unwrap();

        let outcomes = h.verifier.connect(USER, &[A]).await.unwrap();
        assert_eq!(
            outcomes,
            vec![ConnectOutcome::AlreadyConnected { chat: A, title: "Alpha".into() }]
        );
    }

    #[tokio::test]
    async fn test_closed_cache_is_a_hard_error() {
        let h = harness();
        h.platform.add_chat(A, "Alpha", &[USER, BOT]);
        h.store.add_connection(USER, A).await.unwrap();
        h.cache.close();

        let result = h
            .verifier
            .resolve_authorized_destinations(Surface::Private, USER)
            .await;
        assert!(matches!(result, Err(VerifyError::Cache(CacheError::Closed))));
    }
}
