//! # herald-server
//!
//! Channel manager core for a Telegram bot.
//!
//! This binary provides:
//! - **Authorization** of a user's connected chats, backed by a two-tier
//!   lookup cache over chat metadata and administrator rosters
//! - **Fan-out** of posts to every authorized chat with batch cooldowns and
//!   per-send spacing, plus retract, repost and in-place edit
//! - **Post lineage** records so every delivered copy can be found again
//! - **REST API** (axum) exposing the above to the bot front end

mod api;
mod auth;
mod cache;
mod config;
mod error;
mod fanout;
mod rate_limit;
mod report;
mod store;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use herald_platform::{Platform, TelegramClient};
use herald_store::Database;

use crate::api::AppState;
use crate::auth::Verifier;
use crate::cache::TieredCache;
use crate::config::ServerConfig;
use crate::fanout::FanOut;
use crate::rate_limit::AdmissionPolicy;
use crate::store::Store;

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,herald_server=debug")),
        )
        .init();

    info!("Starting Herald server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.bot_token.is_empty() {
        anyhow::bail!("BOT_TOKEN is not set");
    }
    if config.api_token.is_none() {
        warn!("API_TOKEN is not set; every API route except /health will refuse requests");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    let store = Store::new(Arc::new(db));

    let cache = Arc::new(TieredCache::open(
        store.clone(),
        config.cache_ttl,
        config.local_cache_capacity,
    ));

    let client = TelegramClient::connect(&config.api_url, &config.bot_token)
        .await
        .context("connecting to the Bot API")?;
    info!(bot = %client.bot_id(), "Bot API reachable");
    let platform: Arc<dyn Platform> = Arc::new(client);

    let send_policy = AdmissionPolicy {
        batch_size: config.batch_size,
        cooldown: config.batch_cooldown,
        spacing: config.send_spacing,
    };
    let delete_policy = AdmissionPolicy {
        spacing: config.delete_spacing,
        ..send_policy
    };

    let app_state = AppState {
        store: store.clone(),
        verifier: Arc::new(Verifier::new(platform.clone(), cache.clone(), store.clone())),
        fanout: Arc::new(FanOut::new(platform, store, send_policy, delete_policy)),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic sweep of expired cache entries in both tiers
    let purge_cache = cache.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match purge_cache.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "Purged expired cache entries"),
                Err(e) => warn!(error = %e, "Cache purge failed"),
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let result = tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(ref e) = result {
                tracing::error!(error = %e, "HTTP server failed");
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    cache.close();
    result
}
