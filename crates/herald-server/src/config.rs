//! Server configuration loaded from environment variables.
//!
//! Everything except the bot token has a default so a local instance can
//! start with a single variable set.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use herald_shared::constants::{
    DEFAULT_BATCH_COOLDOWN_SECS, DEFAULT_BATCH_SIZE, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_DELETE_SPACING_MS, DEFAULT_MAX_CONCURRENT_ACTIONS, DEFAULT_SEND_SPACING_MS,
};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Bot API token.
    /// Env: `BOT_TOKEN`
    pub bot_token: String,

    /// Bot API base URL.
    /// Env: `TELEGRAM_API_URL`
    /// Default: `https://api.telegram.org`
    pub api_url: String,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./herald.db`
    pub database_path: PathBuf,

    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:9099`
    pub http_addr: SocketAddr,

    /// Bearer token required on every route except `/health`.
    /// Env: `API_TOKEN`
    /// Default: empty (API closed).
    pub api_token: Option<String>,

    /// Lifetime of cached chat metadata and administrator rosters.
    /// Env: `CACHE_TTL_SECS`
    pub cache_ttl: Duration,

    /// Maximum entries held by the in-process cache tier.
    /// Env: `LOCAL_CACHE_CAPACITY`
    pub local_cache_capacity: usize,

    /// Destinations attempted before a cooldown.
    /// Env: `BATCH_SIZE`
    pub batch_size: u32,

    /// Env: `BATCH_COOLDOWN_SECS`
    pub batch_cooldown: Duration,

    /// Pause between consecutive sends and edits.
    /// Env: `SEND_SPACING_MS`
    pub send_spacing: Duration,

    /// Pause between consecutive deletions.
    /// Env: `DELETE_SPACING_MS`
    pub delete_spacing: Duration,

    /// Requests executing at once across the whole API.
    /// Env: `MAX_CONCURRENT_ACTIONS`
    pub max_concurrent_actions: usize,
}

// Keeps tokens out of the startup log line.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("api_url", &self.api_url)
            .field("database_path", &self.database_path)
            .field("http_addr", &self.http_addr)
            .field("api_enabled", &self.api_token.is_some())
            .field("cache_ttl", &self.cache_ttl)
            .field("local_cache_capacity", &self.local_cache_capacity)
            .field("batch_size", &self.batch_size)
            .field("batch_cooldown", &self.batch_cooldown)
            .field("send_spacing", &self.send_spacing)
            .field("delete_spacing", &self.delete_spacing)
            .field("max_concurrent_actions", &self.max_concurrent_actions)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: "https://api.telegram.org".to_string(),
            database_path: PathBuf::from("./herald.db"),
            http_addr: ([0, 0, 0, 0], 9099).into(),
            api_token: None,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            local_cache_capacity: 1000,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_cooldown: Duration::from_secs(DEFAULT_BATCH_COOLDOWN_SECS),
            send_spacing: Duration::from_millis(DEFAULT_SEND_SPACING_MS),
            delete_spacing: Duration::from_millis(DEFAULT_DELETE_SPACING_MS),
            max_concurrent_actions: DEFAULT_MAX_CONCURRENT_ACTIONS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(token) = var("BOT_TOKEN") {
            config.bot_token = token;
        }

        if let Some(url) = var("TELEGRAM_API_URL") {
            config.api_url = url;
        }

        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        parse_into(&var, "HTTP_ADDR", &mut config.http_addr);

        if let Some(token) = var("API_TOKEN") {
            if !token.is_empty() {
                config.api_token = Some(token);
            }
        }

        let mut secs = config.cache_ttl.as_secs();
        parse_into(&var, "CACHE_TTL_SECS", &mut secs);
        config.cache_ttl = Duration::from_secs(secs);

        parse_into(&var, "LOCAL_CACHE_CAPACITY", &mut config.local_cache_capacity);

        parse_into(&var, "BATCH_SIZE", &mut config.batch_size);
        if config.batch_size == 0 {
            tracing::warn!("BATCH_SIZE must be positive, using default");
            config.batch_size = DEFAULT_BATCH_SIZE;
        }

        let mut secs = config.batch_cooldown.as_secs();
        parse_into(&var, "BATCH_COOLDOWN_SECS", &mut secs);
        config.batch_cooldown = Duration::from_secs(secs);

        let mut millis = DEFAULT_SEND_SPACING_MS;
        parse_into(&var, "SEND_SPACING_MS", &mut millis);
        config.send_spacing = Duration::from_millis(millis);

        let mut millis = DEFAULT_DELETE_SPACING_MS;
        parse_into(&var, "DELETE_SPACING_MS", &mut millis);
        config.delete_spacing = Duration::from_millis(millis);

        parse_into(&var, "MAX_CONCURRENT_ACTIONS", &mut config.max_concurrent_actions);
        if config.max_concurrent_actions == 0 {
            tracing::warn!("MAX_CONCURRENT_ACTIONS must be positive, using default");
            config.max_concurrent_actions = DEFAULT_MAX_CONCURRENT_ACTIONS;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

/// Overwrite `slot` with the parsed value of `key`, keeping the current
/// value when the variable is unset or malformed.
fn parse_into<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = var(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "Invalid value, using default"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 9099).into());
        assert_eq!(config.cache_ttl, Duration::from_secs(1200));
        assert_eq!(config.batch_size, 23);
        assert_eq!(config.batch_cooldown, Duration::from_secs(60));
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("BOT_TOKEN", "123:abc"),
            ("HTTP_ADDR", "127.0.0.1:8000"),
            ("BATCH_SIZE", "10"),
            ("SEND_SPACING_MS", "5"),
            ("API_TOKEN", "secret"),
        ]));
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 8000).into());
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.send_spacing, Duration::from_millis(5));
        assert_eq!(config.api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_malformed_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HTTP_ADDR", "not an addr"),
            ("CACHE_TTL_SECS", "soon"),
            ("BATCH_SIZE", "0"),
            ("API_TOKEN", ""),
        ]));
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 9099).into());
        assert_eq!(config.cache_ttl, Duration::from_secs(1200));
        assert_eq!(config.batch_size, 23);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_debug_hides_tokens() {
        let config = ServerConfig {
            bot_token: "123:secret".into(),
            api_token: Some("hunter2".into()),
            ..Default::default()
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("secret"));
        assert!(!printed.contains("hunter2"));
    }
}
