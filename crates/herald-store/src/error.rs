use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// JSON column could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored row holds a value the domain model rejects.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Another thread panicked while holding the connection.
    #[error("Connection lock poisoned")]
    LockPoisoned,

    /// The blocking task running a query was cancelled or panicked.
    #[error("Background query failed: {0}")]
    Background(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
