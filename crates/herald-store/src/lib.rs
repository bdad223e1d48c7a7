//! # herald-store
//!
//! Durable storage for Herald, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for the connection
//! registry, post records, user settings and the shared cache tier.

pub mod cache;
pub mod connections;
pub mod database;
pub mod migrations;
pub mod models;
pub mod posts;
pub mod settings;

mod error;

pub use cache::CacheRow;
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
