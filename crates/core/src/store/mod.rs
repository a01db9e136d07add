//! SQLite-backed versioned store for captured responses.
//!
//! This module provides the durable store behind the caching policies, using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Normalized request-identity keys via SHA-256 hashing
//! - Versioned entries with cascade deletion per store generation
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod keys;
pub mod migrations;
pub mod versions;

pub use crate::Error;

pub use connection::StoreDb;
pub use entries::StoredEntry;
pub use keys::{QueryMode, entry_key};
