//! Core types and shared functionality for outpost.
//!
//! This crate provides:
//! - Versioned durable store with SQLite backend
//! - Unified error types
//! - Layered configuration
pub mod config;
pub mod error;
pub mod store;

pub use config::ProxyConfig;
pub use error::Error;
pub use store::{QueryMode, StoreDb, StoredEntry, entry_key};
