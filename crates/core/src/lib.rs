//! Core types and shared functionality for pageflow.
//!
//! This crate provides:
//! - Session-scoped key-value store (in-memory and SQLite backends)
//! - Dotted-path lookup over JSON payloads
//! - Element visibility evaluation
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod geometry;
pub mod path;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use store::{MemoryStore, SessionCache, SessionStore, SqliteStore, StoreStats};
