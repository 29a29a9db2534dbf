//! Session-scoped key-value storage.
//!
//! Values live for one browsing session only. Two backends implement
//! [`SessionStore`]:
//!
//! - [`MemoryStore`], a plain map owned by the process
//! - [`SqliteStore`], a SQLite table accessed through tokio-rusqlite that is
//!   emptied whenever a new session opens it
//!
//! [`SessionCache`] layers namespacing and JSON (de)serialization on top and
//! purges entries that no longer parse.

pub mod connection;
pub mod memory;
pub mod migrations;
pub mod session;

use async_trait::async_trait;

pub use crate::Error;

pub use connection::{SqliteStore, StoreStats};
pub use memory::MemoryStore;
pub use session::SessionCache;

/// Raw string slots keyed by fully namespaced keys.
///
/// Writes are last-writer-wins; implementations never merge values.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Read the raw slot for `key`.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, Error>;

    /// Overwrite the raw slot for `key`.
    async fn set_raw(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Delete the slot for `key`, returning whether it existed.
    async fn remove(&self, key: &str) -> Result<bool, Error>;

    /// Delete every slot whose key starts with `prefix`.
    ///
    /// Returns the number of deleted entries.
    async fn clear_prefix(&self, prefix: &str) -> Result<u64, Error>;
}
