//! Local persistence for client state
//!
//! The client only needs a string-to-string store: the session credential,
//! the current user id and the serialized image association map. This module
//! provides:
//! - [`KeyValueStore`], the async interface every consumer depends on
//! - [`LocalStorage`], a durable SQLite store managed through SeaORM
//! - [`MemoryStore`], an in-process store for tests and ephemeral sessions

pub mod db;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

pub use db::LocalStorage;
pub use memory::MemoryStore;

/// Persist a string under a key and retrieve it later.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}
