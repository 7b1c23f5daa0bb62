use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};

use super::KeyValueStore;
use crate::entities::kv_entry;
use crate::repositories::KvRepository;

/// Local storage manager backed by SQLite
pub struct LocalStorage {
    pub conn: DatabaseConnection,
}

impl LocalStorage {
    /// Open (or create) the SQLite database at `path`
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create storage directory: {}", parent.display()))?;
            }
        }

        let database_url = format!("sqlite://{}?mode=rwc", path.display());
        info!("💾 Opening local storage at {}", path.display());
        Self::connect(&database_url).await
    }

    /// Open a private in-memory database
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn connect(database_url: &str) -> Result<Self> {
        let mut options = ConnectOptions::new(database_url.to_string());
        // A single connection keeps in-memory databases alive and serializes writers
        options.max_connections(1).min_connections(1).sqlx_logging(false);

        let conn = Database::connect(options)
            .await
            .with_context(|| format!("Failed to connect to {database_url}"))?;

        let storage = LocalStorage { conn };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        let schema = Schema::new(backend);

        let mut create_kv = schema.create_table_from_entity(kv_entry::Entity);
        create_kv.if_not_exists();
        self.conn
            .execute(backend.build(&create_kv))
            .await
            .context("Failed to create kv_entries table")?;

        Ok(())
    }

    /// Check if the database has any data
    pub async fn has_data(&self) -> Result<bool> {
        Ok(KvRepository::count(&self.conn).await? > 0)
    }
}

#[async_trait]
impl KeyValueStore for LocalStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        KvRepository::get(&self.conn, key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        KvRepository::upsert(&self.conn, key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        KvRepository::delete(&self.conn, key).await
    }
}
