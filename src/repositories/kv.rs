//! Key-value repository for database operations.

use anyhow::Result;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue, ConnectionTrait, EntityTrait};

use crate::entities::kv_entry;

/// Repository for key-value entry database operations.
pub struct KvRepository;

impl KvRepository {
    /// Get the value stored under a key.
    pub async fn get<C>(conn: &C, key: &str) -> Result<Option<String>>
    where
        C: ConnectionTrait,
    {
        Ok(kv_entry::Entity::find_by_id(key.to_string())
            .one(conn)
            .await?
            .map(|entry| entry.value))
    }

    /// Insert or replace the value stored under a key.
    pub async fn upsert<C>(conn: &C, key: &str, value: &str) -> Result<()>
    where
        C: ConnectionTrait,
    {
        let entry = kv_entry::ActiveModel {
            key: ActiveValue::Set(key.to_string()),
            value: ActiveValue::Set(value.to_string()),
            updated_at: ActiveValue::Set(Utc::now().to_rfc3339()),
        };

        kv_entry::Entity::insert(entry)
            .on_conflict(
                OnConflict::column(kv_entry::Column::Key)
                    .update_columns([kv_entry::Column::Value, kv_entry::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Delete a key. Deleting a missing key is not an error.
    pub async fn delete<C>(conn: &C, key: &str) -> Result<()>
    where
        C: ConnectionTrait,
    {
        kv_entry::Entity::delete_by_id(key.to_string()).exec(conn).await?;
        Ok(())
    }

    /// Count stored entries.
    pub async fn count<C>(conn: &C) -> Result<u64>
    where
        C: ConnectionTrait,
    {
        use sea_orm::PaginatorTrait;
        Ok(kv_entry::Entity::find().count(conn).await?)
    }
}
