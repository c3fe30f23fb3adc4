//! Image cache collaborator invoked when matters are hard-deleted.

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::{db_time, now, DbPool};
use crate::{MatterError, Result};

const DELETE_CHUNK: usize = 500;

/// Derived thumbnails kept for image matters.
#[async_trait]
pub trait ImageCache: Send + Sync {
    /// Drop every cache entry derived from the given matters.
    async fn delete_by_matters(&self, matter_uuids: &[String]) -> Result<u64>;
}

/// [`ImageCache`] over the `image_caches` table.
#[derive(Clone)]
pub struct SqliteImageCache {
    pool: DbPool,
}

impl SqliteImageCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Register a cache entry for a matter.
    pub async fn insert(&self, matter_uuid: &str, mode: &str, path: &str, size: i64) -> Result<String> {
        let uuid = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO image_caches (uuid, matter_uuid, mode, path, size, create_time)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(matter_uuid)
        .bind(mode)
        .bind(path)
        .bind(size)
        .bind(db_time(&now()))
        .execute(&self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(uuid)
    }

    /// Number of cache entries for a matter.
    pub async fn count_by_matter(&self, matter_uuid: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM image_caches WHERE matter_uuid = ?")
            .bind(matter_uuid)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(count)
    }
}

#[async_trait]
impl ImageCache for SqliteImageCache {
    async fn delete_by_matters(&self, matter_uuids: &[String]) -> Result<u64> {
        let mut deleted = 0;
        for chunk in matter_uuids.chunks(DELETE_CHUNK) {
            let mut query: sqlx::QueryBuilder<sqlx::Sqlite> =
                sqlx::QueryBuilder::new("DELETE FROM image_caches WHERE matter_uuid IN (");
            let mut separated = query.separated(", ");
            for uuid in chunk {
                separated.push_bind(uuid);
            }
            separated.push_unseparated(")");

            let result = query
                .build()
                .execute(&self.pool)
                .await
                .map_err(|e| MatterError::Database(e.to_string()))?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }
}
