//! Size aggregation.
//!
//! Nothing is cached: every call recomputes from the current rows, so a
//! query issued after a completed write always reflects it. Each sum is
//! preceded by a count and skipped entirely when no row matches.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use super::repository::{like_prefix, MatterRepository};
use super::types::{Matter, Scope};
use crate::db::{db_time, DbPool};
use crate::{MatterError, Result};

/// Computes byte totals over matter rows.
pub struct QuotaAccountant<'a> {
    pool: &'a DbPool,
}

impl<'a> QuotaAccountant<'a> {
    /// Create a new QuotaAccountant with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    async fn count_then_sum<F>(&self, push_where: F) -> Result<i64>
    where
        F: Fn(&mut QueryBuilder<'static, Sqlite>),
    {
        let mut count_qb: QueryBuilder<'static, Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM matters WHERE ");
        push_where(&mut count_qb);
        let count: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        if count == 0 {
            return Ok(0);
        }

        let mut sum_qb: QueryBuilder<'static, Sqlite> =
            QueryBuilder::new("SELECT COALESCE(SUM(size), 0) FROM matters WHERE ");
        push_where(&mut sum_qb);
        let sum: i64 = sum_qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(sum)
    }

    /// Total size of a parent's direct children within an owner or space.
    pub async fn size_by_parent(&self, puuid: &str, scope: Scope<'_>) -> Result<i64> {
        let puuid = puuid.to_string();
        let column = scope.column();
        let value = scope.value().to_string();
        self.count_then_sum(|qb| {
            qb.push("puuid = ");
            qb.push_bind(puuid.clone());
            qb.push(format!(" AND {column} = "));
            qb.push_bind(value.clone());
        })
        .await
    }

    /// Total size of an owner's matters whose path starts with `prefix`.
    pub async fn sum_size_by_path(&self, user_uuid: &str, prefix: &str) -> Result<i64> {
        let user_uuid = user_uuid.to_string();
        let pattern = like_prefix(prefix);
        self.count_then_sum(|qb| {
            qb.push("user_uuid = ");
            qb.push_bind(user_uuid.clone());
            qb.push(" AND path LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\'");
        })
        .await
    }

    /// Total size of files created between `start` and `end`, both inclusive.
    pub async fn size_between(&self, start: &DateTime<Utc>, end: &DateTime<Utc>) -> Result<i64> {
        let start = db_time(start);
        let end = db_time(end);
        self.count_then_sum(|qb| {
            qb.push("dir = 0 AND create_time >= ");
            qb.push_bind(start.clone());
            qb.push(" AND create_time <= ");
            qb.push_bind(end.clone());
        })
        .await
    }

    /// Total size of every file below a directory, at any depth.
    pub async fn dir_size(&self, dir: &Matter) -> Result<i64> {
        if !dir.dir {
            return Err(MatterError::BadRequest(format!(
                "{} is not a directory",
                dir.uuid
            )));
        }
        let space_uuid = dir.space_uuid.clone();
        let pattern = like_prefix(&format!("{}/", dir.path));
        self.count_then_sum(|qb| {
            qb.push("dir = 0 AND space_uuid = ");
            qb.push_bind(space_uuid.clone());
            qb.push(" AND path LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\'");
        })
        .await
    }

    /// Recompute a directory's size and store it on the row.
    ///
    /// The virtual root has no row; its size is computed but not stored.
    pub async fn refresh_dir_size(&self, dir: &Matter) -> Result<i64> {
        let size = self.dir_size(dir).await?;
        if !dir.is_root() {
            MatterRepository::new(self.pool)
                .update_size(&dir.uuid, size)
                .await?;
        }
        debug!(dir = %dir.uuid, size, "refreshed directory size");
        Ok(size)
    }
}
