//! Share and bridge repositories.
//!
//! Writes that must commit together with other rows take an open
//! connection so they can run inside the caller's transaction.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::types::{Bridge, ExpiryPolicy, Share, ShareRow};
use crate::db::{db_time, now, DbPool};
use crate::{MatterError, Result};

const SHARE_COLUMNS: &str = "uuid, name, share_type, user_uuid, space_uuid, code, \
     expire_infinity, expire_time, download_times, create_time, update_time";

/// Repository for share rows.
pub struct ShareRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ShareRepository<'a> {
    /// Create a new ShareRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a share using an open connection.
    pub(crate) async fn insert(conn: &mut SqliteConnection, share: &Share) -> Result<()> {
        let (infinite, expire_time) = match share.expiry {
            ExpiryPolicy::Infinite => (true, None),
            ExpiryPolicy::Until(until) => (false, Some(db_time(&until))),
        };

        sqlx::query(
            "INSERT INTO shares (uuid, name, share_type, user_uuid, space_uuid, code,
                                 expire_infinity, expire_time, download_times, create_time, update_time)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&share.uuid)
        .bind(&share.name)
        .bind(share.share_type.as_str())
        .bind(&share.user_uuid)
        .bind(&share.space_uuid)
        .bind(&share.code)
        .bind(infinite)
        .bind(expire_time)
        .bind(share.download_times)
        .bind(db_time(&share.create_time))
        .bind(db_time(&share.update_time))
        .execute(&mut *conn)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(())
    }

    /// Get a share by identifier.
    pub async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Share>> {
        let row = sqlx::query_as::<_, ShareRow>(&format!(
            "SELECT {SHARE_COLUMNS} FROM shares WHERE uuid = ?"
        ))
        .bind(uuid)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        row.map(ShareRow::into_share).transpose()
    }

    /// Get a share by identifier, failing with NotFound if absent.
    pub async fn check_by_uuid(&self, uuid: &str) -> Result<Share> {
        self.find_by_uuid(uuid)
            .await?
            .ok_or_else(|| MatterError::NotFound(format!("share {uuid}")))
    }

    /// One page of an owner's shares, newest first.
    pub async fn page_by_owner(
        &self,
        user_uuid: &str,
        page: i64,
        page_size: i64,
    ) -> Result<(i64, Vec<Share>)> {
        if page < 0 || page_size <= 0 {
            return Err(MatterError::BadRequest("invalid page".to_string()));
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shares WHERE user_uuid = ?")
            .bind(user_uuid)
            .fetch_one(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;
        if count == 0 {
            return Ok((0, Vec::new()));
        }

        let rows = sqlx::query_as::<_, ShareRow>(&format!(
            "SELECT {SHARE_COLUMNS} FROM shares WHERE user_uuid = ?
             ORDER BY create_time DESC, uuid DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_uuid)
        .bind(page_size)
        .bind(page.saturating_mul(page_size))
        .fetch_all(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        let shares = rows
            .into_iter()
            .map(ShareRow::into_share)
            .collect::<Result<Vec<_>>>()?;
        Ok((count, shares))
    }

    /// Delete a share row using an open connection.
    pub(crate) async fn delete(conn: &mut SqliteConnection, uuid: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shares WHERE uuid = ?")
            .bind(uuid)
            .execute(&mut *conn)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

/// Repository for bridge rows.
pub struct BridgeRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> BridgeRepository<'a> {
    /// Create a new BridgeRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a bridge using an open connection.
    pub(crate) async fn insert(
        conn: &mut SqliteConnection,
        share_uuid: &str,
        matter_uuid: &str,
    ) -> Result<Bridge> {
        let bridge = Bridge {
            uuid: Uuid::new_v4().to_string(),
            share_uuid: share_uuid.to_string(),
            matter_uuid: matter_uuid.to_string(),
            create_time: now(),
        };

        sqlx::query(
            "INSERT INTO bridges (uuid, share_uuid, matter_uuid, create_time) VALUES (?, ?, ?, ?)",
        )
        .bind(&bridge.uuid)
        .bind(&bridge.share_uuid)
        .bind(&bridge.matter_uuid)
        .bind(db_time(&bridge.create_time))
        .execute(&mut *conn)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(bridge)
    }

    /// Bridges of a share in creation order.
    pub async fn list_by_share(&self, share_uuid: &str) -> Result<Vec<Bridge>> {
        let bridges = sqlx::query_as::<_, Bridge>(
            "SELECT uuid, share_uuid, matter_uuid, create_time FROM bridges
             WHERE share_uuid = ? ORDER BY create_time ASC, uuid ASC",
        )
        .bind(share_uuid)
        .fetch_all(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(bridges)
    }

    /// The bridge linking a share to a matter, if any.
    pub async fn find_by_share_and_matter(
        &self,
        share_uuid: &str,
        matter_uuid: &str,
    ) -> Result<Option<Bridge>> {
        let bridge = sqlx::query_as::<_, Bridge>(
            "SELECT uuid, share_uuid, matter_uuid, create_time FROM bridges
             WHERE share_uuid = ? AND matter_uuid = ?",
        )
        .bind(share_uuid)
        .bind(matter_uuid)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(bridge)
    }

    /// Number of bridges referencing a matter.
    pub async fn count_by_matter(&self, matter_uuid: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bridges WHERE matter_uuid = ?")
            .bind(matter_uuid)
            .fetch_one(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Delete every bridge of a share using an open connection.
    pub(crate) async fn delete_by_share(conn: &mut SqliteConnection, share_uuid: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM bridges WHERE share_uuid = ?")
            .bind(share_uuid)
            .execute(&mut *conn)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Delete every bridge referencing the given matters using an open connection.
    pub(crate) async fn delete_by_matters(
        conn: &mut SqliteConnection,
        matter_uuids: &[String],
    ) -> Result<u64> {
        if matter_uuids.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM bridges WHERE matter_uuid IN (");
        let mut separated = qb.separated(", ");
        for uuid in matter_uuids {
            separated.push_bind(uuid.clone());
        }
        separated.push_unseparated(")");

        let result = qb
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
