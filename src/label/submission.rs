//! SQLite-backed submission tracking and profile lookup.

use async_trait::async_trait;
use uuid::Uuid;

use super::policy::{ProfileDirectory, SubmissionTracker};
use crate::db::{db_time, now, DbPool};
use crate::{MatterError, Result};

/// Submissions and user profiles stored alongside the matter tables.
#[derive(Clone)]
pub struct SqliteSubmissions {
    pool: DbPool,
}

impl SqliteSubmissions {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record that a member submitted a matter.
    pub async fn record_submission(
        &self,
        matter_uuid: &str,
        author_code: &str,
        recommended: bool,
    ) -> Result<String> {
        let uuid = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO submissions (uuid, matter_uuid, author_code, recommended, create_time)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(matter_uuid)
        .bind(author_code)
        .bind(recommended)
        .bind(db_time(&now()))
        .execute(&self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(uuid)
    }

    /// Flag or unflag every submission of a matter as recommended.
    pub async fn set_recommended(&self, matter_uuid: &str, recommended: bool) -> Result<u64> {
        let result = sqlx::query("UPDATE submissions SET recommended = ? WHERE matter_uuid = ?")
            .bind(recommended)
            .bind(matter_uuid)
            .execute(&self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Create or replace a user's profile.
    pub async fn upsert_profile(&self, user_uuid: &str, member_code: &str, unit: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_profiles (user_uuid, member_code, unit) VALUES (?, ?, ?)
             ON CONFLICT(user_uuid) DO UPDATE SET member_code = excluded.member_code, unit = excluded.unit",
        )
        .bind(user_uuid)
        .bind(member_code)
        .bind(unit)
        .execute(&self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl SubmissionTracker for SqliteSubmissions {
    async fn recommended_matters(&self) -> Result<Vec<String>> {
        let uuids: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT matter_uuid FROM submissions WHERE recommended = 1 ORDER BY matter_uuid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(uuids)
    }

    async fn matters_submitted_by_unit(&self, unit: &str) -> Result<Vec<String>> {
        let uuids: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT s.matter_uuid
             FROM submissions s JOIN user_profiles p ON p.member_code = s.author_code
             WHERE p.unit = ?
             ORDER BY s.matter_uuid",
        )
        .bind(unit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(uuids)
    }
}

#[async_trait]
impl ProfileDirectory for SqliteSubmissions {
    async fn unit_of(&self, user_uuid: &str) -> Result<Option<String>> {
        let unit: Option<String> =
            sqlx::query_scalar("SELECT unit FROM user_profiles WHERE user_uuid = ?")
                .bind(user_uuid)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(unit)
    }
}
