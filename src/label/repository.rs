//! Label repository.
//!
//! Label definitions live in `labels`; assignments to matters live in
//! `labeled`. There is no foreign key from `labeled.target` to `matters`,
//! so hard deletes of matters clear assignments through
//! [`LabelRepository::delete_by_targets`].

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::types::{Label, LabelWithValue, Labeled};
use crate::db::{db_time, now, DbPool};
use crate::{MatterError, Result};

/// Repository for label definitions and assignments.
pub struct LabelRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> LabelRepository<'a> {
    /// Create a new LabelRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Define a new label.
    ///
    /// Fails with BadRequest if a label with the same name already exists.
    pub async fn create_label(&self, name: &str, label_type: &str) -> Result<Label> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MatterError::BadRequest("label name is empty".to_string()));
        }
        if self.find_label(name).await?.is_some() {
            return Err(MatterError::BadRequest(format!(
                "label {name} already exists"
            )));
        }

        let label = Label {
            uuid: Uuid::new_v4().to_string(),
            name: name.to_string(),
            label_type: label_type.to_string(),
            create_time: now(),
        };

        sqlx::query("INSERT INTO labels (uuid, name, label_type, create_time) VALUES (?, ?, ?, ?)")
            .bind(&label.uuid)
            .bind(&label.name)
            .bind(&label.label_type)
            .bind(db_time(&label.create_time))
            .execute(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(label)
    }

    /// Get a label definition by name.
    pub async fn find_label(&self, name: &str) -> Result<Option<Label>> {
        let label = sqlx::query_as::<_, Label>(
            "SELECT uuid, name, label_type, create_time FROM labels WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(label)
    }

    /// Assign a label to a target.
    ///
    /// The label must be defined. Assigning it again replaces the value.
    pub async fn add_label(&self, name: &str, target: &str, value: i64) -> Result<Labeled> {
        if self.find_label(name).await?.is_none() {
            return Err(MatterError::NotFound(format!("label {name}")));
        }

        let existing = sqlx::query_as::<_, Labeled>(
            "SELECT uuid, name, target, value, create_time FROM labeled
             WHERE name = ? AND target = ?",
        )
        .bind(name)
        .bind(target)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        if let Some(mut labeled) = existing {
            sqlx::query("UPDATE labeled SET value = ? WHERE uuid = ?")
                .bind(value)
                .bind(&labeled.uuid)
                .execute(self.pool)
                .await
                .map_err(|e| MatterError::Database(e.to_string()))?;
            labeled.value = value;
            return Ok(labeled);
        }

        let labeled = Labeled {
            uuid: Uuid::new_v4().to_string(),
            name: name.to_string(),
            target: target.to_string(),
            value,
            create_time: now(),
        };

        sqlx::query(
            "INSERT INTO labeled (uuid, name, target, value, create_time) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&labeled.uuid)
        .bind(&labeled.name)
        .bind(&labeled.target)
        .bind(labeled.value)
        .bind(db_time(&labeled.create_time))
        .execute(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(labeled)
    }

    /// Labels assigned to a target, with their values, ordered by name.
    pub async fn matter_labels(&self, target: &str) -> Result<Vec<LabelWithValue>> {
        let labels = sqlx::query_as::<_, LabelWithValue>(
            "SELECT l.name, l.label_type, d.value
             FROM labeled d JOIN labels l ON l.name = d.name
             WHERE d.target = ?
             ORDER BY l.name ASC",
        )
        .bind(target)
        .fetch_all(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(labels)
    }

    /// Remove one assignment. Returns true if a row was removed.
    pub async fn delete_label(&self, name: &str, target: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM labeled WHERE name = ? AND target = ?")
            .bind(name)
            .bind(target)
            .execute(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove every assignment on a target.
    pub async fn delete_by_target(&self, target: &str) -> Result<u64> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;
        Self::delete_by_targets(&mut *conn, &[target.to_string()]).await
    }

    /// Remove every assignment on the given targets using an open connection.
    pub(crate) async fn delete_by_targets(
        conn: &mut SqliteConnection,
        targets: &[String],
    ) -> Result<u64> {
        if targets.is_empty() {
            return Ok(0);
        }
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM labeled WHERE target IN (");
        let mut separated = query.separated(", ");
        for target in targets {
            separated.push_bind(target);
        }
        separated.push_unseparated(")");

        let result = query
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Targets whose distinct assigned label names include every name given.
    ///
    /// Duplicate names are collapsed before matching.
    pub async fn targets_with_all(&self, names: &[String]) -> Result<Vec<String>> {
        let mut wanted: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        wanted.sort_unstable();
        wanted.dedup();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT target FROM labeled WHERE name IN (");
        let mut separated = query.separated(", ");
        for name in &wanted {
            separated.push_bind(*name);
        }
        separated.push_unseparated(")");
        query.push(" GROUP BY target HAVING COUNT(DISTINCT name) >= ");
        query.push_bind(wanted.len() as i64);
        query.push(" ORDER BY target");

        let targets: Vec<String> = query
            .build_query_scalar::<String>()
            .fetch_all(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(targets)
    }
}
