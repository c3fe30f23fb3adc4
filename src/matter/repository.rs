//! Matter repository.
//!
//! Row-level access to the `matters` table. Multi-row mutations that must
//! commit together are exposed as associated functions taking an open
//! connection, so callers can run them inside a transaction.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::types::{Matter, MatterQuery, NewMatter, OrderPair, Scope, TriState, MATTER_ROOT};
use crate::db::{db_time, now, DbPool};
use crate::label::LabelRepository;
use crate::share::BridgeRepository;
use crate::{MatterError, Result};

pub(crate) const MATTER_COLUMNS: &str = "uuid, puuid, user_uuid, space_uuid, name, dir, size, path, \
     sort, times, visit_time, deleted, delete_time, create_time, update_time";

/// Upper bound on bound parameters per `IN (...)` list.
const IN_CHUNK: usize = 500;

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Pattern matching every path that starts with `prefix`.
pub(crate) fn like_prefix(prefix: &str) -> String {
    format!("{}%", escape_like(prefix))
}

/// Append the listing predicates of `query` as `AND` terms.
///
/// `allow` is a JSON array of identifiers, bound as one parameter so its
/// length is not limited by SQLite's variable cap.
fn push_conditions(qb: &mut QueryBuilder<'_, Sqlite>, query: &MatterQuery, allow: Option<&str>) {
    if let Some(ref puuid) = query.puuid {
        qb.push(" AND puuid = ");
        qb.push_bind(puuid.clone());
    }
    if let Some(ref user) = query.user_uuid {
        qb.push(" AND user_uuid = ");
        qb.push_bind(user.clone());
    }
    if let Some(ref space) = query.space_uuid {
        qb.push(" AND space_uuid = ");
        qb.push_bind(space.clone());
    }
    if let Some(ref name) = query.name {
        qb.push(" AND name LIKE ");
        qb.push_bind(format!("%{}%", escape_like(name)));
        qb.push(" ESCAPE '\\'");
    }
    if let Some(dir) = query.dir.as_flag() {
        qb.push(" AND dir = ");
        qb.push_bind(dir);
    }
    if let Some(deleted) = query.deleted.as_flag() {
        qb.push(" AND deleted = ");
        qb.push_bind(deleted);
    }
    if let Some(cutoff) = query.delete_time_before {
        qb.push(" AND delete_time < ");
        qb.push_bind(db_time(&cutoff));
    }
    if !query.extensions.is_empty() {
        qb.push(" AND (");
        for (i, ext) in query.extensions.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("name LIKE ");
            qb.push_bind(format!("%.{}", escape_like(ext)));
            qb.push(" ESCAPE '\\'");
        }
        qb.push(")");
    }
    if let Some(allow) = allow {
        qb.push(" AND uuid IN (SELECT value FROM json_each(");
        qb.push_bind(allow.to_string());
        qb.push("))");
    }
}

/// Repository for matter rows.
pub struct MatterRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> MatterRepository<'a> {
    /// Create a new MatterRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new matter.
    ///
    /// Assigns the identifier, timestamps and a sort key strictly greater
    /// than every existing one.
    pub async fn create(&self, new: &NewMatter) -> Result<Matter> {
        if new.puuid.is_empty() {
            return Err(MatterError::BadRequest("parent is empty".to_string()));
        }
        if new.path.is_empty() {
            return Err(MatterError::BadRequest("path is empty".to_string()));
        }
        if new.size < 0 {
            return Err(MatterError::BadRequest("size is negative".to_string()));
        }

        let uuid = Uuid::new_v4().to_string();
        let created = now();
        let stamp = db_time(&created);

        let sort: i64 = sqlx::query_scalar(
            "INSERT INTO matters (uuid, puuid, user_uuid, space_uuid, name, dir, size, path,
                                  sort, create_time, update_time)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?,
                     MAX(?, COALESCE((SELECT MAX(sort) FROM matters), 0) + 1), ?, ?)
             RETURNING sort",
        )
        .bind(&uuid)
        .bind(&new.puuid)
        .bind(&new.user_uuid)
        .bind(&new.space_uuid)
        .bind(&new.name)
        .bind(new.dir)
        .bind(new.size)
        .bind(&new.path)
        .bind(created.timestamp_millis())
        .bind(&stamp)
        .bind(&stamp)
        .fetch_one(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(Matter {
            uuid,
            puuid: new.puuid.clone(),
            user_uuid: new.user_uuid.clone(),
            space_uuid: new.space_uuid.clone(),
            name: new.name.clone(),
            dir: new.dir,
            size: new.size,
            path: new.path.clone(),
            sort,
            times: 0,
            visit_time: None,
            deleted: false,
            delete_time: None,
            create_time: created,
            update_time: created,
        })
    }

    /// Write every mutable field of a matter and bump its update time.
    pub async fn save(&self, matter: &Matter) -> Result<Matter> {
        if matter.size < 0 {
            return Err(MatterError::BadRequest("size is negative".to_string()));
        }

        let mut saved = matter.clone();
        saved.update_time = now();

        let result = sqlx::query(
            "UPDATE matters SET puuid = ?, user_uuid = ?, space_uuid = ?, name = ?, dir = ?,
                    size = ?, path = ?, times = ?, visit_time = ?, deleted = ?, delete_time = ?,
                    update_time = ?
             WHERE uuid = ?",
        )
        .bind(&saved.puuid)
        .bind(&saved.user_uuid)
        .bind(&saved.space_uuid)
        .bind(&saved.name)
        .bind(saved.dir)
        .bind(saved.size)
        .bind(&saved.path)
        .bind(saved.times)
        .bind(saved.visit_time.as_ref().map(db_time))
        .bind(saved.deleted)
        .bind(saved.delete_time.as_ref().map(db_time))
        .bind(db_time(&saved.update_time))
        .bind(&saved.uuid)
        .execute(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(MatterError::NotFound(format!("matter {}", saved.uuid)));
        }
        Ok(saved)
    }

    /// Get a matter by identifier.
    pub async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Matter>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;
        Self::find_in(&mut *conn, uuid).await
    }

    /// Get a matter by identifier, failing with NotFound if absent.
    pub async fn check_by_uuid(&self, uuid: &str) -> Result<Matter> {
        self.find_by_uuid(uuid)
            .await?
            .ok_or_else(|| MatterError::NotFound(format!("matter {uuid}")))
    }

    /// Like [`check_by_uuid`](Self::check_by_uuid), but the root sentinel
    /// resolves to the virtual root of `space_uuid`.
    pub async fn check_with_root(
        &self,
        uuid: &str,
        space_uuid: &str,
        user_uuid: &str,
    ) -> Result<Matter> {
        if uuid.is_empty() {
            return Err(MatterError::BadRequest("matter uuid is empty".to_string()));
        }
        if uuid == MATTER_ROOT {
            return Ok(Matter::root(space_uuid, user_uuid));
        }
        self.check_by_uuid(uuid).await
    }

    /// Check a matter and its owner.
    pub async fn check_by_uuid_and_owner(&self, uuid: &str, user_uuid: &str) -> Result<Matter> {
        let matter = self.check_by_uuid(uuid).await?;
        if matter.user_uuid != user_uuid {
            return Err(MatterError::Unauthorized(format!(
                "matter {uuid} does not belong to {user_uuid}"
            )));
        }
        Ok(matter)
    }

    /// Get an owner's matter by materialized path.
    pub async fn find_by_path(&self, user_uuid: &str, path: &str) -> Result<Option<Matter>> {
        if path.is_empty() {
            return Err(MatterError::BadRequest("path is empty".to_string()));
        }

        let matter = sqlx::query_as::<_, Matter>(&format!(
            "SELECT {MATTER_COLUMNS} FROM matters
             WHERE user_uuid = ? AND path = ?
             ORDER BY deleted ASC, sort DESC LIMIT 1"
        ))
        .bind(user_uuid)
        .bind(path)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(matter)
    }

    /// Get an owner's matter by path, failing with NotFound if absent.
    pub async fn check_by_path(&self, user_uuid: &str, path: &str) -> Result<Matter> {
        self.find_by_path(user_uuid, path)
            .await?
            .ok_or_else(|| MatterError::NotFound(format!("matter at {path}")))
    }

    /// Like [`check_by_path`](Self::check_by_path), but `""` and `"/"` resolve
    /// to the virtual root.
    pub async fn check_with_root_by_path(
        &self,
        path: &str,
        space_uuid: &str,
        user_uuid: &str,
    ) -> Result<Matter> {
        if path.is_empty() || path == "/" {
            return Ok(Matter::root(space_uuid, user_uuid));
        }
        self.check_by_path(user_uuid, path).await
    }

    /// Get several matters at once. Unknown identifiers are skipped.
    pub async fn find_by_uuids(&self, uuids: &[String], order: &[OrderPair]) -> Result<Vec<Matter>> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {MATTER_COLUMNS} FROM matters WHERE uuid IN ("));
        let mut separated = qb.separated(", ");
        for uuid in uuids {
            separated.push_bind(uuid.clone());
        }
        separated.push_unseparated(")");
        qb.push(format!(" ORDER BY {}", OrderPair::to_sql(order)));

        let matters = qb
            .build_query_as::<Matter>()
            .fetch_all(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(matters)
    }

    /// Direct children of a parent owned by `user_uuid`.
    pub async fn list_children(
        &self,
        puuid: &str,
        user_uuid: &str,
        deleted: TriState,
        order: &[OrderPair],
    ) -> Result<Vec<Matter>> {
        let query = MatterQuery::new().puuid(puuid).user(user_uuid).deleted(deleted);

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {MATTER_COLUMNS} FROM matters WHERE 1 = 1"));
        push_conditions(&mut qb, &query, None);
        qb.push(format!(" ORDER BY {}", OrderPair::to_sql(order)));

        let matters = qb
            .build_query_as::<Matter>()
            .fetch_all(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(matters)
    }

    /// Number of siblings under `puuid` with the given name.
    pub async fn count_by_parent_and_name(
        &self,
        scope: Scope<'_>,
        puuid: &str,
        dir: TriState,
        name: &str,
    ) -> Result<i64> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM matters WHERE ");
        qb.push(scope.column());
        qb.push(" = ");
        qb.push_bind(scope.value().to_string());
        qb.push(" AND puuid = ");
        qb.push_bind(puuid.to_string());
        qb.push(" AND name = ");
        qb.push_bind(name.to_string());
        if let Some(dir) = dir.as_flag() {
            qb.push(" AND dir = ");
            qb.push_bind(dir);
        }

        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(count)
    }

    /// First sibling under `puuid` with the given name.
    pub async fn find_by_parent_and_name(
        &self,
        scope: Scope<'_>,
        puuid: &str,
        dir: TriState,
        name: &str,
    ) -> Result<Option<Matter>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {MATTER_COLUMNS} FROM matters WHERE "));
        qb.push(scope.column());
        qb.push(" = ");
        qb.push_bind(scope.value().to_string());
        qb.push(" AND puuid = ");
        qb.push_bind(puuid.to_string());
        qb.push(" AND name = ");
        qb.push_bind(name.to_string());
        if let Some(dir) = dir.as_flag() {
            qb.push(" AND dir = ");
            qb.push_bind(dir);
        }
        qb.push(" ORDER BY sort ASC LIMIT 1");

        let matter = qb
            .build_query_as::<Matter>()
            .fetch_optional(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(matter)
    }

    /// One page of matters matching `query`, plus the total match count.
    ///
    /// `allow` restricts results to a set of identifiers; an empty set
    /// matches nothing. `page` is zero-based. The rows query is skipped
    /// when the count is zero.
    pub async fn plain_page(
        &self,
        query: &MatterQuery,
        allow: Option<&[String]>,
        page: i64,
        page_size: i64,
        order: &[OrderPair],
    ) -> Result<(i64, Vec<Matter>)> {
        if page < 0 {
            return Err(MatterError::BadRequest("page must not be negative".to_string()));
        }
        if page_size <= 0 {
            return Err(MatterError::BadRequest("page size must be positive".to_string()));
        }
        if allow.is_some_and(|a| a.is_empty()) {
            return Ok((0, Vec::new()));
        }
        let allow = allow
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| MatterError::Database(format!("failed to encode allow set: {e}")))?;
        let allow = allow.as_deref();

        let mut count_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM matters WHERE 1 = 1");
        push_conditions(&mut count_qb, query, allow);
        let count: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        if count == 0 {
            return Ok((0, Vec::new()));
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {MATTER_COLUMNS} FROM matters WHERE 1 = 1"));
        push_conditions(&mut qb, query, allow);
        qb.push(format!(" ORDER BY {}", OrderPair::to_sql(order)));
        qb.push(" LIMIT ");
        qb.push_bind(page_size);
        qb.push(" OFFSET ");
        qb.push_bind(page.saturating_mul(page_size));

        let matters = qb
            .build_query_as::<Matter>()
            .fetch_all(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok((count, matters))
    }

    /// Bump the visit counter and stamp the visit time.
    pub async fn times_increment(&self, uuid: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE matters SET times = times + 1, visit_time = ? WHERE uuid = ?")
                .bind(db_time(&now()))
                .bind(uuid)
                .execute(self.pool)
                .await
                .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Overwrite a matter's size.
    pub async fn update_size(&self, uuid: &str, size: i64) -> Result<()> {
        if size < 0 {
            return Err(MatterError::BadRequest("size is negative".to_string()));
        }

        let result = sqlx::query("UPDATE matters SET size = ?, update_time = ? WHERE uuid = ?")
            .bind(size)
            .bind(db_time(&now()))
            .bind(uuid)
            .execute(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(MatterError::NotFound(format!("matter {uuid}")));
        }
        Ok(())
    }

    /// Set the trash flag and timestamp of one matter, leaving its children alone.
    pub(crate) async fn set_deleted(
        &self,
        uuid: &str,
        deleted: bool,
        delete_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE matters SET deleted = ?, delete_time = ? WHERE uuid = ?")
            .bind(deleted)
            .bind(delete_time.as_ref().map(db_time))
            .bind(uuid)
            .execute(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(MatterError::NotFound(format!("matter {uuid}")));
        }
        Ok(())
    }

    /// Identifiers of every matter an owner has.
    pub async fn uuids_by_owner(&self, user_uuid: &str) -> Result<Vec<String>> {
        let uuids: Vec<String> =
            sqlx::query_scalar("SELECT uuid FROM matters WHERE user_uuid = ? ORDER BY uuid")
                .bind(user_uuid)
                .fetch_all(self.pool)
                .await
                .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(uuids)
    }

    /// Number of matters in the store.
    pub async fn count_all(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matters")
            .fetch_one(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Number of matters an owner has.
    pub async fn count_by_owner(&self, user_uuid: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM matters WHERE user_uuid = ?")
            .bind(user_uuid)
            .fetch_one(self.pool)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Number of an owner's matters whose path starts with `prefix`.
    pub async fn count_by_path(&self, user_uuid: &str, prefix: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM matters WHERE user_uuid = ? AND path LIKE ? ESCAPE '\\'",
        )
        .bind(user_uuid)
        .bind(like_prefix(prefix))
        .fetch_one(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Number of matters created between `start` and `end`, both inclusive.
    pub async fn count_between(&self, start: &DateTime<Utc>, end: &DateTime<Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM matters WHERE create_time >= ? AND create_time <= ?",
        )
        .bind(db_time(start))
        .bind(db_time(end))
        .fetch_one(self.pool)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(count)
    }

    /// The matter followed by each of its ancestors, nearest first.
    ///
    /// Stops at a top-level matter, at a dangling parent reference, or
    /// when a parent repeats.
    pub async fn ancestor_chain(&self, uuid: &str) -> Result<Vec<Matter>> {
        let mut chain = vec![self.check_by_uuid(uuid).await?];
        let mut seen: HashSet<String> = HashSet::from([uuid.to_string()]);

        loop {
            let puuid = match chain.last() {
                Some(last) if last.puuid != MATTER_ROOT && !last.puuid.is_empty() => {
                    last.puuid.clone()
                }
                _ => break,
            };
            if !seen.insert(puuid.clone()) {
                break;
            }
            match self.find_by_uuid(&puuid).await? {
                Some(parent) => chain.push(parent),
                None => break,
            }
        }

        Ok(chain)
    }

    /// Get a matter using an open connection.
    pub(crate) async fn find_in(conn: &mut SqliteConnection, uuid: &str) -> Result<Option<Matter>> {
        let matter = sqlx::query_as::<_, Matter>(&format!(
            "SELECT {MATTER_COLUMNS} FROM matters WHERE uuid = ?"
        ))
        .bind(uuid)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(matter)
    }

    /// Every direct child of a parent regardless of owner or trash state.
    pub(crate) async fn children_in(conn: &mut SqliteConnection, puuid: &str) -> Result<Vec<Matter>> {
        let matters = sqlx::query_as::<_, Matter>(&format!(
            "SELECT {MATTER_COLUMNS} FROM matters WHERE puuid = ? ORDER BY sort ASC"
        ))
        .bind(puuid)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(matters)
    }

    /// Delete matter rows together with their bridges and label assignments.
    pub(crate) async fn delete_rows(conn: &mut SqliteConnection, uuids: &[String]) -> Result<u64> {
        let mut deleted = 0;
        for chunk in uuids.chunks(IN_CHUNK) {
            BridgeRepository::delete_by_matters(&mut *conn, chunk).await?;
            LabelRepository::delete_by_targets(&mut *conn, chunk).await?;

            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM matters WHERE uuid IN (");
            let mut separated = qb.separated(", ");
            for uuid in chunk {
                separated.push_bind(uuid.clone());
            }
            separated.push_unseparated(")");

            let result = qb
                .build()
                .execute(&mut *conn)
                .await
                .map_err(|e| MatterError::Database(e.to_string()))?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    /// Rewrite the path of a matter and all its descendants in a space.
    ///
    /// Rows at exactly `old_path`, or under `old_path/`, get `old_path`
    /// replaced by `new_path`.
    pub(crate) async fn rewrite_paths(
        conn: &mut SqliteConnection,
        space_uuid: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE matters SET path = ? || substr(path, ?), update_time = ?
             WHERE space_uuid = ? AND (path = ? OR path LIKE ? ESCAPE '\\')",
        )
        .bind(new_path)
        .bind(old_path.chars().count() as i64 + 1)
        .bind(db_time(&now()))
        .bind(space_uuid)
        .bind(old_path)
        .bind(like_prefix(&format!("{old_path}/")))
        .execute(&mut *conn)
        .await
        .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Point a matter at a new parent and name using an open connection.
    pub(crate) async fn move_in(
        conn: &mut SqliteConnection,
        uuid: &str,
        puuid: &str,
        name: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE matters SET puuid = ?, name = ?, update_time = ? WHERE uuid = ?")
            .bind(puuid)
            .bind(name)
            .bind(db_time(&now()))
            .bind(uuid)
            .execute(&mut *conn)
            .await
            .map_err(|e| MatterError::Database(e.to_string()))?;

        Ok(())
    }
}
