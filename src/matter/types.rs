//! Matter types, listing predicates and ordering.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::label::LabelFilter;

/// Parent identifier of every top-level matter in a space.
pub const MATTER_ROOT: &str = "root";

/// A file or directory node in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Matter {
    /// Unique matter identifier.
    pub uuid: String,
    /// Parent identifier, or [`MATTER_ROOT`] for top-level matters.
    pub puuid: String,
    /// Owner identifier.
    pub user_uuid: String,
    /// Space (quota scope) identifier.
    pub space_uuid: String,
    /// Display name.
    pub name: String,
    /// Whether this matter is a directory.
    pub dir: bool,
    /// Size in bytes. Directory sizes are only refreshed on demand.
    pub size: i64,
    /// Materialized path from the space root, e.g. `/docs/a.txt`.
    pub path: String,
    /// Monotonic creation-order key used as a sibling tie-break.
    pub sort: i64,
    /// Visit/download counter.
    pub times: i64,
    /// Last visit time.
    pub visit_time: Option<DateTime<Utc>>,
    /// Whether the matter is in the trash.
    pub deleted: bool,
    /// When the matter was moved to the trash.
    pub delete_time: Option<DateTime<Utc>>,
    /// Creation time.
    pub create_time: DateTime<Utc>,
    /// Last update time.
    pub update_time: DateTime<Utc>,
}

impl Matter {
    /// Build the virtual root directory of a space.
    ///
    /// The root is never persisted.
    pub fn root(space_uuid: impl Into<String>, user_uuid: impl Into<String>) -> Self {
        let now = crate::db::now();
        Self {
            uuid: MATTER_ROOT.to_string(),
            puuid: String::new(),
            user_uuid: user_uuid.into(),
            space_uuid: space_uuid.into(),
            name: MATTER_ROOT.to_string(),
            dir: true,
            size: 0,
            path: String::new(),
            sort: 0,
            times: 0,
            visit_time: None,
            deleted: false,
            delete_time: None,
            create_time: now,
            update_time: now,
        }
    }

    /// Whether this is the virtual space root.
    pub fn is_root(&self) -> bool {
        self.uuid == MATTER_ROOT
    }
}

/// Data for creating a new matter.
#[derive(Debug, Clone)]
pub struct NewMatter {
    /// Parent identifier or [`MATTER_ROOT`].
    pub puuid: String,
    /// Owner identifier.
    pub user_uuid: String,
    /// Space identifier.
    pub space_uuid: String,
    /// Display name.
    pub name: String,
    /// Whether this is a directory.
    pub dir: bool,
    /// Size in bytes.
    pub size: i64,
    /// Materialized path.
    pub path: String,
}

impl NewMatter {
    /// A file placed under `parent`, inheriting its owner and space.
    pub fn file(parent: &Matter, name: impl Into<String>, size: i64) -> Self {
        Self::under(parent, name.into(), false, size)
    }

    /// A directory placed under `parent`, inheriting its owner and space.
    pub fn directory(parent: &Matter, name: impl Into<String>) -> Self {
        Self::under(parent, name.into(), true, 0)
    }

    fn under(parent: &Matter, name: String, dir: bool, size: i64) -> Self {
        Self {
            puuid: parent.uuid.clone(),
            user_uuid: parent.user_uuid.clone(),
            space_uuid: parent.space_uuid.clone(),
            path: format!("{}/{}", parent.path, name),
            name,
            dir,
            size,
        }
    }
}

/// A three-way boolean filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    /// Do not filter.
    #[default]
    Any,
    /// Only rows where the flag is set.
    Yes,
    /// Only rows where the flag is clear.
    No,
}

impl TriState {
    /// The bound value for an SQL comparison, or `None` for [`TriState::Any`].
    pub fn as_flag(self) -> Option<bool> {
        match self {
            TriState::Any => None,
            TriState::Yes => Some(true),
            TriState::No => Some(false),
        }
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => TriState::Any,
            Some(true) => TriState::Yes,
            Some(false) => TriState::No,
        }
    }
}

/// Owner or space scope for sibling and size queries.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'s> {
    /// Rows owned by a user.
    Owner(&'s str),
    /// Rows belonging to a space.
    Space(&'s str),
}

impl<'s> Scope<'s> {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Scope::Owner(_) => "user_uuid",
            Scope::Space(_) => "space_uuid",
        }
    }

    pub(crate) fn value(&self) -> &'s str {
        match self {
            Scope::Owner(v) | Scope::Space(v) => v,
        }
    }
}

/// Independently optional listing predicates, conjoined together.
#[derive(Debug, Clone, Default)]
pub struct MatterQuery {
    /// Parent identifier.
    pub puuid: Option<String>,
    /// Owner identifier.
    pub user_uuid: Option<String>,
    /// Space identifier.
    pub space_uuid: Option<String>,
    /// Name substring.
    pub name: Option<String>,
    /// Directory filter.
    pub dir: TriState,
    /// Trash filter.
    pub deleted: TriState,
    /// Only matters trashed strictly before this instant.
    pub delete_time_before: Option<DateTime<Utc>>,
    /// Extension allow-list; a name matches if it ends with any of them.
    pub extensions: Vec<String>,
    /// Required-label policy.
    pub labels: Option<LabelFilter>,
}

impl MatterQuery {
    /// Create an unfiltered query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to children of a parent.
    pub fn puuid(mut self, puuid: impl Into<String>) -> Self {
        self.puuid = Some(puuid.into());
        self
    }

    /// Restrict to an owner.
    pub fn user(mut self, user_uuid: impl Into<String>) -> Self {
        self.user_uuid = Some(user_uuid.into());
        self
    }

    /// Restrict to a space.
    pub fn space(mut self, space_uuid: impl Into<String>) -> Self {
        self.space_uuid = Some(space_uuid.into());
        self
    }

    /// Restrict to names containing a substring.
    pub fn name_like(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the directory filter.
    pub fn dir(mut self, dir: TriState) -> Self {
        self.dir = dir;
        self
    }

    /// Set the trash filter.
    pub fn deleted(mut self, deleted: TriState) -> Self {
        self.deleted = deleted;
        self
    }

    /// Only matters trashed before a cutoff.
    pub fn delete_time_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.delete_time_before = Some(cutoff);
        self
    }

    /// Set the extension allow-list. Leading dots are ignored.
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Set the required-label policy.
    pub fn labels(mut self, filter: LabelFilter) -> Self {
        self.labels = Some(filter);
        self
    }
}

/// Sortable matter columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreateTime,
    UpdateTime,
    DeleteTime,
    Sort,
    Times,
    Dir,
    Size,
    Name,
    Uuid,
}

impl SortKey {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            SortKey::CreateTime => "create_time",
            SortKey::UpdateTime => "update_time",
            SortKey::DeleteTime => "delete_time",
            SortKey::Sort => "sort",
            SortKey::Times => "times",
            SortKey::Dir => "dir",
            SortKey::Size => "size",
            SortKey::Name => "name",
            SortKey::Uuid => "uuid",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One ordering term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderPair {
    pub key: SortKey,
    pub direction: Direction,
}

impl OrderPair {
    pub fn asc(key: SortKey) -> Self {
        Self {
            key,
            direction: Direction::Asc,
        }
    }

    pub fn desc(key: SortKey) -> Self {
        Self {
            key,
            direction: Direction::Desc,
        }
    }

    /// Directories first, then newest first.
    pub fn default_listing() -> Vec<OrderPair> {
        vec![
            OrderPair::desc(SortKey::Dir),
            OrderPair::desc(SortKey::CreateTime),
            OrderPair::desc(SortKey::Sort),
        ]
    }

    /// Render an `ORDER BY` body. Empty input falls back to the default listing order.
    ///
    /// `uuid ASC` is appended unless the order already uses it, so rows
    /// never tie and OFFSET pages stay disjoint.
    pub(crate) fn to_sql(order: &[OrderPair]) -> String {
        let default_order;
        let order = if order.is_empty() {
            default_order = Self::default_listing();
            &default_order
        } else {
            order
        };
        let mut terms: Vec<String> = order
            .iter()
            .map(|o| format!("{} {}", o.key.column(), o.direction.as_sql()))
            .collect();
        if !order.iter().any(|o| o.key == SortKey::Uuid) {
            terms.push(format!("{} {}", SortKey::Uuid.column(), Direction::Asc.as_sql()));
        }
        terms.join(", ")
    }
}

/// One page of results plus the totals needed to render pagination.
#[derive(Debug, Clone, Serialize)]
pub struct Pager<T> {
    /// Zero-based page index.
    pub page: i64,
    /// Requested page size.
    pub page_size: i64,
    /// Total number of matching rows.
    pub total_items: i64,
    /// Number of pages needed for all matching rows.
    pub total_pages: i64,
    /// Rows on this page.
    pub data: Vec<T>,
}

impl<T> Pager<T> {
    pub fn new(page: i64, page_size: i64, total_items: i64, data: Vec<T>) -> Self {
        let total_pages = if page_size > 0 {
            (total_items + page_size - 1) / page_size
        } else {
            0
        };
        Self {
            page,
            page_size,
            total_items,
            total_pages,
            data,
        }
    }
}
