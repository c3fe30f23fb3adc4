//! Label types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A tag definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Label {
    pub uuid: String,
    /// Unique tag name.
    pub name: String,
    /// Free-form category of the tag.
    pub label_type: String,
    pub create_time: DateTime<Utc>,
}

/// Assignment of a label to a target matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Labeled {
    pub uuid: String,
    /// Label name.
    pub name: String,
    /// Target matter identifier.
    pub target: String,
    /// Value attached to this assignment.
    pub value: i64,
    pub create_time: DateTime<Utc>,
}

/// A label definition joined with the value assigned on one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LabelWithValue {
    pub name: String,
    pub label_type: String,
    pub value: i64,
}
