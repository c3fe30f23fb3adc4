//! Share and bridge types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::browse::MatterNode;
use crate::matter::Matter;
use crate::MatterError;

/// Shape of a share's selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareType {
    /// A single file.
    File,
    /// A single directory.
    Directory,
    /// Several sibling matters.
    Mixed,
}

impl ShareType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareType::File => "file",
            ShareType::Directory => "directory",
            ShareType::Mixed => "mixed",
        }
    }
}

impl FromStr for ShareType {
    type Err = MatterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(ShareType::File),
            "directory" => Ok(ShareType::Directory),
            "mixed" => Ok(ShareType::Mixed),
            other => Err(MatterError::Database(format!("unknown share type: {other}"))),
        }
    }
}

impl fmt::Display for ShareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a share stops being usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpiryPolicy {
    /// Never expires.
    Infinite,
    /// Expires at the given instant.
    Until(DateTime<Utc>),
}

impl ExpiryPolicy {
    /// Whether the policy has lapsed at `at`.
    pub fn is_expired(&self, at: &DateTime<Utc>) -> bool {
        match self {
            ExpiryPolicy::Infinite => false,
            ExpiryPolicy::Until(until) => until <= at,
        }
    }
}

/// A bounded, code-protected view onto some of an owner's matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Share {
    pub uuid: String,
    /// Display name derived from the selection.
    pub name: String,
    pub share_type: ShareType,
    /// Owner identifier.
    pub user_uuid: String,
    /// Space the shared matters live in.
    pub space_uuid: String,
    /// Secret code guests must present.
    pub code: String,
    pub expiry: ExpiryPolicy,
    pub download_times: i64,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// Row representation of a share.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ShareRow {
    uuid: String,
    name: String,
    share_type: String,
    user_uuid: String,
    space_uuid: String,
    code: String,
    expire_infinity: bool,
    expire_time: Option<DateTime<Utc>>,
    download_times: i64,
    create_time: DateTime<Utc>,
    update_time: DateTime<Utc>,
}

impl ShareRow {
    pub(crate) fn into_share(self) -> crate::Result<Share> {
        let expiry = match (self.expire_infinity, self.expire_time) {
            (false, Some(until)) => ExpiryPolicy::Until(until),
            (false, None) => {
                return Err(MatterError::Database(format!(
                    "share {} has a timed expiry without a time",
                    self.uuid
                )))
            }
            (true, _) => ExpiryPolicy::Infinite,
        };

        Ok(Share {
            share_type: self.share_type.parse()?,
            uuid: self.uuid,
            name: self.name,
            user_uuid: self.user_uuid,
            space_uuid: self.space_uuid,
            code: self.code,
            expiry,
            download_times: self.download_times,
            create_time: self.create_time,
            update_time: self.update_time,
        })
    }
}

/// Join row linking a share to one shared matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Bridge {
    pub uuid: String,
    pub share_uuid: String,
    pub matter_uuid: String,
    pub create_time: DateTime<Utc>,
}

/// What a guest sees when browsing a share.
#[derive(Debug, Clone, Serialize)]
pub struct ShareView {
    pub share: Share,
    /// Directly bridged matters, filled for root-level browsing.
    pub matters: Vec<Matter>,
    /// The browsed directory with its ancestors up to the share root.
    pub dir_matter: Option<MatterNode>,
}
