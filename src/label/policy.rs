//! Required-label policies for filtered listing.
//!
//! A policy resolves to an allow-set of matter identifiers which the
//! listing then intersects with its other predicates.

use async_trait::async_trait;
use tracing::debug;

use super::repository::LabelRepository;
use crate::db::DbPool;
use crate::Result;

/// How a listing's required labels are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelFilter {
    /// Matters carrying every named label. An empty list does not filter.
    Superset(Vec<String>),
    /// Matters the submission tracker has flagged as recommended.
    Reviewer,
    /// Matters submitted by members of the given user's unit.
    UnitAdmin { user_uuid: String },
}

/// Tracks submitted matters and reviewer recommendations.
#[async_trait]
pub trait SubmissionTracker: Send + Sync {
    /// Identifiers of matters flagged as recommended.
    async fn recommended_matters(&self) -> Result<Vec<String>>;

    /// Identifiers of matters submitted by members of `unit`.
    async fn matters_submitted_by_unit(&self, unit: &str) -> Result<Vec<String>>;
}

/// Looks up organisational data for users.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// The unit a user belongs to, if the user has a profile.
    async fn unit_of(&self, user_uuid: &str) -> Result<Option<String>>;
}

/// Resolves a [`LabelFilter`] into an allow-set.
pub struct LabelResolver<'a> {
    pool: &'a DbPool,
    submissions: &'a dyn SubmissionTracker,
    profiles: &'a dyn ProfileDirectory,
}

impl<'a> LabelResolver<'a> {
    pub fn new(
        pool: &'a DbPool,
        submissions: &'a dyn SubmissionTracker,
        profiles: &'a dyn ProfileDirectory,
    ) -> Self {
        Self {
            pool,
            submissions,
            profiles,
        }
    }

    /// Resolve the filter.
    ///
    /// `None` means the filter places no restriction. `Some` with an empty
    /// set means nothing can match.
    pub async fn resolve(&self, filter: &LabelFilter) -> Result<Option<Vec<String>>> {
        let allowed = match filter {
            LabelFilter::Superset(names) => {
                if names.is_empty() {
                    return Ok(None);
                }
                LabelRepository::new(self.pool).targets_with_all(names).await?
            }
            LabelFilter::Reviewer => self.submissions.recommended_matters().await?,
            LabelFilter::UnitAdmin { user_uuid } => match self.profiles.unit_of(user_uuid).await? {
                Some(unit) => self.submissions.matters_submitted_by_unit(&unit).await?,
                None => {
                    debug!(user = %user_uuid, "no profile, unit filter resolves empty");
                    Vec::new()
                }
            },
        };

        debug!(?filter, count = allowed.len(), "resolved label filter");
        Ok(Some(allowed))
    }
}
