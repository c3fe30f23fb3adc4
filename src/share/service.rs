//! Share service.
//!
//! Creates and deletes shares and authorizes guest access to the shared
//! subtrees. The ancestor clamp in [`clamp`] is the only thing standing
//! between a guest and the rest of the owner's tree, so every guest entry
//! point goes through [`ShareService::validate_matter`].

use std::collections::HashSet;

use rand::Rng;
use tracing::{debug, info};

use super::browse::{clamp, MatterNode};
use super::repository::{BridgeRepository, ShareRepository};
use super::types::{Bridge, ExpiryPolicy, Share, ShareType, ShareView};
use crate::config::ShareConfig;
use crate::db::{now, Database};
use crate::matter::{
    Matter, MatterQuery, MatterRepository, OrderPair, Pager, SortKey, MATTER_ROOT,
};
use crate::{MatterError, Result};

/// Characters used for share codes; ambiguous glyphs are left out.
const CODE_CHARS: &[u8] = b"abcdefghijkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a random share code.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CODE_CHARS.len());
            CODE_CHARS[idx] as char
        })
        .collect()
}

/// Credentials a guest presents for a share.
#[derive(Debug, Clone, Copy)]
pub struct ShareAccess<'a> {
    pub share_uuid: &'a str,
    pub code: &'a str,
    /// Signed-in user, if any. The owner needs no code.
    pub operator: Option<&'a str>,
}

impl<'a> ShareAccess<'a> {
    pub fn new(share_uuid: &'a str, code: &'a str) -> Self {
        Self {
            share_uuid,
            code,
            operator: None,
        }
    }

    pub fn with_operator(mut self, operator: &'a str) -> Self {
        self.operator = Some(operator);
        self
    }
}

/// Service for share operations.
#[derive(Clone)]
pub struct ShareService {
    db: Database,
    config: ShareConfig,
}

impl ShareService {
    /// Create a new ShareService.
    pub fn new(db: Database, config: ShareConfig) -> Self {
        Self { db, config }
    }

    /// Share some of an owner's matters.
    ///
    /// The selection must be non-empty, within the configured fan-out,
    /// owned by `operator` and made of siblings. The share and all its
    /// bridges are written in one transaction.
    pub async fn create(
        &self,
        operator: &str,
        matter_uuids: &[String],
        expiry: ExpiryPolicy,
    ) -> Result<(Share, Vec<Bridge>)> {
        if matter_uuids.is_empty() {
            return Err(MatterError::BadRequest("nothing to share".to_string()));
        }
        if matter_uuids.len() > self.config.max_matters {
            return Err(MatterError::BadRequest(format!(
                "cannot share {} matters, the limit is {}",
                matter_uuids.len(),
                self.config.max_matters
            )));
        }
        let created = now();
        if expiry.is_expired(&created) {
            return Err(MatterError::BadRequest(
                "expire time cannot be before now".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let repo = MatterRepository::new(self.db.pool());
        let mut matters: Vec<Matter> = Vec::with_capacity(matter_uuids.len());
        for uuid in matter_uuids {
            if !seen.insert(uuid.as_str()) {
                return Err(MatterError::BadRequest(format!("{uuid} selected twice")));
            }
            let matter = repo.check_by_uuid_and_owner(uuid, operator).await?;
            if let Some(first) = matters.first() {
                if first.puuid != matter.puuid {
                    return Err(MatterError::BadRequest(
                        "only matters in the same directory can be shared together".to_string(),
                    ));
                }
            }
            matters.push(matter);
        }

        let (share_type, name) = match matters.as_slice() {
            [only] if only.dir => (ShareType::Directory, only.name.clone()),
            [only] => (ShareType::File, only.name.clone()),
            [first, second, ..] => (
                ShareType::Mixed,
                format!("{},{} ...", first.name, second.name),
            ),
            [] => return Err(MatterError::BadRequest("nothing to share".to_string())),
        };

        let share = Share {
            uuid: uuid::Uuid::new_v4().to_string(),
            name,
            share_type,
            user_uuid: operator.to_string(),
            space_uuid: matters[0].space_uuid.clone(),
            code: generate_code(self.config.code_length),
            expiry,
            download_times: 0,
            create_time: created,
            update_time: created,
        };

        let mut tx = self.db.begin().await?;
        ShareRepository::insert(&mut tx, &share).await?;
        let mut bridges = Vec::with_capacity(matters.len());
        for matter in &matters {
            bridges.push(BridgeRepository::insert(&mut tx, &share.uuid, &matter.uuid).await?);
        }
        tx.commit().await?;

        info!(
            share = %share.uuid,
            owner = %operator,
            matters = bridges.len(),
            "share created"
        );
        Ok((share, bridges))
    }

    /// Delete a share and its bridges. The shared matters are untouched.
    ///
    /// Returns false if the share did not exist.
    pub async fn delete(&self, share_uuid: &str, operator: &str) -> Result<bool> {
        let Some(share) = ShareRepository::new(self.db.pool())
            .find_by_uuid(share_uuid)
            .await?
        else {
            return Ok(false);
        };
        if share.user_uuid != operator {
            return Err(MatterError::Unauthorized(format!(
                "share {share_uuid} does not belong to {operator}"
            )));
        }

        let mut tx = self.db.begin().await?;
        let bridges = BridgeRepository::delete_by_share(&mut tx, share_uuid).await?;
        ShareRepository::delete(&mut tx, share_uuid).await?;
        tx.commit().await?;

        debug!(share = %share_uuid, bridges, "share deleted");
        Ok(true)
    }

    /// Delete several shares at once.
    ///
    /// Every share must exist and belong to `operator`; otherwise nothing
    /// is deleted.
    pub async fn delete_batch(&self, share_uuids: &[String], operator: &str) -> Result<usize> {
        if share_uuids.is_empty() {
            return Err(MatterError::BadRequest("no shares given".to_string()));
        }

        let repo = ShareRepository::new(self.db.pool());
        for uuid in share_uuids {
            let share = repo.check_by_uuid(uuid).await?;
            if share.user_uuid != operator {
                return Err(MatterError::Unauthorized(format!(
                    "share {uuid} does not belong to {operator}"
                )));
            }
        }

        let mut tx = self.db.begin().await?;
        let mut deleted = 0;
        for uuid in share_uuids {
            BridgeRepository::delete_by_share(&mut tx, uuid).await?;
            if ShareRepository::delete(&mut tx, uuid).await? {
                deleted += 1;
            }
        }
        tx.commit().await?;

        Ok(deleted)
    }

    /// A share as seen by its owner.
    pub async fn detail(&self, share_uuid: &str, operator: &str) -> Result<Share> {
        let share = ShareRepository::new(self.db.pool())
            .check_by_uuid(share_uuid)
            .await?;
        if share.user_uuid != operator {
            return Err(MatterError::Unauthorized(format!(
                "share {share_uuid} does not belong to {operator}"
            )));
        }
        Ok(share)
    }

    /// An owner's shares, newest first.
    pub async fn page(&self, operator: &str, page: i64, page_size: i64) -> Result<Pager<Share>> {
        let (total, shares) = ShareRepository::new(self.db.pool())
            .page_by_owner(operator, page, page_size)
            .await?;
        Ok(Pager::new(page, page_size, total, shares))
    }

    /// The matters a share bridges, directories first.
    pub async fn bridged_matters(&self, share_uuid: &str) -> Result<Vec<Matter>> {
        let uuids: Vec<String> = BridgeRepository::new(self.db.pool())
            .list_by_share(share_uuid)
            .await?
            .into_iter()
            .map(|b| b.matter_uuid)
            .collect();

        MatterRepository::new(self.db.pool())
            .find_by_uuids(
                &uuids,
                &[OrderPair::desc(SortKey::Dir), OrderPair::asc(SortKey::Sort)],
            )
            .await
    }

    /// Load a share and check the presented credentials.
    ///
    /// The owner needs no code. Anyone else must present the right code
    /// for a share that has not expired.
    pub async fn check_share(&self, access: ShareAccess<'_>) -> Result<Share> {
        let share = ShareRepository::new(self.db.pool())
            .check_by_uuid(access.share_uuid)
            .await?;

        if access.operator == Some(share.user_uuid.as_str()) {
            return Ok(share);
        }
        if share.code != access.code {
            return Err(MatterError::Unauthorized("share code is wrong".to_string()));
        }
        if share.expiry.is_expired(&now()) {
            return Err(MatterError::BadRequest("share has expired".to_string()));
        }
        Ok(share)
    }

    /// Check that `matter` may be reached through a share via `root_uuid`.
    ///
    /// The root must be bridged by the share and must be `matter` itself or
    /// one of its ancestors. Returns the share and the ancestor chain of
    /// `matter` cut at the root.
    pub async fn validate_matter(
        &self,
        access: ShareAccess<'_>,
        root_uuid: &str,
        matter: &Matter,
    ) -> Result<(Share, MatterNode)> {
        let share = self.check_share(access).await?;

        let bridged = BridgeRepository::new(self.db.pool())
            .find_by_share_and_matter(&share.uuid, root_uuid)
            .await?;
        if bridged.is_none() {
            return Err(MatterError::BadRequest(format!(
                "{root_uuid} is not shared by {}",
                share.uuid
            )));
        }

        let chain = MatterRepository::new(self.db.pool())
            .ancestor_chain(&matter.uuid)
            .await?;
        let node = clamp(chain, root_uuid)?;
        Ok((share, node))
    }

    /// Browse a share.
    ///
    /// Without a target (or with the root sentinel) this lists the bridged
    /// matters. With a target directory it returns the directory's ancestor
    /// chain clamped at `root_uuid`.
    pub async fn browse(
        &self,
        access: ShareAccess<'_>,
        target: Option<&str>,
        root_uuid: Option<&str>,
    ) -> Result<ShareView> {
        let target = match target {
            None => None,
            Some(t) if t == MATTER_ROOT => None,
            Some(t) => Some(t),
        };

        let Some(target) = target else {
            let share = self.check_share(access).await?;
            let matters = self.bridged_matters(&share.uuid).await?;
            return Ok(ShareView {
                share,
                matters,
                dir_matter: None,
            });
        };

        let root_uuid = root_uuid
            .filter(|r| !r.is_empty())
            .ok_or_else(|| MatterError::BadRequest("share root is required".to_string()))?;

        let repo = MatterRepository::new(self.db.pool());
        let dir = repo.check_by_uuid(target).await?;
        if !dir.dir {
            return Err(MatterError::BadRequest(format!("{target} is not a directory")));
        }
        let root = repo.check_by_uuid(root_uuid).await?;
        if !root.dir {
            return Err(MatterError::BadRequest(format!(
                "{root_uuid} is not a directory"
            )));
        }

        let (share, node) = self.validate_matter(access, root_uuid, &dir).await?;
        Ok(ShareView {
            share,
            matters: Vec::new(),
            dir_matter: Some(node),
        })
    }

    /// List a directory inside a share.
    ///
    /// Owner and label predicates in `query` are ignored; the listing is
    /// scoped to the directory and the share's space.
    #[allow(clippy::too_many_arguments)]
    pub async fn matter_page(
        &self,
        access: ShareAccess<'_>,
        root_uuid: &str,
        puuid: &str,
        query: MatterQuery,
        page: i64,
        page_size: i64,
        order: &[OrderPair],
    ) -> Result<Pager<Matter>> {
        let repo = MatterRepository::new(self.db.pool());
        let dir = repo.check_by_uuid(puuid).await?;
        if !dir.dir {
            return Err(MatterError::BadRequest(format!("{puuid} is not a directory")));
        }

        let (share, _) = self.validate_matter(access, root_uuid, &dir).await?;

        let query = MatterQuery {
            puuid: Some(dir.uuid.clone()),
            space_uuid: Some(share.space_uuid.clone()),
            user_uuid: None,
            labels: None,
            ..query
        };
        let (total, matters) = repo
            .plain_page(&query, None, page, page_size, order)
            .await?;
        Ok(Pager::new(page, page_size, total, matters))
    }
}
