//! Matter service.
//!
//! Coordinates the repository, the label policies, physical storage and
//! the image cache. Row changes that belong together commit in one
//! transaction; disk changes follow the commit and never fail the call.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::image_cache::{ImageCache, SqliteImageCache};
use super::quota::QuotaAccountant;
use super::repository::MatterRepository;
use super::types::{Matter, MatterQuery, NewMatter, OrderPair, Pager, Scope, SortKey, TriState};
use crate::config::ListingConfig;
use crate::db::{now, Database};
use crate::label::{LabelResolver, ProfileDirectory, SqliteSubmissions, SubmissionTracker};
use crate::storage::MatterStorage;
use crate::{MatterError, Result};

/// Longest accepted matter name, in characters.
pub const MATTER_NAME_MAX_LENGTH: usize = 200;

const FORBIDDEN_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Check that a name can be used for a matter.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(MatterError::BadRequest("name is empty".to_string()));
    }
    if name == "." || name == ".." {
        return Err(MatterError::BadRequest(format!("{name} is not a valid name")));
    }
    if name.chars().count() > MATTER_NAME_MAX_LENGTH {
        return Err(MatterError::BadRequest(format!(
            "name exceeds {MATTER_NAME_MAX_LENGTH} characters"
        )));
    }
    if name.contains(FORBIDDEN_NAME_CHARS) {
        return Err(MatterError::BadRequest(format!(
            "name {name} contains a forbidden character"
        )));
    }
    Ok(())
}

/// Service for matter tree operations.
#[derive(Clone)]
pub struct MatterService {
    db: Database,
    storage: MatterStorage,
    image_cache: Arc<dyn ImageCache>,
    submissions: Arc<dyn SubmissionTracker>,
    profiles: Arc<dyn ProfileDirectory>,
    listing: ListingConfig,
}

impl MatterService {
    /// Create a service using the SQLite-backed collaborators.
    pub fn new(db: Database, storage: MatterStorage) -> Self {
        let submissions = Arc::new(SqliteSubmissions::new(db.pool().clone()));
        Self {
            image_cache: Arc::new(SqliteImageCache::new(db.pool().clone())),
            submissions: submissions.clone(),
            profiles: submissions,
            listing: ListingConfig::default(),
            db,
            storage,
        }
    }

    pub fn with_image_cache(mut self, image_cache: Arc<dyn ImageCache>) -> Self {
        self.image_cache = image_cache;
        self
    }

    pub fn with_submissions(mut self, submissions: Arc<dyn SubmissionTracker>) -> Self {
        self.submissions = submissions;
        self
    }

    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileDirectory>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_listing(mut self, listing: ListingConfig) -> Self {
        self.listing = listing;
        self
    }

    /// Get the database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Get the physical storage.
    pub fn storage(&self) -> &MatterStorage {
        &self.storage
    }

    /// Row-level access to matters.
    pub fn repository(&self) -> MatterRepository<'_> {
        MatterRepository::new(self.db.pool())
    }

    /// Size aggregation over matters.
    pub fn quota(&self) -> QuotaAccountant<'_> {
        QuotaAccountant::new(self.db.pool())
    }

    /// Create a matter under an existing directory or the space root.
    ///
    /// The path is derived from the parent, and the name must be free
    /// among the parent's children.
    pub async fn create(&self, new: NewMatter) -> Result<Matter> {
        validate_name(&new.name)?;
        let repo = self.repository();

        let parent = repo
            .check_with_root(&new.puuid, &new.space_uuid, &new.user_uuid)
            .await?;
        if !parent.dir {
            return Err(MatterError::BadRequest(format!(
                "{} is not a directory",
                parent.uuid
            )));
        }
        if parent.space_uuid != new.space_uuid {
            return Err(MatterError::BadRequest(
                "parent belongs to another space".to_string(),
            ));
        }

        let clash = repo
            .count_by_parent_and_name(Scope::Space(&new.space_uuid), &new.puuid, TriState::Any, &new.name)
            .await?;
        if clash > 0 {
            return Err(MatterError::BadRequest(format!(
                "{} already exists",
                new.name
            )));
        }

        let new = NewMatter {
            path: format!("{}/{}", parent.path, new.name),
            ..new
        };
        let matter = repo.create(&new).await?;
        debug!(matter = %matter.uuid, path = %matter.path, "matter created");
        Ok(matter)
    }

    /// Write a matter's fields back, bumping its update time.
    pub async fn save(&self, matter: &Matter) -> Result<Matter> {
        self.repository().save(matter).await
    }

    /// Hard-delete a matter and, for directories, everything below it.
    ///
    /// Rows are removed children first inside one transaction together
    /// with their bridges and label assignments. After the commit the
    /// image cache is cleared and backing files and now-empty directories
    /// are removed best-effort. A failing image cache is reported only
    /// after the disk cleanup ran. Deleting a matter that is already gone
    /// returns 0.
    pub async fn delete(&self, matter: &Matter) -> Result<u64> {
        if matter.is_root() {
            return Err(MatterError::BadRequest(
                "the space root cannot be deleted".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        let Some(current) = MatterRepository::find_in(&mut tx, &matter.uuid).await? else {
            tx.commit().await?;
            debug!(matter = %matter.uuid, "delete skipped, matter already gone");
            return Ok(0);
        };

        let mut post_order: Vec<Matter> = Vec::new();
        let mut expanded: HashSet<String> = HashSet::new();
        let mut stack: Vec<(Matter, bool)> = vec![(current, false)];
        while let Some((node, visited)) = stack.pop() {
            if visited || !node.dir {
                post_order.push(node);
                continue;
            }
            if !expanded.insert(node.uuid.clone()) {
                continue;
            }
            let children = MatterRepository::children_in(&mut tx, &node.uuid).await?;
            stack.push((node, true));
            stack.extend(children.into_iter().map(|c| (c, false)));
        }

        let uuids: Vec<String> = post_order.iter().map(|m| m.uuid.clone()).collect();
        let deleted = MatterRepository::delete_rows(&mut tx, &uuids).await?;
        tx.commit().await?;

        let files: Vec<String> = post_order
            .iter()
            .filter(|m| !m.dir)
            .map(|m| m.uuid.clone())
            .collect();
        let cached = self.image_cache.delete_by_matters(&files).await;

        // Rows are gone, so the blobs must go whatever the cache said.
        for node in &post_order {
            if node.dir {
                self.storage.remove_dir(node);
            } else {
                self.storage.unlink(node);
            }
        }

        if let Err(e) = cached {
            warn!(matter = %matter.uuid, error = %e, "image cache cleanup failed");
            return Err(e);
        }

        info!(
            matter = %matter.uuid,
            path = %matter.path,
            rows = deleted,
            "matter deleted"
        );
        Ok(deleted)
    }

    /// Move a matter to the trash. Children are left as they are.
    pub async fn soft_delete(&self, matter: &Matter) -> Result<Matter> {
        if matter.is_root() {
            return Err(MatterError::BadRequest(
                "the space root cannot be deleted".to_string(),
            ));
        }
        let delete_time = now();
        self.repository()
            .set_deleted(&matter.uuid, true, Some(delete_time))
            .await?;

        let mut trashed = matter.clone();
        trashed.deleted = true;
        trashed.delete_time = Some(delete_time);
        Ok(trashed)
    }

    /// Take a matter back out of the trash. Children are left as they are.
    pub async fn recovery(&self, matter: &Matter) -> Result<Matter> {
        if matter.is_root() {
            return Err(MatterError::BadRequest(
                "the space root cannot be recovered".to_string(),
            ));
        }
        self.repository()
            .set_deleted(&matter.uuid, false, None)
            .await?;

        let mut recovered = matter.clone();
        recovered.deleted = false;
        recovered.delete_time = None;
        Ok(recovered)
    }

    /// Move a matter under `new_parent`, optionally renaming it.
    ///
    /// The materialized paths of the matter and all its descendants are
    /// rewritten in the same transaction as the parent change. The backing
    /// entry is moved on disk afterwards.
    pub async fn relocate(
        &self,
        matter: &Matter,
        new_parent: &Matter,
        new_name: Option<&str>,
    ) -> Result<Matter> {
        if matter.is_root() {
            return Err(MatterError::BadRequest(
                "the space root cannot be moved".to_string(),
            ));
        }
        if !new_parent.dir {
            return Err(MatterError::BadRequest(format!(
                "{} is not a directory",
                new_parent.uuid
            )));
        }
        if new_parent.space_uuid != matter.space_uuid {
            return Err(MatterError::BadRequest(
                "cannot move a matter to another space".to_string(),
            ));
        }
        if !new_parent.is_root()
            && (new_parent.uuid == matter.uuid
                || new_parent.path.starts_with(&format!("{}/", matter.path)))
        {
            return Err(MatterError::BadRequest(
                "cannot move a directory into itself".to_string(),
            ));
        }

        let name = new_name.unwrap_or(&matter.name);
        validate_name(name)?;

        let repo = self.repository();
        let clash = repo
            .find_by_parent_and_name(
                Scope::Space(&matter.space_uuid),
                &new_parent.uuid,
                TriState::Any,
                name,
            )
            .await?;
        if clash.is_some_and(|c| c.uuid != matter.uuid) {
            return Err(MatterError::BadRequest(format!("{name} already exists")));
        }

        let old_path = matter.path.clone();
        let new_path = format!("{}/{}", new_parent.path, name);

        let mut tx = self.db.begin().await?;
        MatterRepository::move_in(&mut tx, &matter.uuid, &new_parent.uuid, name).await?;
        let rewritten =
            MatterRepository::rewrite_paths(&mut tx, &matter.space_uuid, &old_path, &new_path)
                .await?;
        tx.commit().await?;

        if old_path != new_path {
            self.storage
                .relocate(&matter.space_uuid, &old_path, &new_path);
        }
        debug!(matter = %matter.uuid, from = %old_path, to = %new_path, rewritten, "matter relocated");

        repo.check_by_uuid(&matter.uuid).await
    }

    /// Rename a matter in place.
    pub async fn rename(&self, matter: &Matter, name: &str) -> Result<Matter> {
        let parent = self
            .repository()
            .check_with_root(&matter.puuid, &matter.space_uuid, &matter.user_uuid)
            .await?;
        self.relocate(matter, &parent, Some(name)).await
    }

    /// One page of matters matching `query`, with the total match count.
    ///
    /// A label policy on the query is resolved first; when it admits no
    /// matter at all the listing returns `(0, [])` without querying rows.
    pub async fn page(
        &self,
        query: &MatterQuery,
        page: i64,
        page_size: i64,
        order: &[OrderPair],
    ) -> Result<(i64, Vec<Matter>)> {
        let allow = match query.labels {
            Some(ref filter) => {
                let resolver =
                    LabelResolver::new(self.db.pool(), &*self.submissions, &*self.profiles);
                resolver.resolve(filter).await?
            }
            None => None,
        };
        if allow.as_ref().is_some_and(|a| a.is_empty()) {
            debug!("label policy admits nothing, listing is empty");
            return Ok((0, Vec::new()));
        }

        self.repository()
            .plain_page(query, allow.as_deref(), page, page_size, order)
            .await
    }

    /// Like [`page`](Self::page), wrapped with paging totals. A page size
    /// of zero uses the configured default.
    pub async fn pager(
        &self,
        query: &MatterQuery,
        page: i64,
        page_size: i64,
        order: &[OrderPair],
    ) -> Result<Pager<Matter>> {
        let page_size = if page_size == 0 {
            self.listing.default_page_size
        } else {
            page_size
        };
        let (total, data) = self.page(query, page, page_size, order).await?;
        Ok(Pager::new(page, page_size, total, data))
    }

    /// Call `handle` for every matter matching `query`, one fixed-size page
    /// at a time.
    ///
    /// The page count is taken from the first page; rows inserted or removed
    /// while iterating may be missed or seen twice. Without an explicit
    /// order rows are visited by identifier. Returns the number of rows
    /// handled.
    pub async fn page_handle<F>(
        &self,
        query: &MatterQuery,
        order: &[OrderPair],
        mut handle: F,
    ) -> Result<u64>
    where
        F: FnMut(&Matter) -> Result<()>,
    {
        let default_order = [OrderPair::asc(SortKey::Uuid)];
        let order = if order.is_empty() { &default_order[..] } else { order };
        let page_size = self.listing.batch_page_size;

        let (total, first) = self.page(query, 0, page_size, order).await?;
        let total_pages = Pager::<Matter>::new(0, page_size, total, Vec::new()).total_pages;

        let mut handled = 0;
        for matter in &first {
            handle(matter)?;
            handled += 1;
        }
        for page in 1..total_pages {
            let (_, rows) = self.page(query, page, page_size, order).await?;
            for matter in &rows {
                handle(matter)?;
                handled += 1;
            }
        }
        Ok(handled)
    }

    /// Hard-delete every trashed matter put in the trash before `cutoff`.
    ///
    /// Returns the number of rows removed, descendants included.
    pub async fn purge_trash(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let query = MatterQuery::new()
            .deleted(TriState::Yes)
            .delete_time_before(cutoff);
        let order = [OrderPair::asc(SortKey::Uuid)];

        let mut removed = 0;
        loop {
            let (_, rows) = self
                .page(&query, 0, self.listing.batch_page_size, &order)
                .await?;
            if rows.is_empty() {
                break;
            }
            for matter in &rows {
                removed += self.delete(matter).await?;
            }
        }

        info!(%cutoff, removed, "trash purged");
        Ok(removed)
    }

    /// Remove every matter row an owner has, e.g. when the account goes away.
    ///
    /// Bridges, label assignments and image cache entries go with them.
    /// Disk contents are left for a sweep.
    pub async fn delete_by_owner(&self, user_uuid: &str) -> Result<u64> {
        let uuids = self.repository().uuids_by_owner(user_uuid).await?;
        if uuids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.begin().await?;
        let deleted = MatterRepository::delete_rows(&mut tx, &uuids).await?;
        tx.commit().await?;

        self.image_cache.delete_by_matters(&uuids).await?;
        info!(user = %user_uuid, rows = deleted, "owner matters deleted");
        Ok(deleted)
    }

    /// The virtual root of a space.
    pub fn root(&self, space_uuid: &str, user_uuid: &str) -> Matter {
        Matter::root(space_uuid, user_uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{LabelFilter, LabelRepository};
    use std::sync::Mutex;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, MatterService) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().await.unwrap();
        let storage = MatterStorage::new(temp_dir.path()).unwrap();
        (temp_dir, MatterService::new(db, storage))
    }

    fn write_blob(service: &MatterService, matter: &Matter) {
        let path = service.storage().absolute_path(matter);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        if matter.dir {
            std::fs::create_dir_all(&path).unwrap();
        } else {
            std::fs::write(&path, b"x").unwrap();
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("report.pdf").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a?b").is_err());
        assert!(validate_name(&"x".repeat(MATTER_NAME_MAX_LENGTH + 1)).is_err());
    }

    #[tokio::test]
    async fn test_create_derives_path_and_rejects_clash() {
        let (_tmp, service) = setup().await;
        let root = service.root("space", "alice");

        let docs = service.create(NewMatter::directory(&root, "docs")).await.unwrap();
        let mut new = NewMatter::file(&docs, "a.txt", 3);
        new.path = "/bogus".into();
        let file = service.create(new).await.unwrap();
        assert_eq!(file.path, "/docs/a.txt");

        let result = service.create(NewMatter::file(&docs, "a.txt", 3)).await;
        assert!(matches!(result, Err(MatterError::BadRequest(_))));

        let result = service.create(NewMatter::file(&file, "child", 3)).await;
        assert!(matches!(result, Err(MatterError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_requires_existing_parent() {
        let (_tmp, service) = setup().await;
        let mut ghost = service.root("space", "alice");
        ghost.uuid = "ghost".into();

        let result = service.create(NewMatter::file(&ghost, "a", 1)).await;
        assert!(matches!(result, Err(MatterError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_file_removes_blob_and_links() {
        let (_tmp, service) = setup().await;
        let root = service.root("space", "alice");
        let file = service.create(NewMatter::file(&root, "a.txt", 1)).await.unwrap();
        write_blob(&service, &file);

        let labels = LabelRepository::new(service.db().pool());
        labels.create_label("red", "color").await.unwrap();
        labels.add_label("red", &file.uuid, 0).await.unwrap();
        let cache = SqliteImageCache::new(service.db().pool().clone());
        cache.insert(&file.uuid, "thumb", "/c", 1).await.unwrap();

        assert_eq!(service.delete(&file).await.unwrap(), 1);
        assert!(!service.storage().exists(&file));
        assert!(labels.matter_labels(&file.uuid).await.unwrap().is_empty());
        assert_eq!(cache.count_by_matter(&file.uuid).await.unwrap(), 0);
        assert_eq!(service.delete(&file).await.unwrap(), 0);
    }

    struct FailingCache;

    #[async_trait::async_trait]
    impl ImageCache for FailingCache {
        async fn delete_by_matters(&self, _: &[String]) -> Result<u64> {
            Err(MatterError::Database("cache down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_delete_cleans_disk_when_image_cache_fails() {
        let (_tmp, service) = setup().await;
        let service = service.with_image_cache(Arc::new(FailingCache));
        let root = service.root("space", "alice");
        let docs = service.create(NewMatter::directory(&root, "docs")).await.unwrap();
        let file = service.create(NewMatter::file(&docs, "a.txt", 1)).await.unwrap();
        write_blob(&service, &docs);
        write_blob(&service, &file);

        let result = service.delete(&docs).await;
        assert!(matches!(result, Err(MatterError::Database(_))));

        let repo = service.repository();
        assert!(repo.find_by_uuid(&file.uuid).await.unwrap().is_none());
        assert!(!service.storage().exists(&file));
        assert!(!service.storage().exists(&docs));
        assert_eq!(service.delete(&docs).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_survives_missing_blob() {
        let (_tmp, service) = setup().await;
        let root = service.root("space", "alice");
        let file = service.create(NewMatter::file(&root, "a.txt", 1)).await.unwrap();

        assert_eq!(service.delete(&file).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_root_is_rejected() {
        let (_tmp, service) = setup().await;
        let root = service.root("space", "alice");
        assert!(matches!(
            service.delete(&root).await,
            Err(MatterError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_soft_delete_does_not_cascade() {
        let (_tmp, service) = setup().await;
        let root = service.root("space", "alice");
        let dir = service.create(NewMatter::directory(&root, "d")).await.unwrap();
        let child = service.create(NewMatter::file(&dir, "c", 1)).await.unwrap();

        let trashed = service.soft_delete(&dir).await.unwrap();
        assert!(trashed.deleted);
        assert!(trashed.delete_time.is_some());

        let repo = service.repository();
        assert!(repo.check_by_uuid(&dir.uuid).await.unwrap().deleted);
        assert!(!repo.check_by_uuid(&child.uuid).await.unwrap().deleted);

        let recovered = service.recovery(&trashed).await.unwrap();
        assert_eq!(recovered, dir);
        assert_eq!(repo.check_by_uuid(&dir.uuid).await.unwrap(), dir);
    }

    #[tokio::test]
    async fn test_relocate_rewrites_descendant_paths() {
        let (_tmp, service) = setup().await;
        let root = service.root("space", "alice");
        let a = service.create(NewMatter::directory(&root, "a")).await.unwrap();
        let b = service.create(NewMatter::directory(&root, "b")).await.unwrap();
        let inner = service.create(NewMatter::directory(&a, "inner")).await.unwrap();
        let leaf = service.create(NewMatter::file(&inner, "leaf.txt", 1)).await.unwrap();
        write_blob(&service, &leaf);

        let moved = service.relocate(&a, &b, None).await.unwrap();
        assert_eq!(moved.path, "/b/a");
        assert_eq!(moved.puuid, b.uuid);

        let repo = service.repository();
        let leaf_now = repo.check_by_uuid(&leaf.uuid).await.unwrap();
        assert_eq!(leaf_now.path, "/b/a/inner/leaf.txt");
        assert!(service.storage().exists(&leaf_now));
        assert!(!service.storage().exists(&leaf));

        let renamed = service.rename(&leaf_now, "renamed.txt").await.unwrap();
        assert_eq!(renamed.path, "/b/a/inner/renamed.txt");
    }

    #[tokio::test]
    async fn test_relocate_rejects_cycles_and_clashes() {
        let (_tmp, service) = setup().await;
        let root = service.root("space", "alice");
        let a = service.create(NewMatter::directory(&root, "a")).await.unwrap();
        let inner = service.create(NewMatter::directory(&a, "inner")).await.unwrap();
        service.create(NewMatter::file(&root, "taken", 1)).await.unwrap();

        assert!(matches!(
            service.relocate(&a, &inner, None).await,
            Err(MatterError::BadRequest(_))
        ));
        assert!(matches!(
            service.relocate(&a, &a, None).await,
            Err(MatterError::BadRequest(_))
        ));
        assert!(matches!(
            service.rename(&a, "taken").await,
            Err(MatterError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_page_with_label_policy() {
        let (_tmp, service) = setup().await;
        let root = service.root("space", "alice");
        let a = service.create(NewMatter::file(&root, "a", 1)).await.unwrap();
        service.create(NewMatter::file(&root, "b", 1)).await.unwrap();

        let labels = LabelRepository::new(service.db().pool());
        labels.create_label("red", "color").await.unwrap();
        labels.create_label("blue", "color").await.unwrap();
        labels.add_label("red", &a.uuid, 0).await.unwrap();

        let query = MatterQuery::new()
            .user("alice")
            .labels(LabelFilter::Superset(vec!["red".into()]));
        let (count, rows) = service.page(&query, 0, 10, &[]).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(rows[0].uuid, a.uuid);

        let query = MatterQuery::new().labels(LabelFilter::Superset(vec!["blue".into()]));
        let (count, rows) = service.page(&query, 0, 10, &[]).await.unwrap();
        assert_eq!(count, 0);
        assert!(rows.is_empty());

        let query = MatterQuery::new()
            .user("bob")
            .labels(LabelFilter::Superset(vec!["red".into()]));
        let (count, _) = service.page(&query, 0, 10, &[]).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_pager_uses_default_page_size() {
        let (_tmp, service) = setup().await;
        let root = service.root("space", "alice");
        service.create(NewMatter::file(&root, "a", 1)).await.unwrap();

        let pager = service.pager(&MatterQuery::new(), 0, 0, &[]).await.unwrap();
        assert_eq!(pager.page_size, ListingConfig::default().default_page_size);
        assert_eq!(pager.total_items, 1);
        assert_eq!(pager.total_pages, 1);
    }

    #[tokio::test]
    async fn test_page_handle_visits_every_page() {
        let (_tmp, service) = setup().await;
        let service = service.with_listing(ListingConfig {
            default_page_size: 10,
            batch_page_size: 3,
        });
        let root = service.root("space", "alice");
        for i in 0..8 {
            service
                .create(NewMatter::file(&root, format!("f{i}"), 1))
                .await
                .unwrap();
        }

        let seen = Mutex::new(Vec::new());
        let handled = service
            .page_handle(&MatterQuery::new(), &[], |m| {
                seen.lock().unwrap().push(m.uuid.clone());
                Ok(())
            })
            .await
            .unwrap();

        let mut seen = seen.into_inner().unwrap();
        assert_eq!(handled, 8);
        let sorted = {
            let mut s = seen.clone();
            s.sort();
            s
        };
        assert_eq!(seen, sorted);
        seen.dedup();
        assert_eq!(seen.len(), 8);
    }

    #[tokio::test]
    async fn test_purge_trash_respects_cutoff() {
        let (_tmp, service) = setup().await;
        let service = service.with_listing(ListingConfig {
            default_page_size: 10,
            batch_page_size: 2,
        });
        let root = service.root("space", "alice");
        let dir = service.create(NewMatter::directory(&root, "d")).await.unwrap();
        service.create(NewMatter::file(&dir, "c", 1)).await.unwrap();
        let mut old = Vec::new();
        for i in 0..3 {
            let f = service
                .create(NewMatter::file(&root, format!("old{i}"), 1))
                .await
                .unwrap();
            old.push(service.soft_delete(&f).await.unwrap());
        }
        service.soft_delete(&dir).await.unwrap();
        let keep = service.create(NewMatter::file(&root, "recent", 1)).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let cutoff = now();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let fresh = service.soft_delete(&keep).await.unwrap();

        let removed = service.purge_trash(cutoff).await.unwrap();
        assert_eq!(removed, 5);

        let repo = service.repository();
        assert!(repo.find_by_uuid(&fresh.uuid).await.unwrap().is_some());
        assert_eq!(repo.count_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_owner() {
        let (_tmp, service) = setup().await;
        let alice = service.root("space", "alice");
        let bob = service.root("space-b", "bob");
        let dir = service.create(NewMatter::directory(&alice, "d")).await.unwrap();
        service.create(NewMatter::file(&dir, "c", 1)).await.unwrap();
        service.create(NewMatter::file(&bob, "b", 1)).await.unwrap();

        assert_eq!(service.delete_by_owner("alice").await.unwrap(), 2);
        assert_eq!(service.repository().count_all().await.unwrap(), 1);
        assert_eq!(service.delete_by_owner("alice").await.unwrap(), 0);
    }
}
