//! Filtered listing and paging tests.

mod common;

use std::collections::HashSet;

use common::{setup_store, setup_store_with, OWNER, SPACE};
use matterstore::config::ListingConfig;
use matterstore::label::SqliteSubmissions;
use matterstore::{
    Config, LabelFilter, LabelRepository, MatterQuery, OrderPair, SortKey, TriState,
};

/// Paging through M rows with page size N takes ceil(M/N) pages whose
/// sizes add up to M, with no row seen twice.
#[tokio::test]
async fn test_pages_partition_the_result() {
    let ts = setup_store().await;
    let root = ts.root();
    for i in 0..23 {
        ts.touch(&root, &format!("f{i:02}.txt"), i).await;
    }

    let query = MatterQuery::new().user(OWNER).puuid(root.uuid.clone());
    let order = [OrderPair::asc(SortKey::Name)];
    let page_size = 5;

    let first = ts
        .store
        .matters()
        .pager(&query, 0, page_size, &order)
        .await
        .unwrap();
    assert_eq!(first.total_items, 23);
    assert_eq!(first.total_pages, 5);

    let mut seen = HashSet::new();
    let mut sum = 0;
    for page in 0..first.total_pages {
        let pager = ts
            .store
            .matters()
            .pager(&query, page, page_size, &order)
            .await
            .unwrap();
        assert_eq!(pager.total_items, 23);
        sum += pager.data.len();
        for m in pager.data {
            assert!(seen.insert(m.uuid));
        }
    }
    assert_eq!(sum, 23);

    let past_end = ts
        .store
        .matters()
        .pager(&query, 9, page_size, &order)
        .await
        .unwrap();
    assert!(past_end.data.is_empty());
    assert_eq!(past_end.total_items, 23);
}

/// The default order lists directories before files, newest first.
#[tokio::test]
async fn test_default_order_directories_first() {
    let ts = setup_store().await;
    let root = ts.root();
    let f1 = ts.touch(&root, "a.txt", 1).await;
    let d1 = ts.mkdir(&root, "d1").await;
    let f2 = ts.touch(&root, "b.txt", 1).await;
    let d2 = ts.mkdir(&root, "d2").await;

    let (_, rows) = ts
        .store
        .matters()
        .page(&MatterQuery::new().puuid("root").space(SPACE), 0, 10, &[])
        .await
        .unwrap();
    let names: Vec<&str> = rows.iter().map(|m| m.uuid.as_str()).collect();
    assert_eq!(names, vec![&d2.uuid[..], &d1.uuid[..], &f2.uuid[..], &f1.uuid[..]]);
}

/// A zero page size falls back to the configured default.
#[tokio::test]
async fn test_zero_page_size_uses_default() {
    let mut config = Config::default();
    config.listing = ListingConfig {
        default_page_size: 2,
        batch_page_size: 3,
    };
    let ts = setup_store_with(config).await;
    let root = ts.root();
    for i in 0..5 {
        ts.touch(&root, &format!("f{i}"), 1).await;
    }

    let pager = ts
        .store
        .matters()
        .pager(&MatterQuery::new().user(OWNER), 0, 0, &[])
        .await
        .unwrap();
    assert_eq!(pager.page_size, 2);
    assert_eq!(pager.data.len(), 2);
    assert_eq!(pager.total_pages, 3);

    let err = ts
        .store
        .matters()
        .page(&MatterQuery::new(), -1, 10, &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), matterstore::ErrorKind::BadRequest);
}

/// Batch iteration visits every matching row exactly once.
#[tokio::test]
async fn test_page_handle_visits_every_row() {
    let mut config = Config::default();
    config.listing.batch_page_size = 4;
    let ts = setup_store_with(config).await;
    let root = ts.root();
    let docs = ts.mkdir(&root, "docs").await;
    for i in 0..10 {
        ts.touch(&docs, &format!("f{i}"), 1).await;
    }

    let mut seen = HashSet::new();
    let handled = ts
        .store
        .matters()
        .page_handle(
            &MatterQuery::new().puuid(docs.uuid.clone()),
            &[],
            |m| {
                seen.insert(m.uuid.clone());
                Ok(())
            },
        )
        .await
        .unwrap();
    assert_eq!(handled, 10);
    assert_eq!(seen.len(), 10);
}

/// Name, type and extension predicates combine.
#[tokio::test]
async fn test_name_dir_and_extension_filters() {
    let ts = setup_store().await;
    let root = ts.root();
    ts.touch(&root, "photo.JPG", 1).await;
    ts.touch(&root, "scan.png", 1).await;
    ts.touch(&root, "notes.txt", 1).await;
    ts.mkdir(&root, "photos").await;
    ts.touch(&root, "100%_done.txt", 1).await;

    let matters = ts.store.matters();

    let (total, _) = matters
        .page(&MatterQuery::new().user(OWNER).name_like("photo"), 0, 10, &[])
        .await
        .unwrap();
    assert_eq!(total, 2);

    let (total, rows) = matters
        .page(
            &MatterQuery::new()
                .user(OWNER)
                .name_like("photo")
                .dir(TriState::No),
            0,
            10,
            &[],
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].name, "photo.JPG");

    let (total, _) = matters
        .page(
            &MatterQuery::new().user(OWNER).extensions(["jpg", ".png"]),
            0,
            10,
            &[],
        )
        .await
        .unwrap();
    assert_eq!(total, 2);

    let (total, rows) = matters
        .page(&MatterQuery::new().user(OWNER).name_like("%"), 0, 10, &[])
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].name, "100%_done.txt");
}

/// A superset label filter admits only matters carrying every label, and
/// keeps the other predicates in force.
#[tokio::test]
async fn test_superset_label_filter() {
    let ts = setup_store().await;
    let root = ts.root();
    let both = ts.touch(&root, "both.txt", 1).await;
    let partial = ts.touch(&root, "partial.txt", 1).await;
    let both_dir = ts.mkdir(&root, "both-dir").await;

    let labels = LabelRepository::new(ts.store.db().pool());
    for name in ["red", "blue", "green"] {
        labels.create_label(name, "color").await.unwrap();
    }
    labels.add_label("red", &both.uuid, 1).await.unwrap();
    labels.add_label("blue", &both.uuid, 1).await.unwrap();
    labels.add_label("red", &partial.uuid, 1).await.unwrap();
    labels.add_label("green", &partial.uuid, 1).await.unwrap();
    labels.add_label("red", &both_dir.uuid, 1).await.unwrap();
    labels.add_label("blue", &both_dir.uuid, 1).await.unwrap();

    let filter = LabelFilter::Superset(vec!["red".to_string(), "blue".to_string()]);
    let (total, rows) = ts
        .store
        .matters()
        .page(
            &MatterQuery::new().user(OWNER).labels(filter.clone()),
            0,
            10,
            &[],
        )
        .await
        .unwrap();
    assert_eq!(total, 2);
    let uuids: HashSet<_> = rows.into_iter().map(|m| m.uuid).collect();
    assert!(uuids.contains(&both.uuid));
    assert!(!uuids.contains(&partial.uuid));

    let (total, rows) = ts
        .store
        .matters()
        .page(
            &MatterQuery::new()
                .user(OWNER)
                .dir(TriState::No)
                .labels(filter),
            0,
            10,
            &[],
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].uuid, both.uuid);

    let nobody = LabelFilter::Superset(vec!["red".to_string(), "missing".to_string()]);
    let (total, rows) = ts
        .store
        .matters()
        .page(&MatterQuery::new().labels(nobody), 0, 10, &[])
        .await
        .unwrap();
    assert_eq!(total, 0);
    assert!(rows.is_empty());
}

/// Rows tying on the requested order are paged in identifier order.
#[tokio::test]
async fn test_paging_over_duplicate_names_is_stable() {
    let ts = setup_store().await;
    let root = ts.root();
    let mut expected = Vec::new();
    for i in 0..4 {
        let dir = ts.mkdir(&root, &format!("d{i}")).await;
        expected.push(ts.touch(&dir, "same.txt", 1).await.uuid);
    }
    expected.sort();

    let query = MatterQuery::new().user(OWNER).dir(TriState::No);
    let order = [OrderPair::asc(SortKey::Name)];
    let mut paged = Vec::new();
    for page in 0..4 {
        let (total, rows) = ts
            .store
            .matters()
            .page(&query, page, 1, &order)
            .await
            .unwrap();
        assert_eq!(total, 4);
        paged.extend(rows.into_iter().map(|m| m.uuid));
    }
    assert_eq!(paged, expected);
}

/// Label filters resolving to tens of thousands of identifiers still list.
#[tokio::test]
async fn test_label_filter_with_huge_allow_set() {
    let ts = setup_store().await;
    let root = ts.root();
    let hit = ts.touch(&root, "hit.txt", 1).await;
    let miss = ts.touch(&root, "miss.txt", 1).await;

    let pool = ts.store.db().pool();
    let labels = LabelRepository::new(pool);
    labels.create_label("red", "color").await.unwrap();
    labels.add_label("red", &hit.uuid, 1).await.unwrap();
    sqlx::query(
        "INSERT INTO labeled (uuid, name, target, value, create_time)
         WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 40000)
         SELECT 'bulk-' || i, 'red', 'gone-' || i, 0, '2026-01-01T00:00:00.000Z' FROM n",
    )
    .execute(pool)
    .await
    .unwrap();

    let filter = LabelFilter::Superset(vec!["red".to_string()]);
    let (total, rows) = ts
        .store
        .matters()
        .page(&MatterQuery::new().user(OWNER).labels(filter), 0, 10, &[])
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].uuid, hit.uuid);
    assert_ne!(rows[0].uuid, miss.uuid);
}

/// Reviewer and unit policies draw their allow-sets from submissions.
#[tokio::test]
async fn test_reviewer_and_unit_policies() {
    let ts = setup_store().await;
    let root = ts.root();
    let a = ts.touch(&root, "a.txt", 1).await;
    let b = ts.touch(&root, "b.txt", 1).await;
    ts.touch(&root, "c.txt", 1).await;

    let subs = SqliteSubmissions::new(ts.store.db().pool().clone());
    subs.upsert_profile("admin", "X00", "physics").await.unwrap();
    subs.upsert_profile("member", "P01", "physics").await.unwrap();
    subs.record_submission(&a.uuid, "P01", true).await.unwrap();
    subs.record_submission(&b.uuid, "H01", false).await.unwrap();

    let matters = ts.store.matters();

    let (total, rows) = matters
        .page(&MatterQuery::new().labels(LabelFilter::Reviewer), 0, 10, &[])
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].uuid, a.uuid);

    let unit = LabelFilter::UnitAdmin {
        user_uuid: "admin".to_string(),
    };
    let (total, rows) = matters
        .page(&MatterQuery::new().labels(unit), 0, 10, &[])
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].uuid, a.uuid);

    let stranger = LabelFilter::UnitAdmin {
        user_uuid: "stranger".to_string(),
    };
    let (total, _) = matters
        .page(&MatterQuery::new().labels(stranger), 0, 10, &[])
        .await
        .unwrap();
    assert_eq!(total, 0);
}

/// Deleting a matter drops its label assignments.
#[tokio::test]
async fn test_delete_drops_labels() {
    let ts = setup_store().await;
    let root = ts.root();
    let a = ts.touch(&root, "a.txt", 1).await;

    let labels = LabelRepository::new(ts.store.db().pool());
    labels.create_label("red", "color").await.unwrap();
    labels.add_label("red", &a.uuid, 1).await.unwrap();

    ts.store.matters().delete(&a).await.unwrap();
    assert!(labels.matter_labels(&a.uuid).await.unwrap().is_empty());
}
