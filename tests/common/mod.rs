//! Common test utilities for integration tests.

#![allow(dead_code)]

use matterstore::{Config, Database, Matter, MatterStorage, MatterStore, NewMatter};
use tempfile::TempDir;

pub const SPACE: &str = "space-alice";
pub const OWNER: &str = "alice";

/// A store backed by an in-memory database and a temporary storage root.
///
/// The temp directory lives as long as this value.
pub struct TestStore {
    pub store: MatterStore,
    pub temp_dir: TempDir,
}

impl TestStore {
    /// The virtual root of the default test space.
    pub fn root(&self) -> Matter {
        self.store.matters().root(SPACE, OWNER)
    }

    /// Create a directory under `parent`.
    pub async fn mkdir(&self, parent: &Matter, name: &str) -> Matter {
        self.store
            .matters()
            .create(NewMatter::directory(parent, name))
            .await
            .expect("Failed to create directory")
    }

    /// Create a file row under `parent` and write its backing blob.
    pub async fn touch(&self, parent: &Matter, name: &str, size: i64) -> Matter {
        let matter = self
            .store
            .matters()
            .create(NewMatter::file(parent, name, size))
            .await
            .expect("Failed to create file");

        let blob = self.store.matters().storage().absolute_path(&matter);
        if let Some(dir) = blob.parent() {
            std::fs::create_dir_all(dir).expect("Failed to create blob directory");
        }
        std::fs::write(&blob, vec![0u8; size as usize]).expect("Failed to write blob");
        matter
    }

    /// Create the backing directory of a directory matter.
    pub fn materialize_dir(&self, dir: &Matter) {
        let path = self.store.matters().storage().absolute_path(dir);
        std::fs::create_dir_all(path).expect("Failed to create backing directory");
    }
}

/// Set up a store with default configuration.
pub async fn setup_store() -> TestStore {
    setup_store_with(Config::default()).await
}

/// Set up a store with the given configuration.
///
/// The database and storage paths in `config` are ignored.
pub async fn setup_store_with(config: Config) -> TestStore {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let storage =
        MatterStorage::new(temp_dir.path().join("matters")).expect("Failed to create storage");
    let store = MatterStore::with_parts(db, storage, &config);
    TestStore { store, temp_dir }
}

/// Set up a store on a file-backed database with a multi-connection pool.
pub async fn setup_file_store() -> TestStore {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = Config::default();
    config.database.path = temp_dir
        .path()
        .join("matter.db")
        .to_string_lossy()
        .into_owned();
    config.storage.matter_path = temp_dir
        .path()
        .join("matters")
        .to_string_lossy()
        .into_owned();
    let store = MatterStore::open(&config)
        .await
        .expect("Failed to open file-backed store");
    TestStore { store, temp_dir }
}
