//! Top-level handle wiring the services to one database and storage root.

use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::matter::MatterService;
use crate::share::ShareService;
use crate::storage::MatterStorage;
use crate::Result;

/// The matter store.
#[derive(Clone)]
pub struct MatterStore {
    db: Database,
    matters: MatterService,
    shares: ShareService,
}

impl MatterStore {
    /// Open the database and storage named in `config`.
    pub async fn open(config: &Config) -> Result<Self> {
        let db = Database::open(&config.database.path).await?;
        let storage = MatterStorage::new(&config.storage.matter_path)?;
        info!(
            database = %config.database.path,
            storage = %config.storage.matter_path,
            "matter store opened"
        );
        Ok(Self::with_parts(db, storage, config))
    }

    /// Assemble a store from an already opened database and storage.
    pub fn with_parts(db: Database, storage: MatterStorage, config: &Config) -> Self {
        let matters = MatterService::new(db.clone(), storage).with_listing(config.listing.clone());
        let shares = ShareService::new(db.clone(), config.share.clone());
        Self {
            db,
            matters,
            shares,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Tree operations.
    pub fn matters(&self) -> &MatterService {
        &self.matters
    }

    /// Share operations.
    pub fn shares(&self) -> &ShareService {
        &self.shares
    }
}
