//! Matterstore - hierarchical file metadata store
//!
//! Maps a virtual tree of files and directories onto on-disk blobs, with
//! trash and recovery, label-filtered listing, size aggregation and
//! bounded share views into subtrees.

pub mod config;
pub mod db;
pub mod error;
pub mod label;
pub mod logging;
pub mod matter;
pub mod share;
pub mod storage;
pub mod store;

pub use config::Config;
pub use db::Database;
pub use error::{ErrorKind, MatterError, Result};
pub use label::{LabelFilter, LabelRepository, ProfileDirectory, SubmissionTracker};
pub use matter::{
    Matter, MatterQuery, MatterRepository, MatterService, NewMatter, OrderPair, Pager,
    QuotaAccountant, Scope, SortKey, TriState, MATTER_ROOT,
};
pub use share::{ExpiryPolicy, Share, ShareAccess, ShareService, ShareType};
pub use storage::{Filesystem, LocalFilesystem, MatterStorage};
pub use store::MatterStore;
