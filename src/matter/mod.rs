//! Matter tree store.
//!
//! Matters are the files and directories of a space. Each one keeps both
//! a parent reference and a materialized path; the two are only ever
//! changed together.

mod image_cache;
mod quota;
mod repository;
mod service;
mod types;

pub use image_cache::{ImageCache, SqliteImageCache};
pub use quota::QuotaAccountant;
pub use repository::MatterRepository;
pub use service::{validate_name, MatterService, MATTER_NAME_MAX_LENGTH};
pub use types::{
    Direction, Matter, MatterQuery, NewMatter, OrderPair, Pager, Scope, SortKey, TriState,
    MATTER_ROOT,
};
