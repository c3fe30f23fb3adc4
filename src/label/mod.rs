//! Label index and policy-filtered listing support.

mod policy;
mod repository;
mod submission;
mod types;

pub use policy::{LabelFilter, LabelResolver, ProfileDirectory, SubmissionTracker};
pub use repository::LabelRepository;
pub use submission::SqliteSubmissions;
pub use types::{Label, LabelWithValue, Labeled};
