//! Sharing: bounded, expiring views onto an owner's subtrees.

mod browse;
mod repository;
mod service;
mod types;

pub use browse::{clamp, MatterNode};
pub use repository::{BridgeRepository, ShareRepository};
pub use service::{generate_code, ShareAccess, ShareService};
pub use types::{Bridge, ExpiryPolicy, Share, ShareType, ShareView};
