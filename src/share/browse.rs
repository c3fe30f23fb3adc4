//! Ancestor-chain clamping for share browsing.

use serde::Serialize;

use crate::matter::{Matter, MATTER_ROOT};
use crate::{MatterError, Result};

/// A matter linked to its parent, up to a share root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatterNode {
    pub matter: Matter,
    pub parent: Option<Box<MatterNode>>,
}

impl MatterNode {
    /// The matters from this node up to the top, nearest first.
    pub fn chain(&self) -> Vec<&Matter> {
        let mut out = vec![&self.matter];
        let mut node = self.parent.as_deref();
        while let Some(n) = node {
            out.push(&n.matter);
            node = n.parent.as_deref();
        }
        out
    }

    /// The topmost matter in the chain.
    pub fn top(&self) -> &Matter {
        let mut node = self;
        while let Some(parent) = node.parent.as_deref() {
            node = parent;
        }
        &node.matter
    }
}

/// Cut an ancestor chain (target first) at `root_uuid`.
///
/// The returned node's chain ends at the root, whose parent is `None`.
/// The root's `puuid` becomes [`MATTER_ROOT`] and every path is rebased
/// so it starts at the root's name. Fails with BadRequest when the root
/// is not in the chain.
pub fn clamp(chain: Vec<Matter>, root_uuid: &str) -> Result<MatterNode> {
    let Some(index) = chain.iter().position(|m| m.uuid == root_uuid) else {
        return Err(MatterError::BadRequest(format!(
            "{root_uuid} is not the root of this share"
        )));
    };

    let root = &chain[index];
    let hidden = root
        .path
        .strip_suffix(root.name.as_str())
        .map(|p| p.trim_end_matches('/').len())
        .unwrap_or(0);

    let mut node: Option<MatterNode> = None;
    for mut matter in chain.into_iter().take(index + 1).rev() {
        if node.is_none() {
            matter.puuid = MATTER_ROOT.to_string();
        }
        matter.path = rebase(&matter.path, hidden);
        node = Some(MatterNode {
            matter,
            parent: node.map(Box::new),
        });
    }

    node.ok_or_else(|| MatterError::BadRequest("empty ancestor chain".to_string()))
}

fn rebase(path: &str, hidden: usize) -> String {
    match path.get(hidden..) {
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        Some(rest) => format!("/{rest}"),
        None => "/".to_string(),
    }
}
