//! Node identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifies one action in a pipeline graph as `<stage>.<action>`.
///
/// Ids are derived from names rather than generated, so composing the same
/// input twice yields the same ids.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[display("{_0}")]
pub struct NodeId(String);

impl NodeId {
    pub fn new(stage: &str, action: &str) -> Self {
        Self(format!("{stage}.{action}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The pipeline stage portion of the id.
    pub fn stage(&self) -> &str {
        self.0.split_once('.').map(|(s, _)| s).unwrap_or(&self.0)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}
