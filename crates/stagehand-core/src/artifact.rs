//! Pipeline-carried artifacts.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::NodeId;

/// Opaque reference to an artifact carried between pipeline nodes.
///
/// The handle names its producer, so every consumer binds back to exactly one
/// upstream node and the name never changes mid-flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{name}")]
pub struct ArtifactHandle {
    name: String,
    producer: NodeId,
}

impl ArtifactHandle {
    pub fn new(name: impl Into<String>, producer: NodeId) -> Self {
        Self {
            name: name.into(),
            producer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn producer(&self) -> &NodeId {
        &self.producer
    }
}
