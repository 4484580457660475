//! References to secrets held outside the synthesized output.

use serde::{Deserialize, Serialize};

/// Where a secret lives. The value itself never enters the IR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    /// Path in the secret store.
    pub path: String,
    /// Field to read when the secret is a JSON map.
    pub json_field: Option<String>,
}

impl SecretRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            json_field: None,
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.json_field = Some(field.into());
        self
    }
}
