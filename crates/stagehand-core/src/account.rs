//! Account context for resource pattern materialization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Values substituted into resource patterns besides the stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountContext {
    pub account_id: String,
    pub region: String,
    /// Name of the stack that owns the pipeline and its build role.
    pub stack_name: String,
    /// Resource-name prefix of the service being deployed.
    pub service_prefix: String,
    /// Name of the build role, for self-introspection.
    pub role_name: String,
    /// Additional named values (e.g. `zone`, `artifact_bucket`).
    pub extras: BTreeMap<String, String>,
}

impl AccountContext {
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Resolve a placeholder name. Empty values count as missing.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        let value = match name {
            "account" => self.account_id.as_str(),
            "region" => self.region.as_str(),
            "stack" => self.stack_name.as_str(),
            "prefix" => self.service_prefix.as_str(),
            "role" => self.role_name.as_str(),
            other => self.extras.get(other).map(|s| s.as_str())?,
        };
        if value.is_empty() { None } else { Some(value) }
    }
}
