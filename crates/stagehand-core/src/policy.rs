//! Permission statements and identity profiles.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::Result;
use crate::digest::fingerprint;

/// Whether a statement grants or refuses its actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Condition block: operator -> condition key -> expected value.
pub type Conditions = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

/// A frozen permission statement.
///
/// Statements are produced by a statement builder; once built their resource
/// list no longer changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatement {
    #[serde(rename = "Sid", default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(rename = "Effect")]
    pub effect: Effect,
    /// Only set on resource policies.
    #[serde(rename = "Principal", default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    #[serde(rename = "Action")]
    pub actions: BTreeSet<String>,
    #[serde(rename = "Resource")]
    pub resources: Vec<String>,
    #[serde(rename = "Condition", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: Conditions,
}

impl PermissionStatement {
    pub fn is_unscoped(&self) -> bool {
        self.resources.iter().any(|r| r == "*")
    }

    pub fn allows(&self, action: &str) -> bool {
        self.effect == Effect::Allow && self.actions.contains(action)
    }
}

/// The synthesized statement set bound to one execution identity.
///
/// Created once per pipeline and shared read-only with every build stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    name: String,
    assumed_by: String,
    statements: Vec<PermissionStatement>,
}

impl IdentityProfile {
    pub fn new(
        name: impl Into<String>,
        assumed_by: impl Into<String>,
        statements: Vec<PermissionStatement>,
    ) -> Self {
        Self {
            name: name.into(),
            assumed_by: assumed_by.into(),
            statements,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Service principal allowed to assume this identity.
    pub fn assumed_by(&self) -> &str {
        &self.assumed_by
    }

    pub fn statements(&self) -> &[PermissionStatement] {
        &self.statements
    }

    /// Statements that grant `action`.
    pub fn granting(&self, action: &str) -> impl Iterator<Item = &PermissionStatement> {
        self.statements.iter().filter(move |s| s.allows(action))
    }

    /// All resource identifiers across statements, in emission order.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .flat_map(|s| s.resources.iter().map(|r| r.as_str()))
    }

    pub fn fingerprint(&self) -> Result<String> {
        fingerprint(self)
    }
}

/// A resource policy attached to a storage location (not to an identity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    #[serde(rename = "Statement")]
    pub statements: Vec<PermissionStatement>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(actions: &[&str], resources: &[&str]) -> PermissionStatement {
        PermissionStatement {
            sid: None,
            effect: Effect::Allow,
            principal: None,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources: resources.iter().map(|r| r.to_string()).collect(),
            conditions: Conditions::new(),
        }
    }

    #[test]
    fn test_serializes_in_policy_document_shape() {
        let json = serde_json::to_value(statement(&["logs:PutLogEvents"], &["arn:x"])).unwrap();
        assert_eq!(json["Effect"], "Allow");
        assert_eq!(json["Action"][0], "logs:PutLogEvents");
        assert_eq!(json["Resource"][0], "arn:x");
        assert!(json.get("Condition").is_none());
        assert!(json.get("Principal").is_none());
    }

    #[test]
    fn test_granting_filters_by_action() {
        let profile = IdentityProfile::new(
            "build",
            "codebuild.amazonaws.com",
            vec![
                statement(&["ssm:GetParameter"], &["arn:a"]),
                statement(&["cloudfront:GetDistribution"], &["*"]),
            ],
        );
        let granting: Vec<_> = profile.granting("cloudfront:GetDistribution").collect();
        assert_eq!(granting.len(), 1);
        assert!(granting[0].is_unscoped());
        assert_eq!(profile.resources().collect::<Vec<_>>(), vec!["arn:a", "*"]);
    }
}
