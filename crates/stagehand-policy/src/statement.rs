//! Incremental permission statement builders.

use stagehand_core::policy::{Conditions, Effect, PermissionStatement};
use stagehand_core::{Error, Result};
use std::collections::BTreeSet;

/// Builds one statement per distinct `(actions, effect)` pair.
///
/// Resources are appended as the synthesizer walks the stage list; `build`
/// consumes the builder, so a statement's resources are frozen once emitted.
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    sid: Option<String>,
    effect: Effect,
    principal: Option<String>,
    actions: BTreeSet<String>,
    resources: Vec<String>,
    conditions: Conditions,
}

impl StatementBuilder {
    pub fn new<I, S>(actions: I, effect: Effect) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sid: None,
            effect,
            principal: None,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: Vec::new(),
            conditions: Conditions::new(),
        }
    }

    pub fn allow<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(actions, Effect::Allow)
    }

    pub fn deny<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(actions, Effect::Deny)
    }

    pub fn sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn condition(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.conditions
            .entry(operator.into())
            .or_default()
            .insert(key.into(), value);
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.add_resource(resource);
        self
    }

    /// Append a resource. Returns false if it was already present.
    pub fn add_resource(&mut self, resource: impl Into<String>) -> bool {
        let resource = resource.into();
        if self.resources.contains(&resource) {
            return false;
        }
        self.resources.push(resource);
        true
    }

    pub fn add_resources<I, S>(&mut self, resources: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for resource in resources {
            self.add_resource(resource);
        }
    }

    /// Whether this builder is the one for `(actions, effect)`.
    pub fn matches(&self, actions: &BTreeSet<String>, effect: Effect) -> bool {
        self.effect == effect && &self.actions == actions
    }

    pub fn actions(&self) -> &BTreeSet<String> {
        &self.actions
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Freeze the statement.
    pub fn build(self) -> Result<PermissionStatement> {
        let label = self.sid.clone().unwrap_or_else(|| {
            self.actions
                .iter()
                .next()
                .cloned()
                .unwrap_or_else(|| "statement".to_string())
        });
        if self.actions.is_empty() {
            return Err(Error::InvalidParameter {
                capability: label,
                parameter: "actions".to_string(),
                message: "statement has no actions".to_string(),
            });
        }
        if self.resources.is_empty() {
            return Err(Error::InvalidParameter {
                capability: label,
                parameter: "resources".to_string(),
                message: "statement has no resources".to_string(),
            });
        }

        Ok(PermissionStatement {
            sid: self.sid,
            effect: self.effect,
            principal: self.principal,
            actions: self.actions,
            resources: self.resources,
            conditions: self.conditions,
        })
    }
}
