//! Policy synthesis: stage list + flags -> identity profile.

use stagehand_core::policy::{IdentityProfile, PermissionStatement};
use stagehand_core::{AccountContext, Error, FeatureFlags, Result, StageList};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::catalog::{Capability, Scope, build_role_catalog};
use crate::pattern::{ResourcePattern, covers};
use crate::statement::StatementBuilder;

/// Service principal of the build executor.
pub const BUILD_SERVICE_PRINCIPAL: &str = "codebuild.amazonaws.com";

/// Resources owned by the pipeline itself. No stage-scoped grant may reach
/// one of these.
const PIPELINE_OWNED: &[&str] = &[
    "arn:aws:iam::${account}:role/${role}",
    "arn:aws:iam::${account}:role/${stack}-service-role",
    "arn:aws:cloudformation:${region}:${account}:stack/${stack}/",
    "arn:aws:s3:::${artifact_bucket}",
    "arn:aws:s3:::${artifact_bucket}/",
];

/// Synthesizes the statement set for one pipeline's build identity.
pub struct PolicySynthesizer<'a> {
    catalog: Vec<Capability>,
    stages: &'a StageList,
    ctx: &'a AccountContext,
    flags: &'a FeatureFlags,
}

impl<'a> PolicySynthesizer<'a> {
    pub fn new(stages: &'a StageList, ctx: &'a AccountContext, flags: &'a FeatureFlags) -> Self {
        Self {
            catalog: build_role_catalog(ctx),
            stages,
            ctx,
            flags,
        }
    }

    /// Replace the capability catalog.
    pub fn with_catalog(mut self, catalog: Vec<Capability>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn catalog(&self) -> &[Capability] {
        &self.catalog
    }

    /// Produce the frozen statement list.
    ///
    /// Synthesis is all-or-nothing: the first failing capability aborts the
    /// run and no statements are returned.
    pub fn statements(&self) -> Result<Vec<PermissionStatement>> {
        let mut builders: Vec<StatementBuilder> = Vec::new();

        for capability in &self.catalog {
            if !capability.requires.is_met(self.flags, self.stages) {
                debug!(capability = capability.name, "Capability not required, skipping");
                continue;
            }

            let resources = self
                .resources_for(capability)
                .map_err(|e| e.for_capability(capability.name))?;

            let actions: BTreeSet<String> =
                capability.actions.iter().map(|a| a.to_string()).collect();
            let idx = match builders
                .iter()
                .position(|b| b.matches(&actions, capability.effect))
            {
                Some(idx) => idx,
                None => {
                    builders.push(
                        StatementBuilder::new(actions, capability.effect).sid(capability.sid()),
                    );
                    builders.len() - 1
                }
            };

            debug!(
                capability = capability.name,
                resources = resources.len(),
                "Adding capability resources"
            );
            builders[idx].add_resources(resources);
        }

        builders.into_iter().map(StatementBuilder::build).collect()
    }

    /// Synthesize the identity profile for the build role.
    pub fn synthesize(&self) -> Result<IdentityProfile> {
        let statements = self.statements()?;
        info!(
            role = %self.ctx.role_name,
            stages = ?self.stages.names(),
            statements = statements.len(),
            "Synthesized build identity"
        );
        Ok(IdentityProfile::new(
            self.ctx.role_name.clone(),
            BUILD_SERVICE_PRINCIPAL,
            statements,
        ))
    }

    fn resources_for(&self, capability: &Capability) -> Result<Vec<String>> {
        match &capability.scope {
            Scope::Unscoped => Ok(vec!["*".to_string()]),
            Scope::Fixed(patterns) => patterns
                .iter()
                .map(|p| p.materialize(None, self.ctx))
                .collect(),
            Scope::PerStage { pattern, shared } => {
                if self.stages.is_empty() {
                    return Err(Error::EmptyStageList {
                        capability: capability.name.to_string(),
                    });
                }
                let mut resources = pattern.materialize_each(self.stages, self.ctx)?;
                self.check_owned(capability, &resources)?;
                for p in shared {
                    resources.push(p.materialize(None, self.ctx)?);
                }
                Ok(resources)
            }
        }
    }

    /// Reject stage-derived resources that cover a pipeline-owned name.
    ///
    /// Owned names whose placeholders are not in the context are skipped;
    /// the capability that needs them reports the missing value.
    fn check_owned(&self, capability: &Capability, resources: &[String]) -> Result<()> {
        let owned: Vec<String> = PIPELINE_OWNED
            .iter()
            .filter_map(|t| ResourcePattern::new(*t).materialize(None, self.ctx).ok())
            .collect();

        for resource in resources {
            if let Some(hit) = owned.iter().find(|o| covers(resource, o)) {
                return Err(Error::ScopeOverlap {
                    capability: capability.name.to_string(),
                    resource: resource.clone(),
                    owned: hit.clone(),
                });
            }
        }
        Ok(())
    }
}
