//! Deployment planning: configuration in, validated plan out.
//!
//! Planning runs the two pure steps back to back: synthesize the build
//! identity, then compose the pipeline that shares it. Nothing is emitted
//! unless both succeed.

use stagehand_config::{DeploymentConfig, PipelineConfig};
use stagehand_core::digest::fingerprint;
use stagehand_core::notification::NotificationChannel;
use stagehand_core::pipeline::PipelineGraph;
use stagehand_core::policy::{IdentityProfile, ResourcePolicy};
use stagehand_core::secret::SecretRef;
use stagehand_core::Result;
use stagehand_policy::{PolicySynthesizer, artifact_store_policy};
use std::sync::Arc;
use tracing::info;

use crate::composer::{PipelineComposer, SourceSettings};
use crate::descriptor::{BuildSettings, SentrySettings};
use crate::gates::HostnameEndpoint;
use crate::trigger::TagCreationTrigger;

/// JSON field of the source-control credential secret.
const CREDENTIAL_FIELD: &str = "oauth";

/// Everything one pipeline needs rendered.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    /// Pipeline name as configured (`main`, `prep`).
    pub pipeline: String,
    pub stack_name: String,
    pub identity: Arc<IdentityProfile>,
    pub artifact_policy: ResourcePolicy,
    pub graph: PipelineGraph,
}

impl DeploymentPlan {
    /// Digest over the identity, the artifact policy and the graph.
    pub fn fingerprint(&self) -> Result<String> {
        fingerprint(&(self.identity.as_ref(), &self.artifact_policy, &self.graph))
    }
}

/// Plan one pipeline of a deployment.
pub fn plan_pipeline(config: &DeploymentConfig, pipeline: &PipelineConfig) -> Result<DeploymentPlan> {
    let ctx = config.account_context(pipeline);
    let flags = config.flags_for(pipeline);

    let identity = Arc::new(PolicySynthesizer::new(&pipeline.stages, &ctx, &flags).synthesize()?);

    let stack_name = config.stack_name(pipeline);
    let artifact_store = config.artifact_store(pipeline);
    let artifact_policy = artifact_store_policy(&artifact_store)?;

    let source = SourceSettings {
        owner: config.source.owner.clone(),
        app_repo: config.source.app.repo.clone(),
        app_branch: pipeline
            .app_branch
            .clone()
            .unwrap_or_else(|| config.source.app.branch.clone()),
        blueprints_repo: config.source.blueprints.repo.clone(),
        blueprints_branch: config.source.blueprints.branch.clone(),
        credential: SecretRef::new(&config.source.token_path).field(CREDENTIAL_FIELD),
    };

    let mut build = BuildSettings::new(
        &stack_name,
        &config.service.contact,
        &config.service.owner,
    );
    build.sentry = config.sentry.as_ref().map(|s| SentrySettings {
        token_path: s.token_path.clone(),
        org: s.org.clone(),
        project: s.project.clone(),
    });
    if let Some(domain) = &config.domain {
        build.hostname_prefix = Some(domain.hostname_prefix.clone());
        build.domain_stack = Some(domain.stack.clone());
    }

    let mut composer = PipelineComposer::new(
        &stack_name,
        &artifact_store,
        &pipeline.stages,
        &flags,
        Arc::clone(&identity),
        source,
        build,
    );
    if let Some(domain) = &config.domain {
        composer = composer.endpoint(HostnameEndpoint::new(&domain.hostname_prefix, &domain.name));
    }
    if !config.recipients.is_empty() {
        composer = composer.approval_channel(NotificationChannel::new(
            format!("{}-approval", stack_name),
            config.recipients.clone(),
        ));
    }
    if let Some(tag) = &pipeline.trigger_tag {
        composer = composer.patch(TagCreationTrigger::new(tag));
    }

    let graph = composer.compose()?;

    info!(
        pipeline = %pipeline.name,
        stack = %stack_name,
        statements = identity.statements().len(),
        nodes = graph.nodes().count(),
        "Planned pipeline"
    );

    Ok(DeploymentPlan {
        pipeline: pipeline.name.clone(),
        stack_name,
        identity,
        artifact_policy,
        graph,
    })
}

/// Plan every pipeline in declaration order.
pub fn plan_all(config: &DeploymentConfig) -> Result<Vec<DeploymentPlan>> {
    config
        .pipelines
        .iter()
        .map(|pipeline| plan_pipeline(config, pipeline))
        .collect()
}
