//! Plan renderer.

use serde_json::json;
use stagehand_core::pipeline::NodeKind;
use stagehand_core::policy::IdentityProfile;
use stagehand_core::provider::{
    InfrastructureProvider, PipelineHandle, ResourceHandle, ResourceKind, RoleHandle,
};
use stagehand_core::{Error, Result};
use stagehand_pipeline::DeploymentPlan;
use tracing::{debug, info};

/// Service principal that runs the pipeline itself.
pub const PIPELINE_SERVICE_PRINCIPAL: &str = "codepipeline.amazonaws.com";

/// Handles returned while rendering one plan.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub roles: Vec<RoleHandle>,
    pub resources: Vec<ResourceHandle>,
    pub pipeline: PipelineHandle,
}

/// Declares a plan's resources through a provider.
pub struct Renderer<P> {
    provider: P,
}

impl<P: InfrastructureProvider> Renderer<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Declare everything the plan needs, dependencies first.
    pub async fn render(&self, plan: &DeploymentPlan) -> Result<RenderReport> {
        info!(
            pipeline = %plan.pipeline,
            provider = self.provider.name(),
            "Rendering plan"
        );

        let mut resources = Vec::new();

        let store = self
            .provider
            .declare_resource(
                ResourceKind::ArtifactStore,
                json!({
                    "name": plan.graph.artifact_store(),
                    "policy": plan.artifact_policy,
                }),
            )
            .await?;
        resources.push(store);

        let service_identity = IdentityProfile::new(
            format!("{}-service-role", plan.stack_name),
            PIPELINE_SERVICE_PRINCIPAL,
            Vec::new(),
        );
        let service_role = self.provider.declare_role(&service_identity).await?;
        let build_role = self.provider.declare_role(&plan.identity).await?;

        let mut topics: Vec<&str> = Vec::new();
        for approval in plan.graph.approvals() {
            if topics.contains(&approval.channel.topic.as_str()) {
                continue;
            }
            topics.push(&approval.channel.topic);
            let params = json!({
                "name": approval.channel.topic,
                "display_name": approval.channel.display_name,
                "recipients": approval.channel.recipients,
            });
            resources.push(
                self.provider
                    .declare_resource(ResourceKind::NotificationTopic, params)
                    .await?,
            );
        }

        for node in plan.graph.nodes() {
            let params = match &node.kind {
                NodeKind::Build(project) => serde_json::to_value(project),
                NodeKind::Qa(project) => serde_json::to_value(project),
                _ => continue,
            }
            .map_err(|e| Error::Internal(e.to_string()))?;

            debug!(node = %node.id, kind = node.kind.label(), "Declaring project");
            resources.push(
                self.provider
                    .declare_resource(ResourceKind::BuildProject, params)
                    .await?,
            );
        }

        let pipeline = self
            .provider
            .declare_pipeline(&plan.graph, &service_role)
            .await?;

        info!(
            pipeline = %pipeline.name,
            reference = %pipeline.reference,
            resources = resources.len(),
            "Rendered plan"
        );

        Ok(RenderReport {
            roles: vec![service_role, build_role],
            resources,
            pipeline,
        })
    }
}
