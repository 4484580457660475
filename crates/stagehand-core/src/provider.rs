//! Infrastructure provider trait and handle types.
//!
//! Providers turn the validated intermediate representation into deployable
//! resource descriptions (a template, an API call, a manifest file, ...).

use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::pipeline::PipelineGraph;
use crate::policy::IdentityProfile;

/// Kinds of supporting resources a pipeline needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[display("artifact_store")]
    ArtifactStore,
    #[display("notification_topic")]
    NotificationTopic,
    #[display("build_project")]
    BuildProject,
}

/// Handle to a declared role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleHandle {
    pub name: String,
    /// Provider-specific reference (logical id, ARN, ...).
    pub reference: String,
}

/// Handle to a declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub name: String,
    pub reference: String,
}

/// Handle to a declared pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineHandle {
    pub name: String,
    pub reference: String,
}

/// Trait for infrastructure providers.
#[async_trait]
pub trait InfrastructureProvider: Send + Sync {
    /// Name of this provider.
    fn name(&self) -> &'static str;

    /// Declare an execution identity with its statements.
    async fn declare_role(&self, identity: &IdentityProfile) -> Result<RoleHandle>;

    /// Declare a supporting resource. `params` must contain a `name` field.
    async fn declare_resource(
        &self,
        kind: ResourceKind,
        params: serde_json::Value,
    ) -> Result<ResourceHandle>;

    /// Declare the pipeline itself, executed under `role`.
    async fn declare_pipeline(
        &self,
        graph: &PipelineGraph,
        role: &RoleHandle,
    ) -> Result<PipelineHandle>;
}
