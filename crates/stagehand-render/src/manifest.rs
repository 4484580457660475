//! In-memory manifest provider.
//!
//! Records every declaration and exposes the result as one JSON document.
//! Used by the CLI to print a deployable description and by tests.

use async_trait::async_trait;
use serde_json::{Value, json};
use stagehand_core::pipeline::PipelineGraph;
use stagehand_core::policy::IdentityProfile;
use stagehand_core::provider::{
    InfrastructureProvider, PipelineHandle, ResourceHandle, ResourceKind, RoleHandle,
};
use stagehand_core::{Error, Result};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct Manifest {
    roles: Vec<Value>,
    resources: Vec<Value>,
    pipelines: Vec<Value>,
    declarations: Vec<String>,
}

impl Manifest {
    fn record(&mut self, kind: &str, name: &str) -> Result<String> {
        let key = format!("{}:{}", kind, name);
        if self.declarations.contains(&key) {
            return Err(Error::Provider(format!("{} '{}' declared twice", kind, name)));
        }
        self.declarations.push(key.clone());
        Ok(key)
    }
}

/// Provider that collects declarations into a JSON manifest.
#[derive(Debug, Default)]
pub struct ManifestProvider {
    state: Mutex<Manifest>,
}

impl ManifestProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The manifest collected so far.
    pub async fn manifest(&self) -> Value {
        let state = self.state.lock().await;
        json!({
            "roles": state.roles,
            "resources": state.resources,
            "pipelines": state.pipelines,
        })
    }

    /// `kind:name` of every declaration, in order.
    pub async fn declarations(&self) -> Vec<String> {
        self.state.lock().await.declarations.clone()
    }
}

#[async_trait]
impl InfrastructureProvider for ManifestProvider {
    fn name(&self) -> &'static str {
        "manifest"
    }

    async fn declare_role(&self, identity: &IdentityProfile) -> Result<RoleHandle> {
        let mut state = self.state.lock().await;
        let reference = state.record("role", identity.name())?;
        state.roles.push(json!({
            "name": identity.name(),
            "assumed_by": identity.assumed_by(),
            "statements": identity.statements(),
        }));
        debug!(role = identity.name(), "Recorded role");

        Ok(RoleHandle {
            name: identity.name().to_string(),
            reference,
        })
    }

    async fn declare_resource(&self, kind: ResourceKind, params: Value) -> Result<ResourceHandle> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Provider(format!("{} declared without a name", kind)))?
            .to_string();

        let mut state = self.state.lock().await;
        let reference = state.record(&kind.to_string(), &name)?;
        state.resources.push(json!({
            "kind": kind,
            "properties": params,
        }));
        debug!(kind = %kind, name = %name, "Recorded resource");

        Ok(ResourceHandle {
            kind,
            name,
            reference,
        })
    }

    async fn declare_pipeline(
        &self,
        graph: &PipelineGraph,
        role: &RoleHandle,
    ) -> Result<PipelineHandle> {
        let mut definition =
            serde_json::to_value(graph).map_err(|e| Error::Internal(e.to_string()))?;
        if let Some(fields) = definition.as_object_mut() {
            fields.insert("role".to_string(), Value::String(role.name.clone()));
        }

        let mut state = self.state.lock().await;
        let reference = state.record("pipeline", graph.name())?;
        state.pipelines.push(definition);

        Ok(PipelineHandle {
            name: graph.name().to_string(),
            reference,
        })
    }
}
