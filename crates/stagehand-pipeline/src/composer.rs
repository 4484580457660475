//! Pipeline composition.
//!
//! The composer walks the stage list once and emits, per stage, a build node
//! followed by the optional QA and approval gates. Ordering inside a stage is
//! enforced by [`StageAssembly`] as nodes are added, then the finished graph
//! is checked again by [`PipelineGraph::validate`].

use stagehand_core::artifact::ArtifactHandle;
use stagehand_core::notification::NotificationChannel;
use stagehand_core::pipeline::{
    NodeKind, PipelineGraph, PipelineNode, PipelineStage, RepositoryFeed, SourceIntake,
    SourceTrigger,
};
use stagehand_core::policy::IdentityProfile;
use stagehand_core::secret::SecretRef;
use stagehand_core::{Error, FeatureFlags, NodeId, Result, StageList};
use std::sync::Arc;
use tracing::{debug, info};

use crate::descriptor::{BuildSettings, BuildStageDescriptor};
use crate::gates::{ApprovalGate, HostnameEndpoint, QaGate};

pub const SOURCE_STAGE: &str = "Source";
pub const APP_ARTIFACT: &str = "AppCode";
pub const INFRA_ARTIFACT: &str = "InfraCode";

/// A node before the assembly assigns its id and run order.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDraft {
    pub action_name: String,
    pub inputs: Vec<ArtifactHandle>,
    /// Feature flag that caused the node to be included.
    pub included_by: Option<String>,
    pub kind: NodeKind,
}

/// A mutation applied to the composed graph before validation.
///
/// Some source-intake properties can only be set once the node exists;
/// patches keep those out of node construction.
pub trait CompositionPatch: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, graph: &mut PipelineGraph) -> Result<()>;
}

/// Builds one pipeline stage, rejecting out-of-order nodes.
#[derive(Debug)]
pub struct StageAssembly {
    name: String,
    nodes: Vec<PipelineNode>,
}

impl StageAssembly {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a node. Build comes first, then QA, then approval.
    pub fn push(&mut self, draft: NodeDraft) -> Result<&PipelineNode> {
        match self.nodes.last() {
            None if !matches!(draft.kind, NodeKind::Build(_)) => {
                return Err(Error::CompositionOrder {
                    stage: self.name.clone(),
                    message: format!("{} node added before the stage's build", draft.kind.label()),
                });
            }
            Some(last) if last.kind.rank() >= draft.kind.rank() => {
                return Err(Error::CompositionOrder {
                    stage: self.name.clone(),
                    message: format!(
                        "{} node cannot follow {} node",
                        draft.kind.label(),
                        last.kind.label()
                    ),
                });
            }
            _ => {}
        }

        let run_order = self.nodes.len() as u32 + 1;
        self.nodes.push(PipelineNode {
            id: NodeId::new(&self.name, &draft.action_name),
            action_name: draft.action_name,
            run_order,
            inputs: draft.inputs,
            outputs: Vec::new(),
            included_by: draft.included_by,
            kind: draft.kind,
        });
        Ok(&self.nodes[self.nodes.len() - 1])
    }

    pub fn finish(self) -> Result<PipelineStage> {
        if self.nodes.is_empty() {
            return Err(Error::CompositionOrder {
                stage: self.name,
                message: "stage has no build node".to_string(),
            });
        }
        Ok(PipelineStage {
            name: self.name,
            nodes: self.nodes,
        })
    }
}

/// Repositories and credential read by the source intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub owner: String,
    pub app_repo: String,
    pub app_branch: String,
    pub blueprints_repo: String,
    pub blueprints_branch: String,
    pub credential: SecretRef,
}

/// Composes one pipeline graph.
pub struct PipelineComposer<'a> {
    name: String,
    artifact_store: String,
    stages: &'a StageList,
    flags: &'a FeatureFlags,
    identity: Arc<IdentityProfile>,
    source: SourceSettings,
    build: BuildSettings,
    endpoint: Option<HostnameEndpoint>,
    approval_channel: Option<NotificationChannel>,
    patches: Vec<Box<dyn CompositionPatch>>,
}

impl<'a> PipelineComposer<'a> {
    pub fn new(
        name: impl Into<String>,
        artifact_store: impl Into<String>,
        stages: &'a StageList,
        flags: &'a FeatureFlags,
        identity: Arc<IdentityProfile>,
        source: SourceSettings,
        build: BuildSettings,
    ) -> Self {
        Self {
            name: name.into(),
            artifact_store: artifact_store.into(),
            stages,
            flags,
            identity,
            source,
            build,
            endpoint: None,
            approval_channel: None,
            patches: Vec::new(),
        }
    }

    /// Endpoint used by the QA gate.
    pub fn endpoint(mut self, endpoint: HostnameEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Channel notified by approval gates.
    pub fn approval_channel(mut self, channel: NotificationChannel) -> Self {
        self.approval_channel = Some(channel);
        self
    }

    /// Register a patch to run after composition, in registration order.
    pub fn patch(mut self, patch: impl CompositionPatch + 'static) -> Self {
        self.patches.push(Box::new(patch));
        self
    }

    pub fn compose(&self) -> Result<PipelineGraph> {
        if self.stages.is_empty() {
            return Err(Error::EmptyStageList {
                capability: "pipeline".to_string(),
            });
        }

        let source_id = NodeId::new(SOURCE_STAGE, SOURCE_STAGE);
        let primary = ArtifactHandle::new(APP_ARTIFACT, source_id.clone());
        let companion = ArtifactHandle::new(INFRA_ARTIFACT, source_id.clone());

        let mut stages = vec![self.source_stage(source_id, &primary, &companion)];

        for stage in self.stages {
            let mut assembly = StageAssembly::new(format!("DeployTo{}", stage.title()));

            assembly.push(
                BuildStageDescriptor::new(
                    stage,
                    Arc::clone(&self.identity),
                    &self.build,
                    self.flags,
                    primary.clone(),
                    companion.clone(),
                )
                .into_draft(),
            )?;

            if self.flags.qa_applies_to(stage) {
                let endpoint = self
                    .endpoint
                    .as_ref()
                    .ok_or_else(|| Error::MissingParameter {
                        capability: "qa-gate".to_string(),
                        parameter: "endpoint".to_string(),
                    })?
                    .url_for(stage)?;
                let gate = QaGate::new(
                    stage,
                    Arc::clone(&self.identity),
                    &self.build.project_prefix,
                    endpoint,
                    primary.clone(),
                )
                .start_instance(self.flags.test_instance.clone());
                assembly.push(gate.into_draft())?;
            }

            // The terminal stage has nothing left to gate.
            if self.flags.manual_approval && !self.stages.is_last(stage) {
                let channel =
                    self.approval_channel
                        .clone()
                        .ok_or_else(|| Error::MissingParameter {
                            capability: "approval-gate".to_string(),
                            parameter: "notification channel".to_string(),
                        })?;
                assembly.push(ApprovalGate::new(stage, channel).into_draft())?;
            }

            let composed = assembly.finish()?;
            debug!(stage = %composed.name, nodes = composed.nodes.len(), "Composed stage");
            stages.push(composed);
        }

        let mut graph = PipelineGraph::new(&self.name, &self.artifact_store, stages);

        for patch in &self.patches {
            info!(pipeline = %self.name, patch = patch.name(), "Applying composition patch");
            patch.apply(&mut graph)?;
        }

        graph.validate()?;

        info!(
            pipeline = %self.name,
            stages = graph.stages().len(),
            nodes = graph.nodes().count(),
            "Composed pipeline"
        );
        Ok(graph)
    }

    fn source_stage(
        &self,
        id: NodeId,
        primary: &ArtifactHandle,
        companion: &ArtifactHandle,
    ) -> PipelineStage {
        let intake = SourceIntake {
            primary: RepositoryFeed {
                action_name: format!("Source{}", APP_ARTIFACT),
                owner: self.source.owner.clone(),
                repo: self.source.app_repo.clone(),
                branch: self.source.app_branch.clone(),
                output: primary.clone(),
                triggers: true,
            },
            companion: RepositoryFeed {
                action_name: format!("Source{}", INFRA_ARTIFACT),
                owner: self.source.owner.clone(),
                repo: self.source.blueprints_repo.clone(),
                branch: self.source.blueprints_branch.clone(),
                output: companion.clone(),
                triggers: false,
            },
            credential: self.source.credential.clone(),
            trigger: SourceTrigger::Webhook,
        };

        PipelineStage {
            name: SOURCE_STAGE.to_string(),
            nodes: vec![PipelineNode {
                id,
                action_name: SOURCE_STAGE.to_string(),
                run_order: 1,
                inputs: Vec::new(),
                outputs: vec![primary.clone(), companion.clone()],
                included_by: None,
                kind: NodeKind::Source(intake),
            }],
        }
    }
}
