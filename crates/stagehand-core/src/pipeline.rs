//! Pipeline graph intermediate representation.
//!
//! The composer builds a [`PipelineGraph`]; the renderer reads it. Between the
//! two, [`PipelineGraph::validate`] enforces the structural invariants so a QA
//! or approval gate can never be bypassed by construction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::artifact::ArtifactHandle;
use crate::build::{BuildProject, QaProject};
use crate::digest::fingerprint;
use crate::notification::NotificationChannel;
use crate::secret::SecretRef;
use crate::{Error, NodeId, Result};

/// One repository read by the source intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFeed {
    pub action_name: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub output: ArtifactHandle,
    /// Whether a change on this feed starts the pipeline.
    pub triggers: bool,
}

/// JSON-path match applied to incoming webhook payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookFilter {
    pub json_path: String,
    pub match_equals: String,
}

/// How the source intake is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceTrigger {
    /// Any push to the primary feed's branch.
    Webhook,
    /// Only webhook payloads matching every filter.
    FilteredWebhook { filters: Vec<WebhookFilter> },
    /// Started manually.
    None,
}

/// The single source node: application code plus companion blueprints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIntake {
    pub primary: RepositoryFeed,
    pub companion: RepositoryFeed,
    pub credential: SecretRef,
    pub trigger: SourceTrigger,
}

/// Manual checkpoint that blocks progression until signaled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalAction {
    pub stage: String,
    pub channel: NotificationChannel,
    pub additional_information: String,
}

/// What a node does.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Source(SourceIntake),
    Build(BuildProject),
    Qa(QaProject),
    Approval(ApprovalAction),
}

impl NodeKind {
    /// Position of this kind within a stage: Source < Build < QA < Approval.
    pub fn rank(&self) -> u8 {
        match self {
            NodeKind::Source(_) => 0,
            NodeKind::Build(_) => 1,
            NodeKind::Qa(_) => 2,
            NodeKind::Approval(_) => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Source(_) => "source",
            NodeKind::Build(_) => "build",
            NodeKind::Qa(_) => "qa",
            NodeKind::Approval(_) => "approval",
        }
    }
}

/// A stage action with its run order and artifact wiring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineNode {
    pub id: NodeId,
    pub action_name: String,
    /// Ordinal within the owning pipeline stage, starting at 1.
    pub run_order: u32,
    pub inputs: Vec<ArtifactHandle>,
    pub outputs: Vec<ArtifactHandle>,
    /// Feature flag that caused this node to be included, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_by: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// A named group of nodes executed before the next group starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStage {
    pub name: String,
    pub nodes: Vec<PipelineNode>,
}

/// A composed pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineGraph {
    name: String,
    artifact_store: String,
    stages: Vec<PipelineStage>,
}

impl PipelineGraph {
    pub fn new(
        name: impl Into<String>,
        artifact_store: impl Into<String>,
        stages: Vec<PipelineStage>,
    ) -> Self {
        Self {
            name: name.into(),
            artifact_store: artifact_store.into(),
            stages,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage location backing every artifact in this pipeline.
    pub fn artifact_store(&self) -> &str {
        &self.artifact_store
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&PipelineStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PipelineNode> {
        self.stages.iter().flat_map(|s| s.nodes.iter())
    }

    pub fn node(&self, id: &NodeId) -> Option<&PipelineNode> {
        self.nodes().find(|n| &n.id == id)
    }

    pub fn source(&self) -> Option<(&PipelineNode, &SourceIntake)> {
        self.nodes().find_map(|n| match &n.kind {
            NodeKind::Source(intake) => Some((n, intake)),
            _ => None,
        })
    }

    pub fn source_intake_mut(&mut self) -> Option<&mut SourceIntake> {
        self.stages
            .iter_mut()
            .flat_map(|s| s.nodes.iter_mut())
            .find_map(|n| match &mut n.kind {
                NodeKind::Source(intake) => Some(intake),
                _ => None,
            })
    }

    pub fn build_projects(&self) -> impl Iterator<Item = &BuildProject> {
        self.nodes().filter_map(|n| match &n.kind {
            NodeKind::Build(project) => Some(project),
            _ => None,
        })
    }

    pub fn qa_projects(&self) -> impl Iterator<Item = &QaProject> {
        self.nodes().filter_map(|n| match &n.kind {
            NodeKind::Qa(project) => Some(project),
            _ => None,
        })
    }

    pub fn approvals(&self) -> impl Iterator<Item = &ApprovalAction> {
        self.nodes().filter_map(|n| match &n.kind {
            NodeKind::Approval(action) => Some(action),
            _ => None,
        })
    }

    /// Nodes that must finish before `id` may start.
    ///
    /// Within a stage these are the nodes with the next-lower run order; the
    /// first nodes of a stage wait on the last nodes of the previous stage.
    pub fn predecessors(&self, id: &NodeId) -> Vec<&PipelineNode> {
        let Some((stage_idx, node)) = self
            .stages
            .iter()
            .enumerate()
            .find_map(|(i, s)| s.nodes.iter().find(|n| &n.id == id).map(|n| (i, n)))
        else {
            return Vec::new();
        };

        let stage = &self.stages[stage_idx];
        let earlier = stage
            .nodes
            .iter()
            .filter(|n| n.run_order < node.run_order)
            .map(|n| n.run_order)
            .max();

        if let Some(order) = earlier {
            return stage.nodes.iter().filter(|n| n.run_order == order).collect();
        }

        match stage_idx.checked_sub(1).map(|i| &self.stages[i]) {
            Some(previous) => {
                let last = previous.nodes.iter().map(|n| n.run_order).max();
                previous
                    .nodes
                    .iter()
                    .filter(|n| Some(n.run_order) == last)
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// Check the structural invariants of a composed pipeline.
    pub fn validate(&self) -> Result<()> {
        let sources: Vec<&PipelineNode> = self
            .nodes()
            .filter(|n| matches!(n.kind, NodeKind::Source(_)))
            .collect();
        if sources.len() != 1 {
            return Err(Error::InvalidGraph(format!(
                "expected exactly one source node, found {}",
                sources.len()
            )));
        }
        let source = sources[0];
        match self.stages.first() {
            Some(first) if first.nodes.len() == 1 && first.nodes[0].id == source.id => {}
            _ => {
                return Err(Error::InvalidGraph(
                    "the source node must be alone in the first stage".to_string(),
                ));
            }
        }
        if !source.inputs.is_empty() || source.outputs.len() != 2 {
            return Err(Error::InvalidGraph(format!(
                "source node must consume nothing and produce two artifacts, produces {}",
                source.outputs.len()
            )));
        }

        // Every artifact has exactly one producer, and that producer is the
        // node the handle names.
        let mut producers: HashMap<&str, &NodeId> = HashMap::new();
        for node in self.nodes() {
            for output in &node.outputs {
                if output.producer() != &node.id {
                    return Err(Error::InvalidGraph(format!(
                        "artifact '{}' is output by '{}' but names '{}' as producer",
                        output,
                        node.id,
                        output.producer()
                    )));
                }
                if producers.insert(output.name(), &node.id).is_some() {
                    return Err(Error::InvalidGraph(format!(
                        "artifact '{}' has more than one producer",
                        output
                    )));
                }
            }
        }
        for node in self.nodes() {
            for input in &node.inputs {
                match producers.get(input.name()) {
                    Some(producer) if *producer == input.producer() => {}
                    _ => {
                        return Err(Error::InvalidGraph(format!(
                            "'{}' consumes '{}' which has no matching producer",
                            node.id, input
                        )));
                    }
                }
            }
        }

        for stage in &self.stages[1..] {
            let mut nodes: Vec<&PipelineNode> = stage.nodes.iter().collect();
            nodes.sort_by_key(|n| n.run_order);

            match nodes.first() {
                Some(first) if matches!(first.kind, NodeKind::Build(_)) => {}
                _ => {
                    return Err(Error::InvalidGraph(format!(
                        "stage '{}' must start with a build node",
                        stage.name
                    )));
                }
            }
            for pair in nodes.windows(2) {
                if pair[0].run_order >= pair[1].run_order
                    || pair[0].kind.rank() >= pair[1].kind.rank()
                {
                    return Err(Error::InvalidGraph(format!(
                        "stage '{}' orders {} '{}' before {} '{}'",
                        stage.name,
                        pair[0].kind.label(),
                        pair[0].id,
                        pair[1].kind.label(),
                        pair[1].id
                    )));
                }
            }

            for node in &nodes {
                let expected: &[ArtifactHandle] = match node.kind {
                    NodeKind::Build(_) => source.outputs.as_slice(),
                    NodeKind::Qa(_) => &source.outputs[..1],
                    _ => &[],
                };
                if node.inputs != expected {
                    return Err(Error::InvalidGraph(format!(
                        "'{}' must consume exactly [{}]",
                        node.id,
                        expected
                            .iter()
                            .map(|a| a.name())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn fingerprint(&self) -> Result<String> {
        fingerprint(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildEnvironment, BuildSpec};
    use crate::policy::IdentityProfile;
    use std::sync::Arc;

    fn source_node() -> PipelineNode {
        let id = NodeId::new("Source", "Source");
        let app = ArtifactHandle::new("AppCode", id.clone());
        let infra = ArtifactHandle::new("InfraCode", id.clone());
        PipelineNode {
            id,
            action_name: "Source".to_string(),
            run_order: 1,
            inputs: vec![],
            outputs: vec![app.clone(), infra.clone()],
            included_by: None,
            kind: NodeKind::Source(SourceIntake {
                primary: RepositoryFeed {
                    action_name: "SourceAppCode".to_string(),
                    owner: "ndlib".to_string(),
                    repo: "app".to_string(),
                    branch: "master".to_string(),
                    output: app,
                    triggers: true,
                },
                companion: RepositoryFeed {
                    action_name: "SourceInfraCode".to_string(),
                    owner: "ndlib".to_string(),
                    repo: "blueprints".to_string(),
                    branch: "master".to_string(),
                    output: infra,
                    triggers: false,
                },
                credential: SecretRef::new("/all/github/token").field("oauth"),
                trigger: SourceTrigger::Webhook,
            }),
        }
    }

    fn build_node(stage: &str, inputs: Vec<ArtifactHandle>, run_order: u32) -> PipelineNode {
        PipelineNode {
            id: NodeId::new(stage, "Build_and_Deploy"),
            action_name: "Build_and_Deploy".to_string(),
            run_order,
            inputs,
            outputs: vec![],
            included_by: None,
            kind: NodeKind::Build(BuildProject {
                name: format!("{stage}Project"),
                stage: stage.to_lowercase(),
                identity: Arc::new(IdentityProfile::new("role", "codebuild.amazonaws.com", vec![])),
                image: "standard".to_string(),
                environment: BuildEnvironment::new(),
                spec: BuildSpec::default(),
            }),
        }
    }

    fn approval_node(stage: &str, run_order: u32) -> PipelineNode {
        PipelineNode {
            id: NodeId::new(stage, "Approve"),
            action_name: "Approve".to_string(),
            run_order,
            inputs: vec![],
            outputs: vec![],
            included_by: Some("manual_approval".to_string()),
            kind: NodeKind::Approval(ApprovalAction {
                stage: stage.to_lowercase(),
                channel: NotificationChannel::new("topic", vec![]),
                additional_information: String::new(),
            }),
        }
    }

    fn graph(stages: Vec<PipelineStage>) -> PipelineGraph {
        PipelineGraph::new("pipeline", "artifacts", stages)
    }

    #[test]
    fn test_valid_graph_and_predecessors() {
        let source = source_node();
        let outputs = source.outputs.clone();
        let g = graph(vec![
            PipelineStage {
                name: "Source".to_string(),
                nodes: vec![source],
            },
            PipelineStage {
                name: "DeployToTest".to_string(),
                nodes: vec![build_node("DeployToTest", outputs.clone(), 1), approval_node("DeployToTest", 2)],
            },
            PipelineStage {
                name: "DeployToProd".to_string(),
                nodes: vec![build_node("DeployToProd", outputs, 1)],
            },
        ]);

        g.validate().unwrap();

        let source_id = NodeId::new("Source", "Source");
        assert!(g.predecessors(&source_id).is_empty());

        let approve = NodeId::new("DeployToTest", "Approve");
        let preds = g.predecessors(&approve);
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].id, NodeId::new("DeployToTest", "Build_and_Deploy"));

        let prod = NodeId::new("DeployToProd", "Build_and_Deploy");
        assert_eq!(g.predecessors(&prod)[0].id, approve);
    }

    #[test]
    fn test_build_missing_companion_is_invalid() {
        let source = source_node();
        let primary_only = vec![source.outputs[0].clone()];
        let g = graph(vec![
            PipelineStage {
                name: "Source".to_string(),
                nodes: vec![source],
            },
            PipelineStage {
                name: "DeployToTest".to_string(),
                nodes: vec![build_node("DeployToTest", primary_only, 1)],
            },
        ]);
        assert!(matches!(g.validate(), Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_approval_before_build_is_invalid() {
        let source = source_node();
        let outputs = source.outputs.clone();
        let g = graph(vec![
            PipelineStage {
                name: "Source".to_string(),
                nodes: vec![source],
            },
            PipelineStage {
                name: "DeployToTest".to_string(),
                nodes: vec![approval_node("DeployToTest", 1), build_node("DeployToTest", outputs, 2)],
            },
        ]);
        assert!(matches!(g.validate(), Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_renamed_artifact_has_no_producer() {
        let source = source_node();
        let renamed = vec![
            ArtifactHandle::new("Renamed", source.id.clone()),
            source.outputs[1].clone(),
        ];
        let g = graph(vec![
            PipelineStage {
                name: "Source".to_string(),
                nodes: vec![source],
            },
            PipelineStage {
                name: "DeployToTest".to_string(),
                nodes: vec![build_node("DeployToTest", renamed, 1)],
            },
        ]);
        assert!(matches!(g.validate(), Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_two_sources_are_invalid() {
        let g = graph(vec![
            PipelineStage {
                name: "Source".to_string(),
                nodes: vec![source_node()],
            },
            PipelineStage {
                name: "Again".to_string(),
                nodes: vec![source_node()],
            },
        ]);
        assert!(matches!(g.validate(), Err(Error::InvalidGraph(_))));
    }
}
