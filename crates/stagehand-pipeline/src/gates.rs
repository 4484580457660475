//! QA and approval gates.

use stagehand_core::artifact::ArtifactHandle;
use stagehand_core::build::{BuildEnvironment, BuildPhase, BuildSpec, Phase, QaProject};
use stagehand_core::notification::NotificationChannel;
use stagehand_core::pipeline::{ApprovalAction, NodeKind};
use stagehand_core::policy::IdentityProfile;
use stagehand_core::{Error, Result, Stage};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

use crate::composer::NodeDraft;
use crate::descriptor::DEFAULT_IMAGE;

pub const QA_ACTION: &str = "QA";

/// Text shown to the approver.
pub const APPROVAL_INFORMATION: &str = "Approve or Reject this change after testing";

/// Computes a stage's public endpoint from a hostname prefix and a base domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnameEndpoint {
    hostname_prefix: String,
    domain: String,
}

impl HostnameEndpoint {
    pub fn new(hostname_prefix: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            hostname_prefix: hostname_prefix.into(),
            domain: domain.into(),
        }
    }

    /// `https://<prefix>-<stage>.<domain>`
    pub fn url_for(&self, stage: &Stage) -> Result<Url> {
        let raw = format!(
            "https://{}-{}.{}",
            self.hostname_prefix,
            stage.name(),
            self.domain
        );
        Url::parse(&raw).map_err(|e| Error::InvalidParameter {
            capability: "qa-gate".to_string(),
            parameter: "endpoint".to_string(),
            message: format!("'{}' is not a valid URL: {}", raw, e),
        })
    }
}

/// Verification run against a stage's live endpoint. Consumes only the
/// application artifact.
pub struct QaGate {
    stage: Stage,
    identity: Arc<IdentityProfile>,
    project_prefix: String,
    endpoint: Url,
    primary: ArtifactHandle,
    instance: Option<String>,
}

impl QaGate {
    pub fn new(
        stage: &Stage,
        identity: Arc<IdentityProfile>,
        project_prefix: impl Into<String>,
        endpoint: Url,
        primary: ArtifactHandle,
    ) -> Self {
        Self {
            stage: stage.clone(),
            identity,
            project_prefix: project_prefix.into(),
            endpoint,
            primary,
            instance: None,
        }
    }

    /// Start a stopped test server before running the collection.
    pub fn start_instance(mut self, instance: Option<String>) -> Self {
        self.instance = instance;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn spec(&self) -> BuildSpec {
        let mut phases = vec![BuildPhase {
            phase: Phase::Install,
            commands: vec![
                "npm install -g newman".to_string(),
                "chmod -R 755 ./scripts/codebuild/spec/*".to_string(),
            ],
        }];
        if let Some(instance) = &self.instance {
            phases.push(BuildPhase {
                phase: Phase::PreBuild,
                commands: vec![format!(
                    "aws ec2 start-instances --instance-ids \"{}\"",
                    instance
                )],
            });
        }
        phases.push(BuildPhase {
            phase: Phase::Build,
            commands: vec![
                "echo \"Beginning tests at `date`\"".to_string(),
                "newman run ./scripts/codebuild/spec/qa.postman_collection.json --global-var \"TargetURL=$TARGET_URL\"".to_string(),
            ],
        });

        BuildSpec {
            runtimes: BTreeMap::from([("nodejs".to_string(), "12.x".to_string())]),
            phases,
            artifacts: Vec::new(),
        }
    }

    pub fn project(&self) -> QaProject {
        let mut environment = BuildEnvironment::new();
        environment.plaintext("CI", "true");
        environment.plaintext("STAGE", self.stage.name());
        environment.plaintext("TARGET_URL", self.endpoint.as_str());

        QaProject {
            name: format!("{}-{}-qa", self.project_prefix, self.stage.name()),
            stage: self.stage.name().to_string(),
            identity: Arc::clone(&self.identity),
            image: DEFAULT_IMAGE.to_string(),
            endpoint: self.endpoint.clone(),
            environment,
            spec: self.spec(),
        }
    }

    pub fn into_draft(self) -> NodeDraft {
        let project = self.project();
        NodeDraft {
            action_name: QA_ACTION.to_string(),
            inputs: vec![self.primary],
            included_by: Some("has_test_server".to_string()),
            kind: NodeKind::Qa(project),
        }
    }
}

/// Human checkpoint before the next stage deploys.
pub struct ApprovalGate {
    stage: Stage,
    channel: NotificationChannel,
}

impl ApprovalGate {
    pub fn new(stage: &Stage, channel: NotificationChannel) -> Self {
        Self {
            stage: stage.clone(),
            channel,
        }
    }

    pub fn action_name(&self) -> String {
        format!("ManualApprovalOf{}Environment", self.stage.title())
    }

    pub fn into_draft(self) -> NodeDraft {
        NodeDraft {
            action_name: self.action_name(),
            inputs: Vec::new(),
            included_by: Some("manual_approval".to_string()),
            kind: NodeKind::Approval(ApprovalAction {
                stage: self.stage.name().to_string(),
                channel: self.channel,
                additional_information: APPROVAL_INFORMATION.to_string(),
            }),
        }
    }
}
