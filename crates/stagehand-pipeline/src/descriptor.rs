//! Build-stage descriptors.
//!
//! A descriptor wires one stage's build-and-deploy project to the shared
//! build identity and to both source artifacts. The commands it declares are
//! run by the external executor, never here.

use stagehand_core::artifact::ArtifactHandle;
use stagehand_core::build::{BuildEnvironment, BuildPhase, BuildProject, BuildSpec, Phase};
use stagehand_core::pipeline::NodeKind;
use stagehand_core::policy::IdentityProfile;
use stagehand_core::{FeatureFlags, Stage};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::composer::NodeDraft;

/// Action name of every build node.
pub const BUILD_ACTION: &str = "Build_and_Deploy";

/// Default executor image.
pub const DEFAULT_IMAGE: &str = "aws/codebuild/standard:2.0";

/// Error-reporting integration the post-build step notifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentrySettings {
    /// Parameter-store path of the auth token.
    pub token_path: String,
    pub org: String,
    pub project: String,
}

/// Per-pipeline settings shared by every build stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Prefix of every project name; the build-logging grant is scoped to it.
    pub project_prefix: String,
    pub image: String,
    pub contact: String,
    pub owner: String,
    pub sentry: Option<SentrySettings>,
    pub hostname_prefix: Option<String>,
    /// Stack exporting the domain the stages are published under.
    pub domain_stack: Option<String>,
}

impl BuildSettings {
    pub fn new(
        project_prefix: impl Into<String>,
        contact: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            project_prefix: project_prefix.into(),
            image: DEFAULT_IMAGE.to_string(),
            contact: contact.into(),
            owner: owner.into(),
            sentry: None,
            hostname_prefix: None,
            domain_stack: None,
        }
    }
}

/// One stage's build-and-deploy unit. Both source artifacts are required.
pub struct BuildStageDescriptor<'a> {
    stage: &'a Stage,
    identity: Arc<IdentityProfile>,
    settings: &'a BuildSettings,
    flags: &'a FeatureFlags,
    primary: ArtifactHandle,
    companion: ArtifactHandle,
}

impl<'a> BuildStageDescriptor<'a> {
    pub fn new(
        stage: &'a Stage,
        identity: Arc<IdentityProfile>,
        settings: &'a BuildSettings,
        flags: &'a FeatureFlags,
        primary: ArtifactHandle,
        companion: ArtifactHandle,
    ) -> Self {
        Self {
            stage,
            identity,
            settings,
            flags,
            primary,
            companion,
        }
    }

    pub fn project_name(&self) -> String {
        format!("{}-{}-build", self.settings.project_prefix, self.stage.name())
    }

    pub fn environment(&self) -> BuildEnvironment {
        let mut env = BuildEnvironment::new();
        env.plaintext("CI", "true");
        env.plaintext("STAGE", self.stage.name());
        env.plaintext("CONTACT", &self.settings.contact);
        env.plaintext("OWNER", &self.settings.owner);
        env.plaintext("CREATE_DNS", self.flags.create_dns.to_string());

        if let Some(sentry) = &self.settings.sentry {
            env.parameter("SENTRY_AUTH_TOKEN", &sentry.token_path);
            env.plaintext("SENTRY_ORG", &sentry.org);
            env.plaintext("SENTRY_PROJECT", &sentry.project);
        }
        if let Some(prefix) = &self.settings.hostname_prefix {
            env.plaintext("HOSTNAME_PREFIX", prefix);
        }
        if let Some(stack) = &self.settings.domain_stack {
            env.plaintext("DOMAIN_STACK_NAME", stack);
        }
        if self.flags.fake_service_urls {
            env.plaintext("FAKE_SERVICE_URLS", "true");
        }
        env
    }

    pub fn spec(&self) -> BuildSpec {
        let mut install = vec![
            "chmod -R 755 ./scripts/codebuild/*".to_string(),
            format!(
                "export BLUEPRINTS_DIR=\"$CODEBUILD_SRC_DIR_{}\"",
                self.companion.name()
            ),
            "./scripts/codebuild/install.sh".to_string(),
        ];
        let mut post_build = vec!["./scripts/codebuild/post_build.sh".to_string()];
        if self.settings.sentry.is_some() {
            install.push("yarn add @sentry/cli".to_string());
            post_build.push("yarn sentry-cli releases deploys \"$VERSION\" new -e \"$STAGE\"".to_string());
        }

        BuildSpec {
            runtimes: BTreeMap::from([("nodejs".to_string(), "12.x".to_string())]),
            phases: vec![
                BuildPhase {
                    phase: Phase::Install,
                    commands: install,
                },
                BuildPhase {
                    phase: Phase::PreBuild,
                    commands: vec![
                        "export VERSION=$(cat ./VERSION)".to_string(),
                        "./scripts/codebuild/pre_build.sh".to_string(),
                    ],
                },
                BuildPhase {
                    phase: Phase::Build,
                    commands: vec!["./scripts/codebuild/build.sh".to_string()],
                },
                BuildPhase {
                    phase: Phase::PostBuild,
                    commands: post_build,
                },
            ],
            artifacts: vec!["build/**/*".to_string()],
        }
    }

    pub fn project(&self) -> BuildProject {
        BuildProject {
            name: self.project_name(),
            stage: self.stage.name().to_string(),
            identity: Arc::clone(&self.identity),
            image: self.settings.image.clone(),
            environment: self.environment(),
            spec: self.spec(),
        }
    }

    /// The node handed to the stage assembly.
    pub fn into_draft(self) -> NodeDraft {
        let project = self.project();
        NodeDraft {
            action_name: BUILD_ACTION.to_string(),
            inputs: vec![self.primary, self.companion],
            included_by: None,
            kind: NodeKind::Build(project),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_core::build::EnvVarKind;
    use stagehand_core::{NodeId, StageList};

    fn identity() -> Arc<IdentityProfile> {
        Arc::new(IdentityProfile::new(
            "usurper-pipeline-main-build-role",
            "codebuild.amazonaws.com",
            vec![],
        ))
    }

    fn artifacts() -> (ArtifactHandle, ArtifactHandle) {
        let source = NodeId::new("Source", "Source");
        (
            ArtifactHandle::new("AppCode", source.clone()),
            ArtifactHandle::new("InfraCode", source),
        )
    }

    fn settings() -> BuildSettings {
        let mut settings = BuildSettings::new("usurper-pipeline-main", "ops@example.edu", "web");
        settings.sentry = Some(SentrySettings {
            token_path: "/all/sentry/token".to_string(),
            org: "example".to_string(),
            project: "usurper".to_string(),
        });
        settings.hostname_prefix = Some("usurper".to_string());
        settings.domain_stack = Some("library-domain".to_string());
        settings
    }

    #[test]
    fn test_environment() {
        let stages = StageList::new(["test"]).unwrap();
        let settings = settings();
        let flags = FeatureFlags::default();
        let (app, infra) = artifacts();
        let descriptor = BuildStageDescriptor::new(
            stages.get("test").unwrap(),
            identity(),
            &settings,
            &flags,
            app,
            infra,
        );

        let env = descriptor.environment();
        assert_eq!(env.value("STAGE"), Some("test"));
        assert_eq!(env.value("CI"), Some("true"));
        assert_eq!(env.value("CREATE_DNS"), Some("false"));
        assert_eq!(env.value("DOMAIN_STACK_NAME"), Some("library-domain"));
        assert_eq!(
            env.get("SENTRY_AUTH_TOKEN").unwrap().kind,
            EnvVarKind::ParameterStore
        );
        assert!(!env.contains("FAKE_SERVICE_URLS"));
    }

    #[test]
    fn test_fake_service_urls_only_when_flagged() {
        let stages = StageList::new(["prep"]).unwrap();
        let settings = BuildSettings::new("usurper-pipeline-prep", "ops@example.edu", "web");
        let flags = FeatureFlags {
            fake_service_urls: true,
            ..Default::default()
        };
        let (app, infra) = artifacts();
        let env = BuildStageDescriptor::new(
            stages.get("prep").unwrap(),
            identity(),
            &settings,
            &flags,
            app,
            infra,
        )
        .environment();

        assert_eq!(env.value("FAKE_SERVICE_URLS"), Some("true"));
        assert!(!env.contains("SENTRY_AUTH_TOKEN"));
    }

    #[test]
    fn test_draft_consumes_both_artifacts() {
        let stages = StageList::new(["test", "prod"]).unwrap();
        let settings = settings();
        let flags = FeatureFlags::default();
        let identity = identity();
        let (app, infra) = artifacts();

        let draft = BuildStageDescriptor::new(
            stages.get("prod").unwrap(),
            Arc::clone(&identity),
            &settings,
            &flags,
            app.clone(),
            infra.clone(),
        )
        .into_draft();

        assert_eq!(draft.inputs, vec![app, infra]);
        let NodeKind::Build(project) = &draft.kind else {
            panic!("expected a build node");
        };
        assert_eq!(project.name, "usurper-pipeline-main-prod-build");
        assert!(Arc::ptr_eq(&project.identity, &identity));
        assert!(
            project
                .spec
                .phase(Phase::Install)
                .unwrap()
                .commands
                .iter()
                .any(|c| c.contains("CODEBUILD_SRC_DIR_InfraCode"))
        );
    }
}
