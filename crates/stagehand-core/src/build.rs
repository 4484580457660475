//! Build project descriptions.
//!
//! A build project is what an external executor runs for one pipeline action:
//! an identity, an environment, and the declared instruction phases. The
//! instructions are declared here, never executed.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

use crate::policy::IdentityProfile;

/// How an environment variable value is delivered to the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvVarKind {
    /// The value is the literal string.
    Plaintext,
    /// The value is a parameter-store path resolved at run time.
    ParameterStore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub value: String,
    #[serde(rename = "type")]
    pub kind: EnvVarKind,
}

/// Environment variables for a build, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildEnvironment(BTreeMap<String, EnvVar>);

impl BuildEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plaintext(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(
            name.into(),
            EnvVar {
                value: value.into(),
                kind: EnvVarKind::Plaintext,
            },
        );
    }

    pub fn parameter(&mut self, name: impl Into<String>, path: impl Into<String>) {
        self.0.insert(
            name.into(),
            EnvVar {
                value: path.into(),
                kind: EnvVarKind::ParameterStore,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&EnvVar> {
        self.0.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|v| v.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EnvVar)> {
        self.0.iter()
    }
}

/// Lifecycle phase of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Install,
    PreBuild,
    Build,
    PostBuild,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPhase {
    pub phase: Phase,
    pub commands: Vec<String>,
}

/// Declared instructions for an external executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Runtime versions required by the install phase (e.g. `nodejs` -> `12.x`).
    pub runtimes: BTreeMap<String, String>,
    pub phases: Vec<BuildPhase>,
    /// Output file globs.
    pub artifacts: Vec<String>,
}

impl BuildSpec {
    pub fn phase(&self, phase: Phase) -> Option<&BuildPhase> {
        self.phases.iter().find(|p| p.phase == phase)
    }
}

pub(crate) fn serialize_identity<S>(
    identity: &Arc<IdentityProfile>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(identity.name())
}

/// Build and deploy unit for one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildProject {
    /// Project name, unique within the pipeline.
    pub name: String,
    /// Deployment stage the project builds.
    pub stage: String,
    #[serde(rename = "role", serialize_with = "serialize_identity")]
    pub identity: Arc<IdentityProfile>,
    pub image: String,
    pub environment: BuildEnvironment,
    pub spec: BuildSpec,
}

/// Verification project run against a stage's live endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaProject {
    pub name: String,
    pub stage: String,
    #[serde(rename = "role", serialize_with = "serialize_identity")]
    pub identity: Arc<IdentityProfile>,
    pub image: String,
    pub endpoint: Url,
    pub environment: BuildEnvironment,
    pub spec: BuildSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_is_ordered_and_typed() {
        let mut env = BuildEnvironment::new();
        env.plaintext("STAGE", "test");
        env.parameter("SENTRY_AUTH_TOKEN", "/all/sentry/token");
        env.plaintext("CI", "true");

        let names: Vec<_> = env.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["CI", "SENTRY_AUTH_TOKEN", "STAGE"]);
        assert_eq!(
            env.get("SENTRY_AUTH_TOKEN").unwrap().kind,
            EnvVarKind::ParameterStore
        );

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["STAGE"]["type"], "PLAINTEXT");
        assert_eq!(json["SENTRY_AUTH_TOKEN"]["type"], "PARAMETER_STORE");
    }

    #[test]
    fn test_project_serializes_role_by_name() {
        let identity = Arc::new(IdentityProfile::new(
            "pipeline-build-role",
            "codebuild.amazonaws.com",
            vec![],
        ));
        let project = BuildProject {
            name: "TestBuildProject".to_string(),
            stage: "test".to_string(),
            identity,
            image: "aws/codebuild/standard:2.0".to_string(),
            environment: BuildEnvironment::new(),
            spec: BuildSpec::default(),
        };
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["role"], "pipeline-build-role");
    }
}
