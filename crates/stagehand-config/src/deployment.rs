//! Deployment configuration parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use stagehand_core::{AccountContext, FeatureFlags, StageList};
use tracing::debug;

/// The service being deployed and the account it lives in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name; also the resource-name prefix.
    pub name: String,
    pub account: String,
    pub region: String,
    pub contact: String,
    pub owner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub repo: String,
    pub branch: String,
}

/// Where the application and its blueprints come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub owner: String,
    /// Secret path of the source-control token.
    pub token_path: String,
    pub app: RepoConfig,
    pub blueprints: RepoConfig,
}

/// Error-reporting integration used by the build's post-build step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentryConfig {
    /// Parameter-store path of the auth token.
    pub token_path: String,
    pub org: String,
    pub project: String,
}

/// External domain the stages are published under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Stack exporting the domain name, certificate and zone.
    pub stack: String,
    pub hostname_prefix: String,
    pub zone_id: Option<String>,
    pub name: String,
}

/// One pipeline: its stage list and source overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub stages: StageList,
    /// Overrides the application branch (e.g. the prep pipeline reads `prep`).
    pub app_branch: Option<String>,
    /// Only a tag with this name starts the pipeline.
    pub trigger_tag: Option<String>,
    /// Overrides the global `fake-service-urls` flag.
    pub fake_service_urls: Option<bool>,
}

/// A parsed deployment file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub service: ServiceConfig,
    pub source: SourceConfig,
    pub sentry: Option<SentryConfig>,
    pub domain: Option<DomainConfig>,
    pub features: FeatureFlags,
    pub recipients: Vec<String>,
    pub pipelines: Vec<PipelineConfig>,
}

impl DeploymentConfig {
    /// Read and parse a deployment file.
    pub fn load(path: impl AsRef<std::path::Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        parse_deployment(&content)
    }

    pub fn pipeline(&self, name: &str) -> ConfigResult<&PipelineConfig> {
        self.pipelines
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ConfigError::UnknownPipeline(name.to_string()))
    }

    /// Replace the account and/or region, e.g. from command-line flags.
    pub fn with_overrides(mut self, account: Option<String>, region: Option<String>) -> Self {
        if let Some(account) = account {
            self.service.account = account;
        }
        if let Some(region) = region {
            self.service.region = region;
        }
        self
    }

    /// Name of the stack that owns a pipeline and its build role.
    pub fn stack_name(&self, pipeline: &PipelineConfig) -> String {
        format!("{}-pipeline-{}", self.service.name, pipeline.name)
    }

    /// Artifact store for a pipeline. Each pipeline gets its own.
    pub fn artifact_store(&self, pipeline: &PipelineConfig) -> String {
        format!(
            "{}-{}-artifacts-{}",
            self.service.name, pipeline.name, self.service.account
        )
    }

    /// Feature flags as seen by one pipeline.
    pub fn flags_for(&self, pipeline: &PipelineConfig) -> FeatureFlags {
        let mut flags = self.features.clone();
        if let Some(fake) = pipeline.fake_service_urls {
            flags.fake_service_urls = fake;
        }
        flags
    }

    /// Placeholder values for one pipeline's resource patterns.
    pub fn account_context(&self, pipeline: &PipelineConfig) -> AccountContext {
        let stack_name = self.stack_name(pipeline);
        let mut ctx = AccountContext {
            account_id: self.service.account.clone(),
            region: self.service.region.clone(),
            role_name: format!("{}-build-role", stack_name),
            stack_name,
            service_prefix: self.service.name.clone(),
            ..Default::default()
        }
        .with_extra("artifact_bucket", self.artifact_store(pipeline));

        if let Some(zone) = self.domain.as_ref().and_then(|d| d.zone_id.clone()) {
            ctx = ctx.with_extra("zone", zone);
        }
        if let Some(instance) = &self.features.test_instance {
            ctx = ctx.with_extra("test_instance", instance.clone());
        }
        if self.sentry.is_some() {
            ctx = ctx.with_extra("integration", "sentry");
        }
        ctx
    }
}

/// Parse a deployment configuration from KDL text.
pub fn parse_deployment(kdl: &str) -> ConfigResult<DeploymentConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut service = None;
    let mut source = None;
    let mut sentry = None;
    let mut domain = None;
    let mut features = FeatureFlags::default();
    let mut recipients = Vec::new();
    let mut pipelines: Vec<PipelineConfig> = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "service" => service = Some(parse_service(node)?),
            "source" => source = Some(parse_source(node)?),
            "sentry" => {
                sentry = Some(SentryConfig {
                    token_path: require_string_prop(node, "token-path", "sentry")?,
                    org: require_string_prop(node, "org", "sentry")?,
                    project: require_string_prop(node, "project", "sentry")?,
                });
            }
            "domain" => {
                domain = Some(DomainConfig {
                    stack: require_string_prop(node, "stack", "domain")?,
                    hostname_prefix: require_string_prop(node, "hostname-prefix", "domain")?,
                    zone_id: get_string_prop(node, "zone-id"),
                    name: require_string_prop(node, "name", "domain")?,
                });
            }
            "features" => features = parse_features(node),
            "notify" => recipients.extend(get_string_list_prop(node, "recipient")),
            "pipeline" => {
                let pipeline = parse_pipeline(node)?;
                if pipelines.iter().any(|p| p.name == pipeline.name) {
                    return Err(ConfigError::Duplicate(format!("pipeline '{}'", pipeline.name)));
                }
                pipelines.push(pipeline);
            }
            other => debug!(node = other, "Ignoring unknown configuration node"),
        }
    }

    let service = service.ok_or_else(|| ConfigError::MissingField("service".to_string()))?;
    let source = source.ok_or_else(|| ConfigError::MissingField("source".to_string()))?;
    if pipelines.is_empty() {
        return Err(ConfigError::MissingField("pipeline".to_string()));
    }

    if features.create_dns {
        match &domain {
            Some(d) if d.zone_id.is_some() => {}
            _ => {
                return Err(ConfigError::MissingField(
                    "domain zone-id (required by create-dns)".to_string(),
                ));
            }
        }
    }
    if features.has_test_server && domain.is_none() {
        return Err(ConfigError::MissingField(
            "domain (required by has-test-server)".to_string(),
        ));
    }
    if features.manual_approval && recipients.is_empty() {
        return Err(ConfigError::MissingField(
            "notify recipient (required by approval)".to_string(),
        ));
    }

    Ok(DeploymentConfig {
        service,
        source,
        sentry,
        domain,
        features,
        recipients,
        pipelines,
    })
}

fn parse_service(node: &KdlNode) -> ConfigResult<ServiceConfig> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("service name".to_string()))?;

    Ok(ServiceConfig {
        name,
        account: get_string_prop(node, "account").unwrap_or_default(),
        region: get_string_prop(node, "region").unwrap_or_default(),
        contact: require_string_prop(node, "contact", "service")?,
        owner: require_string_prop(node, "owner", "service")?,
    })
}

fn parse_source(node: &KdlNode) -> ConfigResult<SourceConfig> {
    let owner = require_string_prop(node, "owner", "source")?;
    let token_path = require_string_prop(node, "token-path", "source")?;

    let mut app = None;
    let mut blueprints = None;
    if let Some(children) = node.children() {
        for child in children.nodes() {
            let repo = || -> ConfigResult<RepoConfig> {
                Ok(RepoConfig {
                    repo: require_string_prop(child, "repo", child.name().value())?,
                    branch: get_string_prop(child, "branch").unwrap_or_else(|| "master".to_string()),
                })
            };
            match child.name().value() {
                "app" => app = Some(repo()?),
                "blueprints" => blueprints = Some(repo()?),
                _ => {}
            }
        }
    }

    Ok(SourceConfig {
        owner,
        token_path,
        app: app.ok_or_else(|| ConfigError::MissingField("source app".to_string()))?,
        blueprints: blueprints
            .ok_or_else(|| ConfigError::MissingField("source blueprints".to_string()))?,
    })
}

fn parse_features(node: &KdlNode) -> FeatureFlags {
    let defaults = FeatureFlags::default();
    FeatureFlags {
        create_dns: get_bool_prop(node, "create-dns").unwrap_or(defaults.create_dns),
        fake_service_urls: get_bool_prop(node, "fake-service-urls")
            .unwrap_or(defaults.fake_service_urls),
        has_test_server: get_bool_prop(node, "has-test-server")
            .unwrap_or(defaults.has_test_server),
        manual_approval: get_bool_prop(node, "approval").unwrap_or(defaults.manual_approval),
        qa_stage: get_string_prop(node, "qa-stage").unwrap_or(defaults.qa_stage),
        test_instance: get_string_prop(node, "test-instance"),
    }
}

fn parse_pipeline(node: &KdlNode) -> ConfigResult<PipelineConfig> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("pipeline name".to_string()))?;

    let stage_names = get_string_list_prop(node, "stage");
    let stages = StageList::new(&stage_names)?;

    Ok(PipelineConfig {
        name,
        stages,
        app_branch: get_string_prop(node, "branch"),
        trigger_tag: get_string_prop(node, "trigger-tag"),
        fake_service_urls: get_bool_prop(node, "fake-service-urls"),
    })
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn require_string_prop(node: &KdlNode, name: &str, owner: &str) -> ConfigResult<String> {
    get_string_prop(node, name)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingField(format!("{} {}", owner, name)))
}

fn get_bool_prop(node: &KdlNode, name: &str) -> Option<bool> {
    node.get(name).and_then(|v| v.as_bool())
}

fn get_string_list_prop(node: &KdlNode, name: &str) -> Vec<String> {
    let mut result = Vec::new();

    // Repeated properties: stage="test" stage="prod"
    for entry in node.entries() {
        if let Some(entry_name) = entry.name() {
            if entry_name.value() == name {
                if let Some(s) = entry.value().as_string() {
                    result.push(s.to_string());
                }
            }
        }
    }

    if !result.is_empty() {
        return result;
    }

    // Block syntax: each matching child contributes its arguments
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == name {
                result.extend(get_all_string_args(child));
            }
        }
    }

    result
}
