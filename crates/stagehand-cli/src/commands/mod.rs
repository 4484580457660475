//! CLI command implementations.

pub mod graph;
pub mod policy;
pub mod synth;

use anyhow::{Context, Result};
use stagehand_config::DeploymentConfig;
use stagehand_pipeline::{DeploymentPlan, plan_all, plan_pipeline};
use stagehand_render::{ManifestProvider, Renderer};
use std::path::Path;
use tracing::debug;

/// Account and region given on the command line or in the environment.
pub struct Overrides {
    pub account: Option<String>,
    pub region: Option<String>,
}

pub fn load(path: &Path, overrides: Overrides) -> Result<DeploymentConfig> {
    debug!(path = %path.display(), "Loading deployment configuration");
    let config = DeploymentConfig::load(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(config.with_overrides(overrides.account, overrides.region))
}

/// Plan one named pipeline, or all of them.
pub fn plans(config: &DeploymentConfig, pipeline: Option<&str>) -> Result<Vec<DeploymentPlan>> {
    match pipeline {
        Some(name) => {
            let pipeline = config.pipeline(name)?;
            let plan = plan_pipeline(config, pipeline)
                .with_context(|| format!("failed to plan pipeline '{}'", name))?;
            Ok(vec![plan])
        }
        None => Ok(plan_all(config)?),
    }
}

/// Plan and render every pipeline, returning how many there are.
pub async fn check(config: &DeploymentConfig) -> Result<usize> {
    let plans = plans(config, None)?;
    for plan in &plans {
        Renderer::new(ManifestProvider::new())
            .render(plan)
            .await
            .with_context(|| format!("failed to render pipeline '{}'", plan.pipeline))?;
    }
    Ok(plans.len())
}

pub async fn validate(path: &Path, overrides: Overrides) {
    let result = match load(path, overrides) {
        Ok(config) => check(&config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(count) => {
            println!("Configuration is valid ({} pipeline(s))", count);
        }
        Err(e) => {
            println!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    }
}
