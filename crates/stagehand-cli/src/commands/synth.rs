//! Synth command.

use anyhow::Result;
use serde_json::json;
use stagehand_render::{ManifestProvider, Renderer};
use std::path::Path;

use super::{Overrides, load, plans};

pub async fn run(
    path: &Path,
    overrides: Overrides,
    pipeline: Option<&str>,
    fingerprint_only: bool,
) -> Result<()> {
    let config = load(path, overrides)?;
    let plans = plans(&config, pipeline)?;

    let mut output = Vec::with_capacity(plans.len());
    for plan in &plans {
        let fingerprint = plan.fingerprint()?;
        if fingerprint_only {
            println!("{}  {}", fingerprint, plan.pipeline);
            continue;
        }

        let renderer = Renderer::new(ManifestProvider::new());
        renderer.render(plan).await?;
        output.push(json!({
            "pipeline": plan.pipeline,
            "stack": plan.stack_name,
            "fingerprint": fingerprint,
            "manifest": renderer.provider().manifest().await,
        }));
    }

    if !fingerprint_only {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}
