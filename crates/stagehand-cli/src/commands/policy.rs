//! Policy command.

use anyhow::Result;
use serde_json::json;
use std::path::Path;

use super::{Overrides, load, plans};

pub fn run(path: &Path, overrides: Overrides, pipeline: Option<&str>) -> Result<()> {
    let config = load(path, overrides)?;

    let output: Vec<_> = plans(&config, pipeline)?
        .iter()
        .map(|plan| {
            json!({
                "pipeline": plan.pipeline,
                "identity": plan.identity.as_ref(),
                "artifact_policy": plan.artifact_policy,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
