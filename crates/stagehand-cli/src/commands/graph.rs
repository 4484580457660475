//! Graph command.

use anyhow::Result;
use stagehand_core::artifact::ArtifactHandle;
use stagehand_core::pipeline::{NodeKind, PipelineGraph, SourceTrigger};
use std::fmt::Write;
use std::path::Path;

use super::{Overrides, load, plans};

pub fn run(path: &Path, overrides: Overrides, pipeline: Option<&str>) -> Result<()> {
    let config = load(path, overrides)?;
    for plan in plans(&config, pipeline)? {
        print!("{}", describe(&plan.graph)?);
    }
    Ok(())
}

fn names(artifacts: &[ArtifactHandle]) -> String {
    artifacts
        .iter()
        .map(|a| a.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Human-readable listing of a graph's stages and nodes.
pub fn describe(graph: &PipelineGraph) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{} (artifacts: {})", graph.name(), graph.artifact_store())?;

    for stage in graph.stages() {
        writeln!(out, "  {}", stage.name)?;
        for node in &stage.nodes {
            write!(out, "    {}. {} [{}]", node.run_order, node.action_name, node.kind.label())?;
            if !node.inputs.is_empty() {
                write!(out, " <- {}", names(&node.inputs))?;
            }
            if !node.outputs.is_empty() {
                write!(out, " -> {}", names(&node.outputs))?;
            }
            if let Some(flag) = &node.included_by {
                write!(out, " ({})", flag)?;
            }
            writeln!(out)?;

            match &node.kind {
                NodeKind::Source(intake) => {
                    for feed in [&intake.primary, &intake.companion] {
                        writeln!(
                            out,
                            "       {}/{}@{}",
                            feed.owner, feed.repo, feed.branch
                        )?;
                    }
                    if let SourceTrigger::FilteredWebhook { filters } = &intake.trigger {
                        for filter in filters {
                            writeln!(out, "       when {} == {}", filter.json_path, filter.match_equals)?;
                        }
                    }
                }
                NodeKind::Qa(project) => {
                    writeln!(out, "       target {}", project.endpoint)?;
                }
                NodeKind::Approval(action) => {
                    writeln!(
                        out,
                        "       notify {} ({} recipient(s))",
                        action.channel.topic,
                        action.channel.recipients.len()
                    )?;
                }
                NodeKind::Build(_) => {}
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_config::parse_deployment;
    use stagehand_pipeline::plan_pipeline;

    #[test]
    fn test_describe_lists_gates_in_order() {
        let config = parse_deployment(
            r#"
service "usurper" account="123456789012" region="us-east-1" contact="ops@example.edu" owner="web"
source owner="ndlib" token-path="/all/github/token" {
    app repo="usurper"
    blueprints repo="usurper-blueprints"
}
domain stack="library-domain" hostname-prefix="usurper" name="library.example.edu"
features has-test-server=#true approval=#true
notify {
    recipient "ops@example.edu"
}
pipeline "main" stage="test" stage="prod" trigger-tag="ci"
"#,
        )
        .unwrap();
        let plan = plan_pipeline(&config, config.pipeline("main").unwrap()).unwrap();
        let text = describe(&plan.graph).unwrap();

        let qa = text.find("2. QA [qa]").unwrap();
        let approval = text.find("3. ManualApprovalOfTestEnvironment").unwrap();
        assert!(qa < approval);
        assert!(text.contains("when $.ref == refs/tags/ci"));
        assert!(text.contains("target https://usurper-test.library.example.edu/"));
    }
}
