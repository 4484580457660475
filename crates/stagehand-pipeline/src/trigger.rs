//! Tag-creation trigger for the source intake.
//!
//! The source provider cannot express "start on tag creation" when the node
//! is declared, so the filter is set on the composed graph instead. A tag
//! push is recognised by its ref and by an all-zero `before` revision.

use stagehand_core::pipeline::{PipelineGraph, SourceTrigger, WebhookFilter};
use stagehand_core::{Error, Result};

use crate::composer::CompositionPatch;

/// `before` revision of a webhook payload for a newly created ref.
pub const ZERO_REVISION: &str = "0000000000000000000000000000000000000000";

/// Narrows the primary feed's webhook to the creation of one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCreationTrigger {
    tag: String,
}

impl TagCreationTrigger {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn filters(&self) -> Vec<WebhookFilter> {
        vec![
            WebhookFilter {
                json_path: "$.ref".to_string(),
                match_equals: format!("refs/tags/{}", self.tag),
            },
            WebhookFilter {
                json_path: "$.before".to_string(),
                match_equals: ZERO_REVISION.to_string(),
            },
        ]
    }
}

impl CompositionPatch for TagCreationTrigger {
    fn name(&self) -> &str {
        "tag-creation-trigger"
    }

    fn apply(&self, graph: &mut PipelineGraph) -> Result<()> {
        let intake = graph
            .source_intake_mut()
            .ok_or_else(|| Error::InvalidGraph("no source intake to narrow".to_string()))?;

        if !intake.primary.triggers {
            return Err(Error::InvalidGraph(format!(
                "source feed '{}' does not start the pipeline",
                intake.primary.action_name
            )));
        }

        intake.trigger = SourceTrigger::FilteredWebhook {
            filters: self.filters(),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_core::pipeline::PipelineStage;

    #[test]
    fn test_filters() {
        let filters = TagCreationTrigger::new("ci").filters();
        assert_eq!(filters[0].json_path, "$.ref");
        assert_eq!(filters[0].match_equals, "refs/tags/ci");
        assert_eq!(filters[1].json_path, "$.before");
        assert_eq!(filters[1].match_equals.len(), 40);
        assert!(filters[1].match_equals.chars().all(|c| c == '0'));
    }

    #[test]
    fn test_graph_without_source_rejected() {
        let mut graph = PipelineGraph::new(
            "p",
            "bucket",
            vec![PipelineStage {
                name: "Empty".to_string(),
                nodes: vec![],
            }],
        );
        assert!(matches!(
            TagCreationTrigger::new("ci").apply(&mut graph),
            Err(Error::InvalidGraph(_))
        ));
    }
}
