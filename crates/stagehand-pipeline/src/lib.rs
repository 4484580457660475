//! Pipeline composition for Stagehand.
//!
//! Turns a stage list, the resolved feature flags and a synthesized build
//! identity into a validated [`PipelineGraph`](stagehand_core::pipeline::PipelineGraph):
//! one source intake, then per stage a build, an optional QA gate and an
//! optional approval gate.

pub mod composer;
pub mod descriptor;
pub mod gates;
pub mod plan;
pub mod trigger;

pub use composer::{CompositionPatch, NodeDraft, PipelineComposer, SourceSettings, StageAssembly};
pub use descriptor::{BuildSettings, BuildStageDescriptor, SentrySettings};
pub use gates::{ApprovalGate, HostnameEndpoint, QaGate};
pub use plan::{DeploymentPlan, plan_all, plan_pipeline};
pub use trigger::TagCreationTrigger;
