//! Emission pass for Stagehand.
//!
//! Walks a validated [`DeploymentPlan`](stagehand_pipeline::DeploymentPlan)
//! and declares its resources through an
//! [`InfrastructureProvider`](stagehand_core::provider::InfrastructureProvider).

pub mod manifest;
pub mod renderer;

pub use manifest::ManifestProvider;
pub use renderer::{PIPELINE_SERVICE_PRINCIPAL, RenderReport, Renderer};
