//! Permission synthesis for Stagehand.
//!
//! Expands an ordered stage list into resource patterns and assembles them
//! into the minimal statement set for the shared build identity:
//! - [`pattern`]: resource pattern templates and their materialization
//! - [`statement`]: incremental statement builders
//! - [`catalog`]: the capabilities a build identity needs
//! - [`synthesizer`]: stage-list + flags -> identity profile
//! - [`resource_policy`]: the artifact store's own policy

pub mod catalog;
pub mod pattern;
pub mod resource_policy;
pub mod statement;
pub mod synthesizer;

pub use catalog::{Capability, Requirement, Scope, build_role_catalog};
pub use pattern::{ResourcePattern, covers};
pub use resource_policy::artifact_store_policy;
pub use statement::StatementBuilder;
pub use synthesizer::PolicySynthesizer;
