//! Core domain types and traits for the Stagehand synthesizer.
//!
//! This crate contains:
//! - Stage identifiers and the ordered stage list
//! - Resolved feature flags and account context
//! - Permission statements and identity profiles
//! - Artifact handles and the pipeline graph intermediate representation
//! - Build environment, secret and notification descriptions
//! - The infrastructure provider trait used by the emission pass

pub mod account;
pub mod artifact;
pub mod build;
pub mod digest;
pub mod error;
pub mod flags;
pub mod id;
pub mod notification;
pub mod pipeline;
pub mod policy;
pub mod provider;
pub mod secret;
pub mod stage;

pub use account::AccountContext;
pub use error::{Error, Result};
pub use flags::FeatureFlags;
pub use id::NodeId;
pub use stage::{Stage, StageList};
