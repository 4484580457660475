//! KDL deployment configuration for Stagehand.
//!
//! This crate parses a deployment file (`stagehand.kdl`) and resolves it into
//! the already-validated inputs the synthesizer consumes: stage lists, feature
//! flags and the account context.

pub mod deployment;
pub mod error;

pub use deployment::{
    DeploymentConfig, DomainConfig, PipelineConfig, RepoConfig, SentryConfig, ServiceConfig,
    SourceConfig, parse_deployment,
};
pub use error::{ConfigError, ConfigResult};
