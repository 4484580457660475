//! Resource policy for the pipeline's artifact store.

use stagehand_core::Result;
use stagehand_core::policy::ResourcePolicy;

use crate::StatementBuilder;

/// Deny any request to the artifact store's objects that is not made over a
/// secure transport.
pub fn artifact_store_policy(bucket: &str) -> Result<ResourcePolicy> {
    let deny_insecure = StatementBuilder::deny(["s3:*"])
        .sid("DenyInsecureTransport")
        .principal("*")
        .condition("Bool", "aws:SecureTransport", serde_json::Value::Bool(false))
        .resource(format!("arn:aws:s3:::{bucket}/*"))
        .build()?;

    Ok(ResourcePolicy {
        statements: vec![deny_insecure],
    })
}
