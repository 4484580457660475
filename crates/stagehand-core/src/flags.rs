//! Resolved feature flags.

use serde::{Deserialize, Serialize};

use crate::Stage;

/// Feature flags resolved once by the configuration layer and read-only
/// during synthesis and composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Create a DNS record for each stage; requires DNS permissions.
    pub create_dns: bool,
    /// Substitute fake sibling-service endpoints (isolated environments only).
    pub fake_service_urls: bool,
    /// A live test server exists, so the QA stage gets a verification gate.
    pub has_test_server: bool,
    /// Gate progression between stages behind a manual approval.
    pub manual_approval: bool,
    /// The stage that runs external verification when `has_test_server` is set.
    pub qa_stage: String,
    /// Instance to start before QA runs, if the test server is stopped between runs.
    pub test_instance: Option<String>,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            create_dns: false,
            fake_service_urls: false,
            has_test_server: false,
            manual_approval: false,
            qa_stage: "test".to_string(),
            test_instance: None,
        }
    }
}

impl FeatureFlags {
    /// Whether a QA gate belongs in `stage`.
    pub fn qa_applies_to(&self, stage: &Stage) -> bool {
        self.has_test_server && stage.name() == self.qa_stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StageList;

    #[test]
    fn test_qa_only_for_designated_stage() {
        let stages = StageList::new(["test", "prod"]).unwrap();
        let flags = FeatureFlags {
            has_test_server: true,
            ..Default::default()
        };
        assert!(flags.qa_applies_to(stages.get("test").unwrap()));
        assert!(!flags.qa_applies_to(stages.get("prod").unwrap()));
    }

    #[test]
    fn test_qa_requires_test_server() {
        let stages = StageList::new(["test"]).unwrap();
        let flags = FeatureFlags::default();
        assert!(!flags.qa_applies_to(stages.get("test").unwrap()));
    }
}
