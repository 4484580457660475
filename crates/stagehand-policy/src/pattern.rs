//! Resource pattern templates.
//!
//! A pattern is a template string with `${name}` placeholders:
//! - `${stage}` - the stage being scoped to
//! - `${account}` - account id
//! - `${region}` - region
//! - `${stack}` - stack owning the pipeline
//! - `${prefix}` - resource-name prefix of the service
//! - `${role}` - name of the build role
//! - `${<extra>}` - any extra value in the account context (e.g. `${zone}`)
//!
//! A placeholder that cannot be resolved is an error, never left in place.

use regex::Regex;
use stagehand_core::{AccountContext, Error, Result, Stage, StageList};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap());

// Characters that would turn a substituted value into a glob or path hop.
const WIDENING: &[char] = &['*', '?', '/', ':'];

/// A parameterized resource identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePattern {
    template: String,
}

impl ResourcePattern {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        PLACEHOLDER
            .captures_iter(&self.template)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Whether the pattern expands differently per stage.
    pub fn is_stage_scoped(&self) -> bool {
        self.placeholders().contains(&"stage")
    }

    /// Produce the concrete identifier for `stage`.
    ///
    /// Pass `None` for patterns that are not stage-scoped; a `${stage}`
    /// placeholder then fails like any other missing value.
    pub fn materialize(&self, stage: Option<&Stage>, ctx: &AccountContext) -> Result<String> {
        let mut out = String::with_capacity(self.template.len() + 32);
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&self.template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = name.as_str();
            let value = match name {
                "stage" => stage.map(|s| s.name()),
                other => ctx.lookup(other),
            }
            .ok_or_else(|| Error::UnresolvedPlaceholder {
                template: self.template.clone(),
                placeholder: name.to_string(),
            })?;

            if value.contains(WIDENING) {
                return Err(Error::InvalidParameter {
                    capability: self.template.clone(),
                    parameter: name.to_string(),
                    message: format!("value '{}' would widen the resource scope", value),
                });
            }

            out.push_str(&self.template[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }

        out.push_str(&self.template[last..]);
        Ok(out)
    }

    /// Materialize once per stage, in stage order.
    ///
    /// Fails if two stages produce the same identifier, since that would
    /// silently grant one stage's access to the other.
    pub fn materialize_each(&self, stages: &StageList, ctx: &AccountContext) -> Result<Vec<String>> {
        let mut seen: HashMap<String, &str> = HashMap::new();
        let mut resources = Vec::with_capacity(stages.len());

        for stage in stages {
            let resource = self.materialize(Some(stage), ctx)?;
            if let Some(first) = seen.insert(resource.clone(), stage.name()) {
                return Err(Error::TemplateCollision {
                    capability: self.template.clone(),
                    resource,
                    first: first.to_string(),
                    second: stage.name().to_string(),
                });
            }
            resources.push(resource);
        }

        Ok(resources)
    }
}

/// Whether the IAM-style glob `pattern` matches `resource`.
///
/// `*` matches any run of characters and `?` exactly one. A `*` inside
/// `resource` is compared literally, so one glob covering another is
/// detected as well.
pub fn covers(pattern: &str, resource: &str) -> bool {
    let (p, r) = (pattern.as_bytes(), resource.as_bytes());
    let (mut pi, mut ri) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ri < r.len() {
        if pi < p.len() && p[pi] == b'*' {
            star = Some((pi, ri));
            pi += 1;
        } else if pi < p.len() && (p[pi] == b'?' || p[pi] == r[ri]) {
            pi += 1;
            ri += 1;
        } else if let Some((star_pi, star_ri)) = star {
            pi = star_pi + 1;
            ri = star_ri + 1;
            star = Some((star_pi, star_ri + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == b'*')
}

impl std::fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AccountContext {
        AccountContext {
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
            stack_name: "usurper-pipeline-main".to_string(),
            service_prefix: "usurper".to_string(),
            role_name: "usurper-pipeline-main-build-role".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_materialize_stage_pattern() {
        let stages = StageList::new(["test"]).unwrap();
        let pattern = ResourcePattern::new("arn:aws:s3:::${prefix}-${stage}-${account}");
        let resource = pattern
            .materialize(stages.get("test"), &ctx())
            .unwrap();
        assert_eq!(resource, "arn:aws:s3:::usurper-test-123456789012");
        assert!(pattern.is_stage_scoped());
    }

    #[test]
    fn test_literal_globs_in_template_are_kept() {
        let pattern = ResourcePattern::new(
            "arn:aws:logs:${region}:${account}:log-group:/aws/codebuild/${stack}-*",
        );
        assert_eq!(
            pattern.materialize(None, &ctx()).unwrap(),
            "arn:aws:logs:us-east-1:123456789012:log-group:/aws/codebuild/usurper-pipeline-main-*"
        );
        assert!(!pattern.is_stage_scoped());
    }

    #[test]
    fn test_missing_placeholder_fails() {
        let pattern = ResourcePattern::new("arn:aws:route53:::hostedzone/${zone}");
        let err = pattern.materialize(None, &ctx()).unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvedPlaceholder { ref placeholder, .. } if placeholder == "zone"
        ));
    }

    #[test]
    fn test_stage_required_for_stage_pattern() {
        let pattern = ResourcePattern::new("arn:aws:ssm:${region}:${account}:parameter/all/${prefix}/${stage}/*");
        assert!(pattern.materialize(None, &ctx()).is_err());
    }

    #[test]
    fn test_widening_value_rejected() {
        let ctx = ctx().with_extra("zone", "*");
        let pattern = ResourcePattern::new("arn:aws:route53:::hostedzone/${zone}");
        assert!(matches!(
            pattern.materialize(None, &ctx),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_materialize_each_is_injective() {
        let stages = StageList::new(["test", "prod", "prep"]).unwrap();
        let pattern = ResourcePattern::new("arn:aws:iam::${account}:role/${prefix}-${stage}-*");
        let resources = pattern.materialize_each(&stages, &ctx()).unwrap();
        assert_eq!(resources.len(), 3);
        assert_eq!(resources[1], "arn:aws:iam::123456789012:role/usurper-prod-*");
    }

    #[test]
    fn test_collision_detected() {
        let stages = StageList::new(["test", "prod"]).unwrap();
        let pattern = ResourcePattern::new("arn:aws:s3:::${prefix}-${account}");
        let err = pattern.materialize_each(&stages, &ctx()).unwrap_err();
        match err {
            Error::TemplateCollision { first, second, .. } => {
                assert_eq!(first, "test");
                assert_eq!(second, "prod");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_covers() {
        let role = "arn:aws:iam::123456789012:role/usurper-prep-*";
        assert!(covers(role, "arn:aws:iam::123456789012:role/usurper-prep-web-role"));
        assert!(covers(role, "arn:aws:iam::123456789012:role/usurper-prep-"));
        assert!(!covers(role, "arn:aws:iam::123456789012:role/usurper-pipeline-prep-build-role"));
        assert!(covers("arn:aws:s3:::a?c", "arn:aws:s3:::abc"));
        assert!(covers("a*b*c", "axxbyyc"));
        assert!(!covers("a*b*c", "axxbyy"));
        assert!(covers("exact", "exact"));
        assert!(!covers("exact", "exactly"));
    }

    #[test]
    fn test_placeholders_listed_in_order() {
        let pattern = ResourcePattern::new("${region}/${account}/${stage}");
        assert_eq!(pattern.placeholders(), vec!["region", "account", "stage"]);
    }
}
