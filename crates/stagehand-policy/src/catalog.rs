//! Capabilities required by the shared build identity.

use stagehand_core::policy::Effect;
use stagehand_core::{AccountContext, FeatureFlags, StageList};

use crate::ResourcePattern;

/// How a capability's resources are scoped.
#[derive(Debug, Clone)]
pub enum Scope {
    /// Resources independent of the stage list.
    Fixed(Vec<ResourcePattern>),
    /// One resource per stage, plus resources shared by every stage.
    PerStage {
        pattern: ResourcePattern,
        shared: Vec<ResourcePattern>,
    },
    /// The control plane does not support resource-level scoping.
    Unscoped,
}

/// When a capability is part of the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Always,
    CreateDns,
    /// A QA gate in this pipeline that starts a stopped test instance.
    TestInstance,
}

impl Requirement {
    pub fn is_met(&self, flags: &FeatureFlags, stages: &StageList) -> bool {
        match self {
            Requirement::Always => true,
            Requirement::CreateDns => flags.create_dns,
            Requirement::TestInstance => {
                flags.test_instance.is_some() && stages.iter().any(|s| flags.qa_applies_to(s))
            }
        }
    }
}

/// One entry of the capability catalog.
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: &'static str,
    pub actions: Vec<&'static str>,
    pub effect: Effect,
    pub scope: Scope,
    pub requires: Requirement,
}

impl Capability {
    fn allow(name: &'static str, actions: &[&'static str], scope: Scope) -> Self {
        Self {
            name,
            actions: actions.to_vec(),
            effect: Effect::Allow,
            scope,
            requires: Requirement::Always,
        }
    }

    fn requires(mut self, requirement: Requirement) -> Self {
        self.requires = requirement;
        self
    }

    pub fn is_stage_parameterized(&self) -> bool {
        matches!(self.scope, Scope::PerStage { .. })
    }

    /// Statement id derived from the name: `build-logging` -> `BuildLogging`.
    pub fn sid(&self) -> String {
        self.name
            .split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect()
    }
}

fn fixed(templates: &[&str]) -> Scope {
    Scope::Fixed(templates.iter().map(|t| ResourcePattern::new(*t)).collect())
}

fn per_stage(template: &str) -> Scope {
    Scope::PerStage {
        pattern: ResourcePattern::new(template),
        shared: Vec::new(),
    }
}

/// The capability catalog for the build identity, in emission order.
///
/// The third-party integration path under the parameter store is only added
/// when the context names an `integration`.
pub fn build_role_catalog(ctx: &AccountContext) -> Vec<Capability> {
    let mut parameter_shared = Vec::new();
    if ctx.lookup("integration").is_some() {
        parameter_shared.push(ResourcePattern::new(
            "arn:aws:ssm:${region}:${account}:parameter/all/${integration}/*",
        ));
    }

    vec![
        Capability::allow(
            "role-introspection",
            &["iam:GetRolePolicy"],
            fixed(&["arn:aws:iam::${account}:role/${role}"]),
        ),
        Capability::allow(
            "service-role-management",
            &[
                "iam:GetRole",
                "iam:CreateRole",
                "iam:DeleteRole",
                "iam:DeleteRolePolicy",
                "iam:AttachRolePolicy",
                "iam:DetachRolePolicy",
                "iam:PutRolePolicy",
                "iam:PassRole",
            ],
            per_stage("arn:aws:iam::${account}:role/${prefix}-${stage}-*"),
        ),
        Capability::allow(
            "build-logging",
            &["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
            fixed(&["arn:aws:logs:${region}:${account}:log-group:/aws/codebuild/${stack}-*"]),
        ),
        Capability::allow(
            "artifact-storage",
            &["s3:ListBucket", "s3:GetObject", "s3:PutObject"],
            fixed(&[
                "arn:aws:s3:::${artifact_bucket}",
                "arn:aws:s3:::${artifact_bucket}/*",
                "arn:aws:s3:::cdktoolkit-stagingbucket-*",
            ]),
        ),
        Capability::allow(
            "stack-management",
            &[
                "cloudformation:DescribeStacks",
                "cloudformation:DescribeStackEvents",
                "cloudformation:DescribeChangeSet",
                "cloudformation:CreateChangeSet",
                "cloudformation:ExecuteChangeSet",
                "cloudformation:DeleteChangeSet",
                "cloudformation:DeleteStack",
                "cloudformation:GetTemplate",
            ],
            per_stage("arn:aws:cloudformation:${region}:${account}:stack/${prefix}-${stage}/*"),
        ),
        Capability::allow(
            "toolkit-stack-read",
            &["cloudformation:DescribeStacks"],
            fixed(&["arn:aws:cloudformation:${region}:${account}:stack/CDKToolkit/*"]),
        ),
        Capability::allow("export-listing", &["cloudformation:ListExports"], Scope::Unscoped),
        Capability::allow(
            "environment-buckets",
            &[
                "s3:CreateBucket",
                "s3:DeleteBucket",
                "s3:ListBucket",
                "s3:GetBucketLocation",
                "s3:GetBucketPolicy",
                "s3:PutBucketPolicy",
                "s3:DeleteBucketPolicy",
                "s3:PutBucketLogging",
                "s3:PutBucketTagging",
            ],
            per_stage("arn:aws:s3:::${prefix}-${stage}-${account}"),
        ),
        Capability::allow(
            "environment-bucket-objects",
            &[
                "s3:GetObject",
                "s3:PutObject",
                "s3:PutObjectAcl",
                "s3:DeleteObject",
            ],
            per_stage("arn:aws:s3:::${prefix}-${stage}-${account}/*"),
        ),
        Capability::allow(
            "cdn-distribution",
            &[
                "cloudfront:GetDistribution",
                "cloudfront:CreateDistribution",
                "cloudfront:UpdateDistribution",
                "cloudfront:TagResource",
                "cloudfront:CreateInvalidation",
            ],
            Scope::Unscoped,
        ),
        Capability::allow(
            "dns-zone",
            &[
                "route53:GetHostedZone",
                "route53:ListResourceRecordSets",
                "route53:ChangeResourceRecordSets",
            ],
            fixed(&["arn:aws:route53:::hostedzone/${zone}"]),
        )
        .requires(Requirement::CreateDns),
        Capability::allow(
            "test-instance-control",
            &["ec2:StartInstances"],
            fixed(&["arn:aws:ec2:${region}:${account}:instance/${test_instance}"]),
        )
        .requires(Requirement::TestInstance),
        Capability::allow(
            "parameter-store",
            &["ssm:GetParameter", "ssm:GetParameters"],
            Scope::PerStage {
                pattern: ResourcePattern::new(
                    "arn:aws:ssm:${region}:${account}:parameter/all/${prefix}/${stage}/*",
                ),
                shared: parameter_shared,
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_are_unique() {
        let catalog = build_role_catalog(&AccountContext::default());
        let mut names: Vec<_> = catalog.iter().map(|c| c.name).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn test_per_stage_patterns_reference_stage() {
        for capability in build_role_catalog(&AccountContext::default()) {
            if let Scope::PerStage { pattern, .. } = &capability.scope {
                assert!(pattern.is_stage_scoped(), "{} is not stage-scoped", capability.name);
            }
        }
    }

    #[test]
    fn test_integration_path_is_optional() {
        let without = build_role_catalog(&AccountContext::default());
        let with = build_role_catalog(&AccountContext::default().with_extra("integration", "sentry"));

        let shared = |catalog: &[Capability]| match &catalog.last().unwrap().scope {
            Scope::PerStage { shared, .. } => shared.len(),
            _ => panic!("parameter-store must be stage-scoped"),
        };
        assert_eq!(shared(&without), 0);
        assert_eq!(shared(&with), 1);
    }

    #[test]
    fn test_dns_requires_flag() {
        let catalog = build_role_catalog(&AccountContext::default());
        let stages = StageList::new(["test"]).unwrap();
        let dns = catalog.iter().find(|c| c.name == "dns-zone").unwrap();
        assert!(!dns.requires.is_met(&FeatureFlags::default(), &stages));
        assert!(dns.requires.is_met(
            &FeatureFlags {
                create_dns: true,
                ..Default::default()
            },
            &stages
        ));
    }

    #[test]
    fn test_instance_control_requires_test_server_and_instance() {
        let catalog = build_role_catalog(&AccountContext::default());
        let stages = StageList::new(["test", "prod"]).unwrap();
        let control = catalog
            .iter()
            .find(|c| c.name == "test-instance-control")
            .unwrap();
        let instance_only = FeatureFlags {
            test_instance: Some("i-0abc".to_string()),
            ..Default::default()
        };
        assert!(!control.requires.is_met(&instance_only, &stages));
        assert!(control.requires.is_met(
            &FeatureFlags {
                has_test_server: true,
                ..instance_only
            },
            &stages
        ));
    }

    #[test]
    fn test_instance_control_follows_qa_stage() {
        let catalog = build_role_catalog(&AccountContext::default());
        let control = catalog
            .iter()
            .find(|c| c.name == "test-instance-control")
            .unwrap();
        let flags = FeatureFlags {
            has_test_server: true,
            test_instance: Some("i-0abc".to_string()),
            ..Default::default()
        };
        let prep = StageList::new(["prep"]).unwrap();
        assert!(!control.requires.is_met(&flags, &prep));

        let staging = FeatureFlags {
            qa_stage: "prep".to_string(),
            ..flags
        };
        assert!(control.requires.is_met(&staging, &prep));
    }

    #[test]
    fn test_sid() {
        let catalog = build_role_catalog(&AccountContext::default());
        assert_eq!(catalog[0].sid(), "RoleIntrospection");
    }
}
