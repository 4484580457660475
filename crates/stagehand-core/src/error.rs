//! Error types for Stagehand.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("capability '{capability}' has no stages to scope to")]
    EmptyStageList { capability: String },

    #[error("capability '{capability}' is missing required parameter '{parameter}'")]
    MissingParameter {
        capability: String,
        parameter: String,
    },

    #[error("capability '{capability}' has invalid parameter '{parameter}': {message}")]
    InvalidParameter {
        capability: String,
        parameter: String,
        message: String,
    },

    #[error("invalid stage: {0}")]
    InvalidStage(String),

    #[error("template '{template}' has unresolved placeholder '{placeholder}'")]
    UnresolvedPlaceholder {
        template: String,
        placeholder: String,
    },

    #[error(
        "capability '{capability}' materializes '{resource}' for both stage '{first}' and stage '{second}'"
    )]
    TemplateCollision {
        capability: String,
        resource: String,
        first: String,
        second: String,
    },

    #[error("capability '{capability}' grants '{resource}', which covers pipeline resource '{owned}'")]
    ScopeOverlap {
        capability: String,
        resource: String,
        owned: String,
    },

    #[error("composition order violation in stage '{stage}': {message}")]
    CompositionOrder { stage: String, message: String },

    #[error("invalid pipeline graph: {0}")]
    InvalidGraph(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Attribute a failure raised by a resource pattern to the capability
    /// that was being synthesized.
    pub fn for_capability(self, capability: &str) -> Self {
        match self {
            Error::UnresolvedPlaceholder { placeholder, .. } => Error::MissingParameter {
                capability: capability.to_string(),
                parameter: placeholder,
            },
            Error::InvalidParameter {
                parameter, message, ..
            } => Error::InvalidParameter {
                capability: capability.to_string(),
                parameter,
                message,
            },
            Error::TemplateCollision {
                resource,
                first,
                second,
                ..
            } => Error::TemplateCollision {
                capability: capability.to_string(),
                resource,
                first,
                second,
            },
            other => other,
        }
    }

    /// True for errors caused by missing or invalid configuration input.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::EmptyStageList { .. }
                | Error::MissingParameter { .. }
                | Error::InvalidParameter { .. }
                | Error::InvalidStage(_)
                | Error::ScopeOverlap { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_error_attributed_to_capability() {
        let err = Error::UnresolvedPlaceholder {
            template: "arn:aws:route53:::hostedzone/${zone}".to_string(),
            placeholder: "zone".to_string(),
        }
        .for_capability("dns-zone");

        match err {
            Error::MissingParameter {
                capability,
                parameter,
            } => {
                assert_eq!(capability, "dns-zone");
                assert_eq!(parameter, "zone");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = Error::InvalidGraph("two sources".to_string()).for_capability("logging");
        assert!(matches!(err, Error::InvalidGraph(_)));
        assert!(!err.is_configuration());
    }
}
