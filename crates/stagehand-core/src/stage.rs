//! Deployment stages.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::{Error, Result};

// Stage names are substituted into resource patterns. Hyphens are excluded so
// a `<prefix>-<stage>-*` glob for one stage can never reach into another.
static STAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]{0,31}$").unwrap());

/// A named deployment environment (e.g. "test", "prod", "prep").
///
/// Only constructed through [`StageList`], which validates the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Stage {
    name: String,
    position: usize,
}

impl Stage {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zero-based position in the pipeline.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Name with the first letter upper-cased, used for pipeline stage names
    /// such as `DeployToTest`.
    pub fn title(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Ordered list of stages for one synthesis run.
///
/// An empty list is representable; whether that is acceptable is decided by
/// the consumer (the policy synthesizer rejects it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct StageList(Vec<Stage>);

impl StageList {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut stages = Vec::new();

        for (position, name) in names.into_iter().enumerate() {
            let name = name.as_ref();
            if !STAGE_NAME.is_match(name) {
                return Err(Error::InvalidStage(format!(
                    "'{}' must be lowercase alphanumeric and start with a letter",
                    name
                )));
            }
            if !seen.insert(name.to_string()) {
                return Err(Error::InvalidStage(format!("'{}' is listed twice", name)));
            }
            stages.push(Stage {
                name: name.to_string(),
                position,
            });
        }

        Ok(Self(stages))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stage> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Stage> {
        self.0.iter().find(|s| s.name == name)
    }

    /// The stage after `stage`, if any.
    pub fn next(&self, stage: &Stage) -> Option<&Stage> {
        self.0.get(stage.position + 1)
    }

    pub fn is_last(&self, stage: &Stage) -> bool {
        stage.position + 1 == self.0.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|s| s.name.as_str()).collect()
    }
}

impl TryFrom<Vec<String>> for StageList {
    type Error = Error;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(names)
    }
}

impl From<StageList> for Vec<String> {
    fn from(stages: StageList) -> Self {
        stages.0.into_iter().map(|s| s.name).collect()
    }
}

impl<'a> IntoIterator for &'a StageList {
    type Item = &'a Stage;
    type IntoIter = std::slice::Iter<'a, Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
