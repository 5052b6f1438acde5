use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::coordinate::{default_kind, Identity};
use crate::model::range::VersionRange;
use crate::model::scope::Scope;

/// Excludes a group/artifact pair from the subtree below a declaration.
/// Either side may be `*` to match anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exclusion {
    pub group: String,
    pub artifact: String,
}

impl Exclusion {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }

    pub fn matches(&self, group: &str, artifact: &str) -> bool {
        (self.group == "*" || self.group == group)
            && (self.artifact == "*" || self.artifact == artifact)
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

/// One dependency edge as it appears in a flattened descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    pub group: String,
    pub artifact: String,
    #[serde(rename = "version")]
    pub range: VersionRange,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<Exclusion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_path: Option<PathBuf>,
}

impl DependencyDeclaration {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>, range: VersionRange) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            range,
            kind: default_kind(),
            classifier: None,
            scope: Scope::default(),
            optional: false,
            exclusions: Vec::new(),
            system_path: None,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            group: self.group.clone(),
            artifact: self.artifact.clone(),
            kind: self.kind.clone(),
            classifier: self.classifier.clone(),
        }
    }

    pub fn is_excluded_by(&self, exclusions: &[Exclusion]) -> bool {
        exclusions
            .iter()
            .any(|e| e.matches(&self.group, &self.artifact))
    }
}

impl fmt::Display for DependencyDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{} ({})",
            self.group, self.artifact, self.range, self.scope
        )
    }
}
