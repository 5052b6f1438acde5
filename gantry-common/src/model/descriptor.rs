use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::coordinate::{default_kind, Coordinate, Identity};
use crate::model::dependency::DependencyDeclaration;
use crate::model::version::Version;

/// A pinned version for an identity, applied to soft declarations below
/// the root. Hard ranges always beat management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedVersion {
    pub group: String,
    pub artifact: String,
    pub version: Version,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
}

impl ManagedVersion {
    pub fn identity(&self) -> Identity {
        Identity {
            group: self.group.clone(),
            artifact: self.artifact.clone(),
            kind: self.kind.clone(),
            classifier: self.classifier.clone(),
        }
    }
}

/// Flattened dependency descriptor of one artifact. Interpolation and
/// inheritance happened upstream; what arrives here is literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub group: String,
    pub artifact: String,
    pub version: Version,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_management: Vec<ManagedVersion>,
}

impl Descriptor {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>, version: Version) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version,
            kind: default_kind(),
            classifier: None,
            dependencies: Vec::new(),
            dependency_management: Vec::new(),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            group: self.group.clone(),
            artifact: self.artifact.clone(),
            version: self.version.clone(),
            kind: self.kind.clone(),
            classifier: self.classifier.clone(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn managed_version_for(&self, identity: &Identity) -> Option<&Version> {
        self.dependency_management
            .iter()
            .find(|entry| entry.identity() == *identity)
            .map(|entry| &entry.version)
    }
}
