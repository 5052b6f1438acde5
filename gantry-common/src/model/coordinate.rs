use std::fmt;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{GantryError, Result};
use crate::model::version::Version;

pub const DEFAULT_KIND: &str = "jar";

static VALID_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._-]+$").unwrap());

fn validate_token(what: &'static str, token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(GantryError::ParseError(what, "empty segment".into()));
    }
    if !VALID_TOKEN_RE.is_match(token) {
        return Err(GantryError::ParseError(
            what,
            format!("illegal characters in '{token}'"),
        ));
    }
    Ok(())
}

pub(crate) fn default_kind() -> String {
    DEFAULT_KIND.to_string()
}

fn is_default_kind(kind: &str) -> bool {
    kind == DEFAULT_KIND
}

/// A fully versioned artifact address:
/// `group:artifact:version[:kind[:classifier]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: Version,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
}

impl Coordinate {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>, version: Version) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version,
            kind: default_kind(),
            classifier: None,
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split(':').collect();
        if !(3..=5).contains(&parts.len()) {
            return Err(GantryError::ParseError(
                "coordinate",
                format!("'{raw}' is not group:artifact:version[:kind[:classifier]]"),
            ));
        }
        validate_token("coordinate", parts[0])?;
        validate_token("coordinate", parts[1])?;
        validate_token("coordinate", parts[2])?;
        let kind = match parts.get(3) {
            Some(kind) => {
                validate_token("coordinate", kind)?;
                (*kind).to_string()
            }
            None => default_kind(),
        };
        let classifier = match parts.get(4) {
            Some(classifier) => {
                validate_token("coordinate", classifier)?;
                Some((*classifier).to_string())
            }
            None => None,
        };
        Ok(Self {
            group: parts[0].to_string(),
            artifact: parts[1].to_string(),
            version: Version::parse(parts[2]),
            kind,
            classifier,
        })
    }

    /// The conflict identity: everything but the version.
    pub fn identity(&self) -> Identity {
        Identity {
            group: self.group.clone(),
            artifact: self.artifact.clone(),
            kind: self.kind.clone(),
            classifier: self.classifier.clone(),
        }
    }

    pub fn with_version(&self, version: Version) -> Coordinate {
        Coordinate {
            version,
            ..self.clone()
        }
    }

    /// Group segments as a relative path, `org.example` -> `org/example`.
    pub fn group_path(&self) -> PathBuf {
        self.group.split('.').collect()
    }

    /// File name of the artifact payload inside its version directory.
    pub fn artifact_file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.artifact, self.version, classifier, self.kind
            ),
            None => format!("{}-{}.{}", self.artifact, self.version, self.kind),
        }
    }

    /// File name of the dependency descriptor next to the payload.
    pub fn descriptor_file_name(&self) -> String {
        format!("{}-{}.json", self.artifact, self.version)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        match (&self.kind, &self.classifier) {
            (kind, Some(classifier)) => write!(f, ":{kind}:{classifier}"),
            (kind, None) if !is_default_kind(kind) => write!(f, ":{kind}"),
            _ => Ok(()),
        }
    }
}

/// What conflict resolution groups by: two coordinates with the same
/// identity are the same artifact at (possibly) different versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub group: String,
    pub artifact: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
}

impl Identity {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            kind: default_kind(),
            classifier: None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)?;
        match (&self.kind, &self.classifier) {
            (kind, Some(classifier)) => write!(f, ":{kind}:{classifier}"),
            (kind, None) if !is_default_kind(kind) => write!(f, ":{kind}"),
            _ => Ok(()),
        }
    }
}
