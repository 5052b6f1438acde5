use gantry_common::model::Version;
use gantry_common::Result;
use serde::{Deserialize, Serialize};

pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Artifact-level metadata published by a remote: every version it hosts
/// for one group/artifact pair. Feeds range solving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub group: String,
    pub artifact: String,
    #[serde(default)]
    pub versions: Vec<String>,
}

impl ArtifactMetadata {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn versions(&self) -> Vec<Version> {
        self.versions.iter().map(|v| Version::parse(v)).collect()
    }
}

/// Version-level metadata for a snapshot: the timestamped pin currently
/// published for the base `-SNAPSHOT` version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub group: String,
    pub artifact: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
}

impl SnapshotMetadata {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_metadata_parses_and_lists_versions() {
        let meta = ArtifactMetadata::from_json(
            r#"{"group":"org.example","artifact":"lib","versions":["1.0","1.5","2.0"]}"#,
        )
        .unwrap();
        let versions = meta.versions();
        assert_eq!(versions.len(), 3);
        assert_eq!(versions[2].as_str(), "2.0");
    }

    #[test]
    fn snapshot_metadata_carries_an_optional_pin() {
        let meta = SnapshotMetadata::from_json(
            r#"{"group":"org.example","artifact":"lib","version":"1.0-SNAPSHOT","pin":"1.0-20260820.101530-3"}"#,
        )
        .unwrap();
        assert_eq!(meta.pin.as_deref(), Some("1.0-20260820.101530-3"));

        let bare = SnapshotMetadata::from_json(
            r#"{"group":"org.example","artifact":"lib","version":"1.0-SNAPSHOT"}"#,
        )
        .unwrap();
        assert!(bare.pin.is_none());
    }
}
