use std::path::{Path, PathBuf};

use gantry_common::model::{Coordinate, Version};
use tracing::{debug, warn};
use walkdir::WalkDir;

const RECORD_FILE_NAME: &str = ".gantry-record.json";
const CHECKSUM_EXT: &str = "sha256";

/// Path arithmetic over the local store root. The layout mirrors remote
/// repositories: `<root>/<group path>/<artifact>/<version>/<files>`.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_base_dir(&self, group: &str, artifact: &str) -> PathBuf {
        let mut dir = self.root.clone();
        for segment in group.split('.') {
            dir.push(segment);
        }
        dir.push(artifact);
        dir
    }

    pub fn version_dir(&self, coordinate: &Coordinate) -> PathBuf {
        self.artifact_base_dir(&coordinate.group, &coordinate.artifact)
            .join(coordinate.version.as_str())
    }

    pub fn artifact_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.version_dir(coordinate)
            .join(coordinate.artifact_file_name())
    }

    pub fn descriptor_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.version_dir(coordinate)
            .join(coordinate.descriptor_file_name())
    }

    pub fn record_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.version_dir(coordinate).join(RECORD_FILE_NAME)
    }

    /// The `.sha256` side file of any stored file.
    pub fn checksum_path(&self, file_path: &Path) -> PathBuf {
        let mut name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push('.');
        name.push_str(CHECKSUM_EXT);
        file_path.with_file_name(name)
    }

    /// Versions present locally, from the version directories under the
    /// artifact. Unreadable entries are skipped with a warning.
    pub fn list_local_versions(&self, group: &str, artifact: &str) -> Vec<Version> {
        let base = self.artifact_base_dir(group, artifact);
        if !base.is_dir() {
            debug!("No local versions under {}", base.display());
            return Vec::new();
        }
        let mut versions = Vec::new();
        for entry in WalkDir::new(&base).min_depth(1).max_depth(1) {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => {
                    let name = entry.file_name().to_string_lossy();
                    versions.push(Version::parse(&name));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", base.display(), e);
                }
            }
        }
        versions.sort();
        versions
    }
}
