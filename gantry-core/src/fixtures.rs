// gantry-core/src/fixtures.rs
//! Shared test fixtures: remotes served from temp directories over
//! `file://`, laid out exactly like a production remote, plus terse
//! constructors for descriptors and declarations.

use std::path::{Path, PathBuf};

use gantry_common::model::{
    ClasspathFlags, Coordinate, DependencyDeclaration, Descriptor, ManagedVersion,
    ResolvedArtifact, Scope, Version, VersionRange,
};
use gantry_common::{Config, RemoteConfig};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::store::metadata::{ArtifactMetadata, SnapshotMetadata, METADATA_FILE_NAME};
use crate::store::RepositoryStore;

/// The smallest payload `infer` recognizes as a zip archive: one empty
/// local file header plus the end-of-central-directory record.
pub(crate) fn zip_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"PK\x03\x04");
    bytes.extend_from_slice(&[0u8; 26]);
    bytes.extend_from_slice(b"PK\x05\x06");
    bytes.extend_from_slice(&[0u8; 18]);
    bytes
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// A remote repository rooted in a temp directory.
pub(crate) struct RemoteFixture {
    id: String,
    dir: TempDir,
}

impl RemoteFixture {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn config(&self) -> RemoteConfig {
        RemoteConfig {
            id: self.id.clone(),
            url: format!("file://{}", self.dir.path().display()),
        }
    }

    fn artifact_dir(&self, group: &str, artifact: &str) -> PathBuf {
        let mut dir = self.dir.path().to_path_buf();
        for segment in group.split('.') {
            dir.push(segment);
        }
        dir.push(artifact);
        dir
    }

    fn write_with_side_file(dir: &Path, file_name: &str, bytes: &[u8]) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(file_name), bytes).unwrap();
        std::fs::write(
            dir.join(format!("{file_name}.sha256")),
            format!("{}  {file_name}\n", sha256_hex(bytes)),
        )
        .unwrap();
    }

    /// Publishes the descriptor and its payload under the version's own
    /// directory and file names, with matching side files.
    pub fn publish(&self, descriptor: &Descriptor, payload: &[u8]) {
        let coordinate = descriptor.coordinate();
        let dir = self
            .artifact_dir(&coordinate.group, &coordinate.artifact)
            .join(coordinate.version.as_str());
        Self::write_with_side_file(
            &dir,
            &coordinate.descriptor_file_name(),
            descriptor.to_json().unwrap().as_bytes(),
        );
        Self::write_with_side_file(&dir, &coordinate.artifact_file_name(), payload);
    }

    /// Publishes descriptor and payload with no checksum side files, the
    /// way remotes that predate side-file publication look.
    pub fn publish_unverified(&self, descriptor: &Descriptor, payload: &[u8]) {
        let coordinate = descriptor.coordinate();
        let dir = self
            .artifact_dir(&coordinate.group, &coordinate.artifact)
            .join(coordinate.version.as_str());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(coordinate.descriptor_file_name()),
            descriptor.to_json().unwrap(),
        )
        .unwrap();
        std::fs::write(dir.join(coordinate.artifact_file_name()), payload).unwrap();
    }

    /// Publishes a snapshot build: pinned file names inside the base
    /// `-SNAPSHOT` directory, plus the pin metadata the store consults.
    /// Replaces whatever pin was published before.
    pub fn publish_snapshot(&self, descriptor: &Descriptor, pin: &str, payload: &[u8]) {
        let base = descriptor.coordinate();
        let pinned = base.with_version(Version::parse(pin));
        let dir = self
            .artifact_dir(&base.group, &base.artifact)
            .join(base.version.as_str());
        Self::write_with_side_file(
            &dir,
            &pinned.descriptor_file_name(),
            descriptor.to_json().unwrap().as_bytes(),
        );
        Self::write_with_side_file(&dir, &pinned.artifact_file_name(), payload);
        let metadata = SnapshotMetadata {
            group: base.group.clone(),
            artifact: base.artifact.clone(),
            version: base.version.as_str().to_string(),
            pin: Some(pin.to_string()),
        };
        std::fs::write(dir.join(METADATA_FILE_NAME), metadata.to_json().unwrap()).unwrap();
    }

    /// Publishes (or replaces) the artifact-level version listing.
    pub fn publish_versions(&self, group: &str, artifact: &str, versions: &[&str]) {
        let dir = self.artifact_dir(group, artifact);
        std::fs::create_dir_all(&dir).unwrap();
        let metadata = ArtifactMetadata {
            group: group.to_string(),
            artifact: artifact.to_string(),
            versions: versions.iter().map(|v| v.to_string()).collect(),
        };
        std::fs::write(dir.join(METADATA_FILE_NAME), metadata.to_json().unwrap()).unwrap();
    }

    /// Swaps one side file for an arbitrary digest, for tamper tests.
    pub fn overwrite_side_file(
        &self,
        group: &str,
        artifact: &str,
        version: &str,
        file_name: &str,
        digest: &str,
    ) {
        let dir = self.artifact_dir(group, artifact).join(version);
        std::fs::write(
            dir.join(format!("{file_name}.sha256")),
            format!("{digest}  {file_name}\n"),
        )
        .unwrap();
    }

    /// Empties the remote without tearing down the directory its
    /// `file://` URL points at.
    pub fn wipe(&self) {
        for entry in std::fs::read_dir(self.dir.path()).unwrap() {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                std::fs::remove_dir_all(entry.path()).unwrap();
            } else {
                std::fs::remove_file(entry.path()).unwrap();
            }
        }
    }
}

/// A store over a fresh root, wired to the given remotes in order. The
/// snapshot ttl stays at zero so re-check paths run by default.
pub(crate) fn store_with(remotes: &[&RemoteFixture]) -> (TempDir, RepositoryStore) {
    let home = tempfile::tempdir().unwrap();
    let mut config = Config::with_root(home.path());
    config.remotes = remotes.iter().map(|remote| remote.config()).collect();
    let store = RepositoryStore::new(&config).unwrap();
    (home, store)
}

pub(crate) fn decl(group: &str, artifact: &str, range: &str) -> DependencyDeclaration {
    DependencyDeclaration::new(group, artifact, VersionRange::parse(range).unwrap())
}

pub(crate) fn descriptor_with(
    coordinate: &str,
    dependencies: Vec<DependencyDeclaration>,
) -> Descriptor {
    let coordinate = Coordinate::parse(coordinate).unwrap();
    let mut descriptor = Descriptor::new(coordinate.group, coordinate.artifact, coordinate.version);
    descriptor.dependencies = dependencies;
    descriptor
}

pub(crate) fn managed(group: &str, artifact: &str, version: &str) -> ManagedVersion {
    ManagedVersion {
        group: group.to_string(),
        artifact: artifact.to_string(),
        version: Version::parse(version),
        kind: "jar".to_string(),
        classifier: None,
    }
}

/// A resolved artifact at an arbitrary path, for realm tests.
pub(crate) fn resolved(coordinate: &str, path: impl Into<PathBuf>) -> ResolvedArtifact {
    ResolvedArtifact {
        coordinate: Coordinate::parse(coordinate).unwrap(),
        scope: Scope::Compile,
        flags: ClasspathFlags::default(),
        path: path.into(),
        checksum: None,
        source_id: "local".to_string(),
        via: Vec::new(),
    }
}
