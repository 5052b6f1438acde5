// gantry-core/src/store/mod.rs
pub mod flight;
pub mod layout;
pub mod metadata;
pub mod record;
pub mod remote;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use gantry_common::model::{Coordinate, Descriptor, Version};
use gantry_common::{Config, GantryError, Result};
use gantry_net::{
    build_http_client, compute_checksum, extract_digest, verify_checksum, verify_content_type,
};
use tracing::{debug, error, warn};

use crate::store::flight::{FetchStats, Singleflight};
use crate::store::layout::StoreLayout;
use crate::store::metadata::{ArtifactMetadata, SnapshotMetadata};
use crate::store::record::RepositoryRecord;
use crate::store::remote::{
    rel_artifact_metadata, rel_file_path, rel_snapshot_metadata, Remote,
};

/// Source id reported for files found locally without a provenance record.
pub const LOCAL_SOURCE_ID: &str = "local";

/// Artifact kinds stored as zip archives, and therefore sniffable.
const ZIP_KINDS: &[&str] = &["jar", "war", "ear", "zip"];

/// A file the store has made available locally, with the repository it
/// originally came from and the digest it was stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub source_id: String,
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoredKind {
    Descriptor,
    Payload,
}

/// Layered artifact storage: a local directory tree backed by an ordered
/// list of remote sources. Everything a remote serves is written through to
/// the local tree, so repeated resolutions run from disk.
#[derive(Debug)]
pub struct RepositoryStore {
    layout: StoreLayout,
    remotes: Vec<Remote>,
    offline: bool,
    snapshot_ttl: Duration,
    stats: FetchStats,
    flight: Singleflight,
    /// Snapshot coordinates already re-checked against remotes in this
    /// session. Cleared by `begin_session`.
    session_checks: Mutex<HashSet<String>>,
}

impl RepositoryStore {
    pub fn new(config: &Config) -> Result<Self> {
        let client = build_http_client()?;
        let mut remotes = Vec::with_capacity(config.remotes.len());
        for entry in &config.remotes {
            remotes.push(Remote::from_config(entry, &client)?);
        }
        debug!(
            "Repository store at {} with {} remote(s), offline={}",
            config.store_root().display(),
            remotes.len(),
            config.offline
        );
        Ok(Self {
            layout: StoreLayout::new(config.store_root()),
            remotes,
            offline: config.offline,
            snapshot_ttl: config.snapshot_ttl,
            stats: FetchStats::default(),
            flight: Singleflight::default(),
            session_checks: Mutex::new(HashSet::new()),
        })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    pub fn offline(&self) -> bool {
        self.offline
    }

    /// Starts a fresh resolution session: snapshots become eligible for one
    /// remote re-check again.
    pub fn begin_session(&self) {
        if let Ok(mut checks) = self.session_checks.lock() {
            checks.clear();
        }
    }

    /// Makes the descriptor of `coordinate` available and parses it.
    pub async fn resolve_descriptor(&self, coordinate: &Coordinate) -> Result<Descriptor> {
        let stored = self.ensure_present(coordinate, StoredKind::Descriptor).await?;
        let text = std::fs::read_to_string(&stored.path)?;
        Descriptor::from_json(&text)
            .map_err(|e| GantryError::ParseError("descriptor", format!("{coordinate}: {e}")))
    }

    /// Makes the artifact payload of `coordinate` available locally.
    pub async fn resolve_file(&self, coordinate: &Coordinate) -> Result<StoredFile> {
        self.ensure_present(coordinate, StoredKind::Payload).await
    }

    /// All versions known for the artifact: local directories plus what the
    /// remotes advertise. Listing failures on individual remotes degrade to
    /// a warning; range solving works with whatever candidates remain.
    pub async fn list_versions(&self, group: &str, artifact: &str) -> Vec<Version> {
        let mut versions = self.layout.list_local_versions(group, artifact);
        if !self.offline {
            let rel = rel_artifact_metadata(group, artifact);
            for remote in &self.remotes {
                match remote.fetch_text(&rel).await {
                    Ok(text) => match ArtifactMetadata::from_json(&text) {
                        Ok(meta) => {
                            self.stats.record_metadata_fetch();
                            versions.extend(meta.versions());
                        }
                        Err(e) => {
                            warn!(
                                "Malformed version metadata for {group}:{artifact} in remote '{}': {e}",
                                remote.id()
                            );
                        }
                    },
                    Err(GantryError::NotFound(_)) => {
                        debug!(
                            "No version metadata for {group}:{artifact} in remote '{}'",
                            remote.id()
                        );
                    }
                    Err(e) => {
                        warn!(
                            "Could not list {group}:{artifact} in remote '{}': {e}",
                            remote.id()
                        );
                    }
                }
            }
        }
        versions.sort();
        versions.dedup();
        versions
    }

    fn local_path(&self, coordinate: &Coordinate, kind: StoredKind) -> PathBuf {
        match kind {
            StoredKind::Descriptor => self.layout.descriptor_path(coordinate),
            StoredKind::Payload => self.layout.artifact_path(coordinate),
        }
    }

    async fn ensure_present(&self, coordinate: &Coordinate, kind: StoredKind) -> Result<StoredFile> {
        let local_path = self.local_path(coordinate, kind);
        let key = local_path.display().to_string();
        loop {
            if let Some(hit) = self.local_hit(coordinate, &local_path) {
                self.stats.record_cache_hit();
                return Ok(hit);
            }
            if self.offline {
                return Err(self.offline_miss(coordinate));
            }
            if self.flight.begin(&key).await {
                let result = self.fetch_from_remotes(coordinate, kind, &local_path).await;
                self.flight.finish(&key).await;
                return result;
            }
            // A leader finished while this task was parked; go back and
            // read whatever it left in the local tree.
            self.stats.record_flight_wait();
        }
    }

    fn local_hit(&self, coordinate: &Coordinate, local_path: &Path) -> Option<StoredFile> {
        if !local_path.is_file() {
            return None;
        }
        if mutable_snapshot(&coordinate.version)
            && !self.offline
            && self.snapshot_check_due(coordinate)
        {
            return None;
        }
        Some(self.stored_from_record(coordinate, local_path))
    }

    /// A [`StoredFile`] for a local file, with provenance and checksum
    /// taken from the record when one survives next to it.
    fn stored_from_record(&self, coordinate: &Coordinate, local_path: &Path) -> StoredFile {
        let record = RepositoryRecord::load(&self.layout.record_path(coordinate))
            .ok()
            .flatten();
        StoredFile {
            path: local_path.to_path_buf(),
            source_id: record
                .as_ref()
                .map_or_else(|| LOCAL_SOURCE_ID.to_string(), |r| r.source_id.clone()),
            checksum: record.and_then(|r| r.checksum),
        }
    }

    fn snapshot_check_due(&self, coordinate: &Coordinate) -> bool {
        if self.session_checked(coordinate) {
            return false;
        }
        match RepositoryRecord::load(&self.layout.record_path(coordinate)).ok().flatten() {
            Some(record) => record.is_stale(true, self.snapshot_ttl),
            // No provenance record: age unknown, so check.
            None => true,
        }
    }

    fn session_key(coordinate: &Coordinate) -> String {
        format!(
            "{}:{}:{}",
            coordinate.group,
            coordinate.artifact,
            coordinate.version.as_str()
        )
    }

    fn session_checked(&self, coordinate: &Coordinate) -> bool {
        self.session_checks
            .lock()
            .map(|checks| checks.contains(&Self::session_key(coordinate)))
            .unwrap_or(false)
    }

    fn mark_session_checked(&self, coordinate: &Coordinate) {
        if let Ok(mut checks) = self.session_checks.lock() {
            checks.insert(Self::session_key(coordinate));
        }
    }

    fn offline_miss(&self, coordinate: &Coordinate) -> GantryError {
        let remotes = if self.remotes.is_empty() {
            "none configured".to_string()
        } else {
            self.remotes
                .iter()
                .map(Remote::id)
                .collect::<Vec<_>>()
                .join(", ")
        };
        GantryError::NotFound(format!(
            "{coordinate} is not in the local store and offline mode prevented consulting remotes: {remotes}"
        ))
    }

    /// Walks the remotes in configured order. A 404 moves on to the next
    /// remote; a checksum mismatch aborts the fetch outright; any other
    /// failure is remembered and the next remote gets its chance.
    async fn fetch_from_remotes(
        &self,
        coordinate: &Coordinate,
        kind: StoredKind,
        local_path: &Path,
    ) -> Result<StoredFile> {
        std::fs::create_dir_all(self.layout.version_dir(coordinate))?;
        let record_path = self.layout.record_path(coordinate);
        let recheck = mutable_snapshot(&coordinate.version);

        let mut last_error: Option<GantryError> = None;
        let mut misses: Vec<&str> = Vec::new();
        for remote in &self.remotes {
            let outcome = if recheck {
                self.fetch_snapshot(remote, coordinate, kind, local_path, &record_path)
                    .await
            } else {
                self.fetch_immutable(remote, coordinate, kind, local_path, &record_path)
                    .await
            };
            match outcome {
                Ok(stored) => return Ok(stored),
                Err(e @ GantryError::ChecksumMismatch(_)) => {
                    self.stats.record_checksum_failure();
                    error!(
                        "Rejecting {} from remote '{}': {}",
                        coordinate,
                        remote.id(),
                        e
                    );
                    return Err(e);
                }
                Err(GantryError::NotFound(detail)) => {
                    debug!("{} not in remote '{}': {}", coordinate, remote.id(), detail);
                    misses.push(remote.id());
                }
                Err(e) => {
                    warn!(
                        "Fetching {} from remote '{}' failed: {}",
                        coordinate,
                        remote.id(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        // A snapshot that exists locally survives remotes going away; the
        // stale copy beats no copy.
        if recheck && local_path.is_file() {
            warn!(
                "Could not re-check snapshot {} against any remote; using the cached copy",
                coordinate
            );
            self.mark_session_checked(coordinate);
            return Ok(self.stored_from_record(coordinate, local_path));
        }

        match last_error {
            Some(e) => Err(e),
            None => Err(GantryError::NotFound(format!(
                "{coordinate} not found in any remote ({})",
                if misses.is_empty() {
                    "none configured".to_string()
                } else {
                    misses.join(", ")
                }
            ))),
        }
    }

    /// Releases and explicitly pinned snapshot versions: fetch once under
    /// their own file names, verify, write through.
    async fn fetch_immutable(
        &self,
        remote: &Remote,
        coordinate: &Coordinate,
        kind: StoredKind,
        local_path: &Path,
        record_path: &Path,
    ) -> Result<StoredFile> {
        let rel = rel_file_path(
            &coordinate.group,
            &coordinate.artifact,
            &remote_version_dir(coordinate),
            &remote_file_name(coordinate, kind),
        );
        let digest = self.remote_digest(remote, &rel).await?;
        remote.fetch_file(&rel, local_path, digest.as_deref()).await?;
        if digest.is_none() && kind == StoredKind::Payload {
            self.sniff_payload(coordinate, local_path)?;
        }
        self.stats.record_remote_fetch();
        let checksum = self.seal(remote, coordinate, local_path, digest, None, record_path)?;
        Ok(StoredFile {
            path: local_path.to_path_buf(),
            source_id: remote.id().to_string(),
            checksum: Some(checksum),
        })
    }

    /// Base `-SNAPSHOT` versions: consult the remote's pin metadata, skip
    /// the download when the recorded pin is current, otherwise pull the
    /// pinned (or legacy base-named) files under the local base name.
    async fn fetch_snapshot(
        &self,
        remote: &Remote,
        coordinate: &Coordinate,
        kind: StoredKind,
        local_path: &Path,
        record_path: &Path,
    ) -> Result<StoredFile> {
        let base = coordinate.version.as_str();
        let pin = self.snapshot_pin(remote, coordinate).await?;

        if let Some(pin) = &pin {
            let record = RepositoryRecord::load(record_path).ok().flatten();
            if let Some(mut record) = record {
                if local_path.is_file() && record.snapshot_pin.as_deref() == Some(pin.as_str()) {
                    debug!("Snapshot {} is current at pin {}", coordinate, pin);
                    record.touch();
                    record.store(record_path)?;
                    self.mark_session_checked(coordinate);
                    return Ok(StoredFile {
                        path: local_path.to_path_buf(),
                        source_id: record.source_id,
                        checksum: record.checksum,
                    });
                }
            }
        }

        let remote_name = match &pin {
            Some(pin) => remote_file_name(&coordinate.with_version(pin.clone()), kind),
            None => remote_file_name(coordinate, kind),
        };
        let rel = rel_file_path(&coordinate.group, &coordinate.artifact, base, &remote_name);
        let digest = self.remote_digest(remote, &rel).await?;

        // Legacy remotes publish no metadata; an unchanged digest means the
        // local copy is still what the remote serves.
        if pin.is_none() && local_path.is_file() {
            if let Some(expected) = &digest {
                if verify_checksum(local_path, expected).is_ok() {
                    debug!("Snapshot {} matches the remote digest; no download", coordinate);
                    self.touch_record(remote, record_path)?;
                    self.mark_session_checked(coordinate);
                    return Ok(self.stored_from_record(coordinate, local_path));
                }
            }
        }

        remote.fetch_file(&rel, local_path, digest.as_deref()).await?;
        if digest.is_none() && kind == StoredKind::Payload {
            self.sniff_payload(coordinate, local_path)?;
        }
        self.stats.record_remote_fetch();
        let checksum = self.seal(remote, coordinate, local_path, digest, pin.as_ref(), record_path)?;
        self.mark_session_checked(coordinate);
        Ok(StoredFile {
            path: local_path.to_path_buf(),
            source_id: remote.id().to_string(),
            checksum: Some(checksum),
        })
    }

    async fn snapshot_pin(&self, remote: &Remote, coordinate: &Coordinate) -> Result<Option<Version>> {
        let rel = rel_snapshot_metadata(
            &coordinate.group,
            &coordinate.artifact,
            coordinate.version.as_str(),
        );
        match remote.fetch_text(&rel).await {
            Ok(text) => {
                self.stats.record_metadata_fetch();
                match SnapshotMetadata::from_json(&text) {
                    Ok(meta) => Ok(meta.pin.map(|p| Version::parse(&p))),
                    Err(e) => {
                        warn!(
                            "Malformed snapshot metadata for {} in remote '{}': {e}",
                            coordinate,
                            remote.id()
                        );
                        Ok(None)
                    }
                }
            }
            Err(GantryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reads the `.sha256` side file next to `rel` on the remote. A missing
    /// or malformed side file downgrades to unverified; anything else is a
    /// real failure.
    async fn remote_digest(&self, remote: &Remote, rel: &str) -> Result<Option<String>> {
        match remote.fetch_text(&format!("{rel}.sha256")).await {
            Ok(text) => match extract_digest(&text) {
                Some(digest) => Ok(Some(digest)),
                None => {
                    warn!(
                        "Side file for {} in remote '{}' holds no digest",
                        rel,
                        remote.id()
                    );
                    Ok(None)
                }
            },
            Err(GantryError::NotFound(_)) => {
                debug!("No side file for {} in remote '{}'", rel, remote.id());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// After a successful download: write the local side file and the
    /// provenance record. Returns the digest the file was sealed under.
    fn seal(
        &self,
        remote: &Remote,
        coordinate: &Coordinate,
        local_path: &Path,
        digest: Option<String>,
        pin: Option<&Version>,
        record_path: &Path,
    ) -> Result<String> {
        let digest = match digest {
            Some(digest) => digest,
            None => compute_checksum(local_path)?,
        };
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        std::fs::write(
            self.layout.checksum_path(local_path),
            format!("{digest}  {file_name}\n"),
        )?;

        let mut record = RepositoryRecord::new(remote.id());
        record.snapshot_pin = pin.map(|p| p.as_str().to_string());
        record.checksum = Some(digest.clone());
        record.store(record_path)?;
        debug!(
            "Stored {} from remote '{}' at {}",
            coordinate,
            remote.id(),
            local_path.display()
        );
        Ok(digest)
    }

    /// Last line of defense when a remote publishes no digest: an archive
    /// payload must at least look like an archive, not an error page served
    /// with status 200. Non-archive kinds pass through unchecked.
    fn sniff_payload(&self, coordinate: &Coordinate, local_path: &Path) -> Result<()> {
        if !ZIP_KINDS.contains(&coordinate.kind.as_str()) {
            return Ok(());
        }
        if let Err(e) = verify_content_type(local_path, "zip") {
            let _ = std::fs::remove_file(local_path);
            return Err(e);
        }
        Ok(())
    }

    fn touch_record(&self, remote: &Remote, record_path: &Path) -> Result<()> {
        let mut record = RepositoryRecord::load(record_path)
            .ok()
            .flatten()
            .unwrap_or_else(|| RepositoryRecord::new(remote.id()));
        record.touch();
        record.store(record_path)
    }
}

/// Snapshots that float: the base `-SNAPSHOT` form. A timestamped pin is
/// immutable and cached like a release.
fn mutable_snapshot(version: &Version) -> bool {
    version.is_snapshot() && !version.is_timestamped_snapshot()
}

/// The directory a remote serves this version from. Timestamped pins live
/// in their base `-SNAPSHOT` directory.
fn remote_version_dir(coordinate: &Coordinate) -> String {
    if coordinate.version.is_timestamped_snapshot() {
        coordinate.version.base_version().as_str().to_string()
    } else {
        coordinate.version.as_str().to_string()
    }
}

fn remote_file_name(coordinate: &Coordinate, kind: StoredKind) -> String {
    match kind {
        StoredKind::Descriptor => coordinate.descriptor_file_name(),
        StoredKind::Payload => coordinate.artifact_file_name(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fixtures::{sha256_hex, store_with, RemoteFixture};
    use gantry_common::model::Descriptor;

    fn coord(raw: &str) -> Coordinate {
        Coordinate::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn release_fetch_writes_through_and_never_refetches() {
        let remote = RemoteFixture::new("central");
        remote.publish(
            &Descriptor::new("org.example", "lib", Version::parse("1.0")),
            b"lib bytes",
        );
        let (_home, store) = store_with(&[&remote]);

        let stored = store.resolve_file(&coord("org.example:lib:1.0")).await.unwrap();
        assert_eq!(stored.source_id, "central");
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"lib bytes");
        assert_eq!(stored.checksum.as_deref(), Some(sha256_hex(b"lib bytes").as_str()));
        assert!(store.layout().checksum_path(&stored.path).is_file());
        assert!(store
            .layout()
            .record_path(&coord("org.example:lib:1.0"))
            .is_file());
        assert_eq!(store.stats().remote_fetches(), 1);

        // Second resolution is a pure cache hit, even with the remote gone.
        remote.wipe();
        let again = store.resolve_file(&coord("org.example:lib:1.0")).await.unwrap();
        assert_eq!(again, stored);
        assert_eq!(store.stats().remote_fetches(), 1);
        assert_eq!(store.stats().cache_hits(), 1);
    }

    #[tokio::test]
    async fn descriptor_resolution_parses_what_the_remote_serves() {
        let remote = RemoteFixture::new("central");
        let mut descriptor = Descriptor::new("org.example", "app", Version::parse("1.0"));
        descriptor
            .dependencies
            .push(crate::fixtures::decl("org.example", "lib", "1.0"));
        remote.publish(&descriptor, b"app bytes");
        let (_home, store) = store_with(&[&remote]);

        let parsed = store
            .resolve_descriptor(&coord("org.example:app:1.0"))
            .await
            .unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[tokio::test]
    async fn remotes_are_consulted_in_configured_order() {
        let first = RemoteFixture::new("first");
        let second = RemoteFixture::new("second");
        second.publish(
            &Descriptor::new("org.example", "lib", Version::parse("1.0")),
            b"from second",
        );
        let (_home, store) = store_with(&[&first, &second]);

        let stored = store.resolve_file(&coord("org.example:lib:1.0")).await.unwrap();
        assert_eq!(stored.source_id, "second");

        let err = store
            .resolve_file(&coord("org.example:absent:1.0"))
            .await
            .unwrap_err();
        match err {
            GantryError::NotFound(msg) => {
                assert!(msg.contains("first"), "{msg}");
                assert!(msg.contains("second"), "{msg}");
            }
            other => panic!("expected NotFound, got {other}"),
        }
    }

    #[tokio::test]
    async fn checksum_mismatch_is_fatal_and_skips_later_remotes() {
        let bad = RemoteFixture::new("bad");
        let good = RemoteFixture::new("good");
        bad.publish(
            &Descriptor::new("org.example", "lib", Version::parse("1.0")),
            b"tampered bytes",
        );
        // Overwrite the side file so it no longer matches the payload.
        bad.overwrite_side_file(
            "org.example",
            "lib",
            "1.0",
            "lib-1.0.jar",
            &sha256_hex(b"the real bytes"),
        );
        good.publish(
            &Descriptor::new("org.example", "lib", Version::parse("1.0")),
            b"the real bytes",
        );
        let (_home, store) = store_with(&[&bad, &good]);

        let err = store.resolve_file(&coord("org.example:lib:1.0")).await.unwrap_err();
        assert!(matches!(err, GantryError::ChecksumMismatch(_)));
        assert_eq!(store.stats().checksum_failures(), 1);
        assert_eq!(store.stats().remote_fetches(), 0);
        assert!(!store.layout().artifact_path(&coord("org.example:lib:1.0")).is_file());
    }

    #[tokio::test]
    async fn unreachable_remotes_time_out_and_the_next_remote_serves() {
        // Nothing listens on port 1; the connection is refused before any
        // HTTP exchange, which the transport classifies as a timeout.
        let dead = gantry_common::RemoteConfig {
            id: "dead".to_string(),
            url: "http://127.0.0.1:1/repo".to_string(),
        };
        let good = RemoteFixture::new("good");
        good.publish(
            &Descriptor::new("org.example", "lib", Version::parse("1.0")),
            b"lib bytes",
        );

        let home = tempfile::tempdir().unwrap();
        let mut config = gantry_common::Config::with_root(home.path());
        config.remotes = vec![dead.clone(), good.config()];
        let store = RepositoryStore::new(&config).unwrap();

        let stored = store.resolve_file(&coord("org.example:lib:1.0")).await.unwrap();
        assert_eq!(stored.source_id, "good");
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"lib bytes");

        // With no remote left to move on to, the timeout surfaces.
        let lone_home = tempfile::tempdir().unwrap();
        let mut config = gantry_common::Config::with_root(lone_home.path());
        config.remotes = vec![dead];
        let lone = RepositoryStore::new(&config).unwrap();
        let err = lone.resolve_file(&coord("org.example:lib:1.0")).await.unwrap_err();
        assert!(matches!(err, GantryError::Timeout(_)), "{err}");
    }

    #[tokio::test]
    async fn undigested_error_pages_are_rejected_and_the_next_remote_tried() {
        let liar = RemoteFixture::new("liar");
        let good = RemoteFixture::new("good");
        // No side files anywhere: the liar serves an HTML page where the
        // jar should be, the good remote serves a real archive.
        liar.publish_unverified(
            &Descriptor::new("org.example", "lib", Version::parse("1.0")),
            b"<!DOCTYPE html><html><body>maintenance</body></html>",
        );
        good.publish_unverified(
            &Descriptor::new("org.example", "lib", Version::parse("1.0")),
            &crate::fixtures::zip_bytes(),
        );
        let (_home, store) = store_with(&[&liar, &good]);

        let stored = store.resolve_file(&coord("org.example:lib:1.0")).await.unwrap();
        assert_eq!(stored.source_id, "good");
        assert_eq!(std::fs::read(&stored.path).unwrap(), crate::fixtures::zip_bytes());

        // The rejected page never reached the local tree under its final
        // name; only the good payload is there.
        let (_home, lone) = store_with(&[&liar]);
        let err = lone.resolve_file(&coord("org.example:lib:1.0")).await.unwrap_err();
        assert!(matches!(err, GantryError::ValidationError(_)));
        assert!(!lone.layout().artifact_path(&coord("org.example:lib:1.0")).is_file());
    }

    #[tokio::test]
    async fn offline_mode_serves_cache_and_names_unconsulted_remotes() {
        let remote = RemoteFixture::new("central");
        remote.publish(
            &Descriptor::new("org.example", "lib", Version::parse("1.0")),
            b"lib bytes",
        );
        let (home, store) = store_with(&[&remote]);
        store.resolve_file(&coord("org.example:lib:1.0")).await.unwrap();
        drop(store);

        let mut config = gantry_common::Config::with_root(home.path());
        config.remotes = vec![remote.config()];
        config.offline = true;
        let offline_store = RepositoryStore::new(&config).unwrap();

        let warm = offline_store
            .resolve_file(&coord("org.example:lib:1.0"))
            .await
            .unwrap();
        assert_eq!(warm.source_id, "central");

        let cold = offline_store
            .resolve_file(&coord("org.example:other:1.0"))
            .await
            .unwrap_err();
        match cold {
            GantryError::NotFound(msg) => {
                assert!(msg.contains("offline"), "{msg}");
                assert!(msg.contains("central"), "{msg}");
            }
            other => panic!("expected NotFound, got {other}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_produce_one_download() {
        let remote = RemoteFixture::new("central");
        remote.publish(
            &Descriptor::new("org.example", "lib", Version::parse("1.0")),
            b"lib bytes",
        );
        let (_home, store) = store_with(&[&remote]);
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.resolve_file(&coord("org.example:lib:1.0")).await
            }));
        }
        let mut paths = Vec::new();
        for handle in handles {
            paths.push(handle.await.unwrap().unwrap().path);
        }
        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.stats().remote_fetches(), 1);
    }

    #[tokio::test]
    async fn snapshot_follows_the_published_pin() {
        let remote = RemoteFixture::new("central");
        let descriptor = Descriptor::new("org.example", "lib", Version::parse("1.0-SNAPSHOT"));
        remote.publish_snapshot(&descriptor, "1.0-20260820.101530-1", b"first build");
        let (_home, store) = store_with(&[&remote]);
        let snapshot = coord("org.example:lib:1.0-SNAPSHOT");

        let stored = store.resolve_file(&snapshot).await.unwrap();
        // Local name keeps the base version even though the remote serves
        // pinned file names.
        assert!(stored.path.ends_with("lib-1.0-SNAPSHOT.jar"));
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"first build");
        let record = RepositoryRecord::load(&store.layout().record_path(&snapshot))
            .unwrap()
            .unwrap();
        assert_eq!(record.snapshot_pin.as_deref(), Some("1.0-20260820.101530-1"));

        // Same session: the pin is trusted without another remote check.
        let fetches_before = store.stats().metadata_fetches();
        store.resolve_file(&snapshot).await.unwrap();
        assert_eq!(store.stats().metadata_fetches(), fetches_before);

        // New build published; a new session picks it up (ttl is zero).
        remote.publish_snapshot(&descriptor, "1.0-20260820.111530-2", b"second build");
        store.begin_session();
        let stored = store.resolve_file(&snapshot).await.unwrap();
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"second build");
        let record = RepositoryRecord::load(&store.layout().record_path(&snapshot))
            .unwrap()
            .unwrap();
        assert_eq!(record.snapshot_pin.as_deref(), Some("1.0-20260820.111530-2"));
    }

    #[tokio::test]
    async fn fresh_snapshot_skips_the_remote_inside_the_ttl() {
        let remote = RemoteFixture::new("central");
        let descriptor = Descriptor::new("org.example", "lib", Version::parse("1.0-SNAPSHOT"));
        remote.publish_snapshot(&descriptor, "1.0-20260820.101530-1", b"build");
        let (home, store) = store_with(&[&remote]);
        let snapshot = coord("org.example:lib:1.0-SNAPSHOT");
        store.resolve_file(&snapshot).await.unwrap();
        drop(store);

        // A later session within the staleness window runs from cache alone.
        remote.wipe();
        let mut config = gantry_common::Config::with_root(home.path());
        config.remotes = vec![remote.config()];
        config.snapshot_ttl = Duration::from_secs(3600);
        let store = RepositoryStore::new(&config).unwrap();
        let stored = store.resolve_file(&snapshot).await.unwrap();
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"build");
        assert_eq!(store.stats().remote_fetches(), 0);
    }

    #[tokio::test]
    async fn legacy_snapshot_without_metadata_still_resolves() {
        let remote = RemoteFixture::new("plain");
        // Base-named files only, no metadata.json anywhere.
        remote.publish(
            &Descriptor::new("org.example", "lib", Version::parse("1.0-SNAPSHOT")),
            b"legacy build",
        );
        let (_home, store) = store_with(&[&remote]);
        let snapshot = coord("org.example:lib:1.0-SNAPSHOT");

        let stored = store.resolve_file(&snapshot).await.unwrap();
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"legacy build");
        assert_eq!(store.stats().remote_fetches(), 1);

        // Re-check with an unchanged digest downloads nothing.
        store.begin_session();
        store.resolve_file(&snapshot).await.unwrap();
        assert_eq!(store.stats().remote_fetches(), 1);

        // The remote disappearing leaves the cached copy usable.
        remote.wipe();
        store.begin_session();
        let stored = store.resolve_file(&snapshot).await.unwrap();
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"legacy build");
    }

    #[tokio::test]
    async fn version_listing_unions_local_and_remote() {
        let remote = RemoteFixture::new("central");
        remote.publish(
            &Descriptor::new("org.example", "lib", Version::parse("1.0")),
            b"one",
        );
        remote.publish_versions("org.example", "lib", &["1.0", "1.5", "2.0"]);
        let (_home, store) = store_with(&[&remote]);

        // Pull 1.0 into the local tree, then drop the remote listing down
        // to prove the union includes local directories.
        store.resolve_file(&coord("org.example:lib:1.0")).await.unwrap();
        remote.publish_versions("org.example", "lib", &["1.5", "2.0"]);

        let versions = store.list_versions("org.example", "lib").await;
        let rendered: Vec<&str> = versions.iter().map(Version::as_str).collect();
        assert_eq!(rendered, ["1.0", "1.5", "2.0"]);
    }
}
