use std::path::{Path, PathBuf};

use gantry_common::{GantryError, RemoteConfig, Result};
use gantry_net::{download_and_verify, fetch_text, verify_checksum};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::store::metadata::METADATA_FILE_NAME;

/// One configured remote source. `Http` goes through the shared reqwest
/// client; `File` reads a repository tree rooted on the local filesystem
/// (`file://` URLs), which air-gapped mirrors and the tests use.
#[derive(Debug, Clone)]
pub enum Remote {
    Http {
        id: String,
        base: String,
        client: Client,
    },
    File {
        id: String,
        root: PathBuf,
    },
}

impl Remote {
    pub fn from_config(config: &RemoteConfig, client: &Client) -> Result<Self> {
        let url = Url::parse(&config.url).map_err(|e| {
            GantryError::Config(format!("remote '{}': invalid url '{}': {e}", config.id, config.url))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(Remote::Http {
                id: config.id.clone(),
                base: config.url.trim_end_matches('/').to_string(),
                client: client.clone(),
            }),
            "file" => {
                let root = url.to_file_path().map_err(|_| {
                    GantryError::Config(format!(
                        "remote '{}': '{}' is not a usable file url",
                        config.id, config.url
                    ))
                })?;
                Ok(Remote::File {
                    id: config.id.clone(),
                    root,
                })
            }
            other => Err(GantryError::Config(format!(
                "remote '{}': unsupported scheme '{other}'",
                config.id
            ))),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Remote::Http { id, .. } => id,
            Remote::File { id, .. } => id,
        }
    }

    /// GETs a small text resource: a descriptor, a metadata document or a
    /// checksum side file.
    pub async fn fetch_text(&self, rel: &str) -> Result<String> {
        match self {
            Remote::Http { base, client, .. } => fetch_text(client, &format!("{base}/{rel}")).await,
            Remote::File { root, .. } => {
                let path = root.join(rel);
                debug!("Reading file remote resource: {}", path.display());
                match std::fs::read_to_string(&path) {
                    Ok(text) => Ok(text),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                        GantryError::NotFound(format!("{} (no such file)", path.display())),
                    ),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Fetches a payload into `dest` through a temporary sibling, verifying
    /// it against `expected_digest` before the rename when one is known.
    pub async fn fetch_file(
        &self,
        rel: &str,
        dest: &Path,
        expected_digest: Option<&str>,
    ) -> Result<()> {
        match self {
            Remote::Http { base, client, .. } => {
                download_and_verify(client, &format!("{base}/{rel}"), dest, expected_digest)
                    .await
                    .map(|_| ())
            }
            Remote::File { root, .. } => {
                let src = root.join(rel);
                if !src.is_file() {
                    return Err(GantryError::NotFound(format!(
                        "{} (no such file)",
                        src.display()
                    )));
                }
                let name = dest
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                let temp =
                    dest.with_file_name(format!(".{}.{:08x}.download", name, rand::random::<u32>()));
                std::fs::copy(&src, &temp)?;
                if let Some(expected) = expected_digest {
                    if let Err(e) = verify_checksum(&temp, expected) {
                        let _ = std::fs::remove_file(&temp);
                        return Err(e);
                    }
                }
                std::fs::rename(&temp, dest)?;
                debug!("Copied {} to {}", src.display(), dest.display());
                Ok(())
            }
        }
    }
}

/// Repository-relative path of a file inside a version directory. Snapshot
/// version directories keep the base `-SNAPSHOT` name even when file names
/// carry a timestamped pin.
pub(crate) fn rel_file_path(group: &str, artifact: &str, version: &str, file_name: &str) -> String {
    format!("{}/{artifact}/{version}/{file_name}", group.replace('.', "/"))
}

/// Repository-relative path of the artifact-level version listing.
pub(crate) fn rel_artifact_metadata(group: &str, artifact: &str) -> String {
    format!(
        "{}/{artifact}/{METADATA_FILE_NAME}",
        group.replace('.', "/")
    )
}

/// Repository-relative path of the per-version snapshot pin metadata.
pub(crate) fn rel_snapshot_metadata(group: &str, artifact: &str, version: &str) -> String {
    format!(
        "{}/{artifact}/{version}/{METADATA_FILE_NAME}",
        group.replace('.', "/")
    )
}
