// gantry-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use super::error::{GantryError, Result};

// Fallback when the home directory cannot be determined.
const DEFAULT_FALLBACK_ROOT: &str = "/var/lib/gantry";
const STORE_DIR_NAME: &str = "store";

const ENV_ROOT: &str = "GANTRY_ROOT";
const ENV_OFFLINE: &str = "GANTRY_OFFLINE";
const ENV_SNAPSHOT_TTL: &str = "GANTRY_SNAPSHOT_TTL";
const ENV_REMOTES: &str = "GANTRY_REMOTES";
const ENV_DEADLINE: &str = "GANTRY_DEADLINE";

/// One remote repository entry, in configuration order. The order is the
/// consultation order after the local store misses.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RemotesFile {
    #[serde(default, rename = "remote")]
    remotes: Vec<RemoteConfig>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gantry_root: PathBuf,
    pub offline: bool,
    /// How long a locally cached snapshot is trusted before remotes are
    /// re-checked. Zero means every resolution re-checks.
    pub snapshot_ttl: Duration,
    pub remotes: Vec<RemoteConfig>,
    /// Overall wall-clock budget for one resolution, if any.
    pub deadline: Option<Duration>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading gantry configuration");

        let root_str = env::var(ENV_ROOT)
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                let fallback = Self::default_root();
                debug!(
                    "{} not set, falling back to {}",
                    ENV_ROOT,
                    fallback.display()
                );
                fallback.to_string_lossy().into_owned()
            });
        let gantry_root = PathBuf::from(&root_str);
        debug!("Effective GANTRY_ROOT set to: {}", gantry_root.display());

        let offline = env::var(ENV_OFFLINE)
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let snapshot_ttl = match env::var(ENV_SNAPSHOT_TTL) {
            Ok(raw) => humantime::parse_duration(&raw).map_err(|e| {
                GantryError::Config(format!("invalid {ENV_SNAPSHOT_TTL} '{raw}': {e}"))
            })?,
            Err(_) => Duration::ZERO,
        };

        let deadline = match env::var(ENV_DEADLINE) {
            Ok(raw) => Some(humantime::parse_duration(&raw).map_err(|e| {
                GantryError::Config(format!("invalid {ENV_DEADLINE} '{raw}': {e}"))
            })?),
            Err(_) => None,
        };

        let remotes = match env::var(ENV_REMOTES) {
            Ok(path) if !path.is_empty() => Self::load_remotes_file(Path::new(&path))?,
            _ => Vec::new(),
        };

        debug!(
            "Configuration loaded: offline={}, {} remote(s)",
            offline,
            remotes.len()
        );
        Ok(Self {
            gantry_root,
            offline,
            snapshot_ttl,
            remotes,
            deadline,
        })
    }

    /// Programmatic configuration rooted at an explicit directory. No
    /// environment is consulted; remotes start empty.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            gantry_root: root.into(),
            offline: false,
            snapshot_ttl: Duration::ZERO,
            remotes: Vec::new(),
            deadline: None,
        }
    }

    fn load_remotes_file(path: &Path) -> Result<Vec<RemoteConfig>> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: RemotesFile = toml::from_str(&raw)
            .map_err(|e| GantryError::Config(format!("{}: {}", path.display(), e)))?;
        for remote in &parsed.remotes {
            if remote.id.is_empty() || remote.url.is_empty() {
                return Err(GantryError::Config(format!(
                    "{}: remote entries need both id and url",
                    path.display()
                )));
            }
        }
        if parsed.remotes.is_empty() {
            warn!("Remotes file {} declares no remotes", path.display());
        }
        Ok(parsed.remotes)
    }

    fn default_root() -> PathBuf {
        dirs::home_dir().map_or_else(
            || PathBuf::from(DEFAULT_FALLBACK_ROOT),
            |home| home.join(".gantry"),
        )
    }

    pub fn store_root(&self) -> PathBuf {
        self.gantry_root.join(STORE_DIR_NAME)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_root(Self::default_root())
    }
}
