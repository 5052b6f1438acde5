use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gantry_common::{GantryError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Provenance for a cached version directory: which remote the files came
/// from, when they were fetched, when the snapshot was last checked against
/// that remote, and the timestamped pin in effect if the version is a
/// snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub source_id: String,
    pub fetched_at: DateTime<Utc>,
    pub checked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_pin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl RepositoryRecord {
    pub fn new(source_id: &str) -> Self {
        let now = Utc::now();
        Self {
            source_id: source_id.to_string(),
            fetched_at: now,
            checked_at: now,
            snapshot_pin: None,
            checksum: None,
        }
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        match serde_json::from_str(&text) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                debug!("Ignoring unreadable record at {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            GantryError::from(e)
        })?;
        Ok(())
    }

    /// Whether a snapshot check is due. Release records never go stale.
    pub fn is_stale(&self, snapshot: bool, ttl: Duration) -> bool {
        if !snapshot {
            return false;
        }
        let age = Utc::now().signed_duration_since(self.checked_at);
        age.to_std().map(|age| age >= ttl).unwrap_or(false)
    }

    pub fn touch(&mut self) {
        self.checked_at = Utc::now();
    }
}
