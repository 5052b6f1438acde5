use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::coordinate::Coordinate;
use crate::model::scope::{ClasspathFlags, Scope};

/// Source id used for artifacts satisfied from an explicit `system_path`
/// rather than the repository store.
pub const SYSTEM_SOURCE_ID: &str = "system";

/// One winner of conflict resolution, ready for classpath assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    pub coordinate: Coordinate,
    /// Effective scope after propagation along the winning path.
    pub scope: Scope,
    pub flags: ClasspathFlags,
    /// Local file the artifact resolved to.
    pub path: PathBuf,
    /// SHA256 of the payload, when the store verified or computed one.
    /// System-path artifacts bypass the store and carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Repository the payload came from, or [`SYSTEM_SOURCE_ID`].
    pub source_id: String,
    /// Coordinates from the request root down to this artifact.
    pub via: Vec<String>,
}

impl ResolvedArtifact {
    pub fn on_classpath(&self, wanted: ClasspathFlags) -> bool {
        self.flags.intersects(wanted)
    }
}
