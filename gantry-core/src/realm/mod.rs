// gantry-core/src/realm/mod.rs
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use gantry_common::model::{Coordinate, ResolvedArtifact};
use gantry_common::{GantryError, Result};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

/// Id prefix marking realms built for plugin execution. Such realms are
/// leaves: they never parent another realm, so two plugins can only share
/// classes through a common parent's imports.
pub const PLUGIN_REALM_PREFIX: &str = "plugin>";

pub fn plugin_realm_id(plugin: &Coordinate) -> String {
    format!("{PLUGIN_REALM_PREFIX}{plugin}")
}

/// Everything needed to build a realm. `provides` lists the package
/// prefixes the realm's own artifacts contain, which keeps symbol lookup a
/// pure function over descriptors instead of something that reads archives.
#[derive(Debug, Clone, Default)]
pub struct RealmDescriptor {
    pub id: String,
    pub artifacts: Vec<ResolvedArtifact>,
    pub provides: Vec<String>,
    /// Package prefixes delegated to the parent before self.
    pub imports: Vec<String>,
    pub parent: Option<Arc<Realm>>,
}

/// An isolation domain: a fixed, ordered artifact list plus visibility
/// rules. A realm never changes after construction; rebuilding makes a new
/// instance while existing holders keep the one they have.
#[derive(Debug)]
pub struct Realm {
    id: String,
    instance: Uuid,
    artifacts: Vec<PathBuf>,
    provides: Vec<String>,
    imports: Vec<String>,
    parent: Option<Arc<Realm>>,
    fingerprint: String,
}

impl Realm {
    fn build(descriptor: RealmDescriptor) -> Self {
        let artifacts: Vec<PathBuf> = descriptor
            .artifacts
            .iter()
            .map(|artifact| artifact.path.clone())
            .collect();
        let fingerprint = fingerprint_of(&artifacts);
        Self {
            id: descriptor.id,
            instance: Uuid::new_v4(),
            artifacts,
            provides: descriptor.provides,
            imports: descriptor.imports,
            parent: descriptor.parent,
            fingerprint,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identifies one built instance; a rebuild of the same id gets a new
    /// one.
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn parent(&self) -> Option<&Arc<Realm>> {
        self.parent.as_ref()
    }

    pub fn is_plugin_realm(&self) -> bool {
        self.id.starts_with(PLUGIN_REALM_PREFIX)
    }

    fn provides_symbol(&self, symbol: &str) -> bool {
        self.provides
            .iter()
            .any(|prefix| prefix_matches(prefix, symbol))
    }

    fn imports_symbol(&self, symbol: &str) -> bool {
        self.imports
            .iter()
            .any(|prefix| prefix_matches(prefix, symbol))
    }

    /// Resolves a package-qualified symbol to the realm that provides it.
    /// Imported prefixes consult the parent chain before this realm's own
    /// artifacts; everything else searches self before the parent. Sibling
    /// realms are structurally unreachable from here.
    pub fn locate(&self, symbol: &str) -> Option<&Realm> {
        if self.imports_symbol(symbol) {
            if let Some(parent) = &self.parent {
                if let Some(found) = parent.locate(symbol) {
                    return Some(found);
                }
            }
            if self.provides_symbol(symbol) {
                return Some(self);
            }
            return None;
        }
        if self.provides_symbol(symbol) {
            return Some(self);
        }
        match &self.parent {
            Some(parent) => parent.locate(symbol),
            None => None,
        }
    }
}

/// Dot-boundary prefix match: `org.example` covers `org.example` itself
/// and `org.example.web.Handler`, but not `org.examples`. A literal `*`
/// matches everything.
fn prefix_matches(prefix: &str, symbol: &str) -> bool {
    if prefix == "*" {
        return true;
    }
    match symbol.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

fn fingerprint_of(paths: &[PathBuf]) -> String {
    let mut hasher = Sha256::new();
    for path in paths {
        hasher.update(path.display().to_string().as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Registry of live realms. Borrowers hold `Arc<Realm>`, so destroying or
/// replacing a realm never invalidates a lookup already in progress; the
/// registry only controls what new borrowers see.
#[derive(Debug, Default)]
pub struct RealmManager {
    realms: Mutex<HashMap<String, Arc<Realm>>>,
}

impl RealmManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_realm(&self, descriptor: RealmDescriptor) -> Result<Arc<Realm>> {
        if descriptor.id.is_empty() {
            return Err(GantryError::Realm("realm id must not be empty".into()));
        }
        if let Some(parent) = &descriptor.parent {
            if parent.is_plugin_realm() {
                return Err(GantryError::Realm(format!(
                    "plugin realm '{}' cannot parent '{}'",
                    parent.id, descriptor.id
                )));
            }
        }
        let realm = Arc::new(Realm::build(descriptor));
        let mut realms = self.lock()?;
        match realms.insert(realm.id.clone(), Arc::clone(&realm)) {
            Some(previous) => debug!(
                "Replaced realm {} ({} -> {})",
                realm.id, previous.instance, realm.instance
            ),
            None => debug!("Created realm {} ({})", realm.id, realm.instance),
        }
        Ok(realm)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Realm>> {
        self.lock().ok()?.get(id).cloned()
    }

    pub fn destroy_realm(&self, id: &str) -> Result<()> {
        let removed = self.lock()?.remove(id);
        match removed {
            Some(realm) => {
                debug!("Destroyed realm {} ({})", realm.id, realm.instance);
                Ok(())
            }
            None => Err(GantryError::Realm(format!("no realm '{id}' to destroy"))),
        }
    }

    /// Builds or reuses the realm for one plugin. Reuse requires the same
    /// artifact fingerprint under the same parent instance; anything else
    /// builds a fresh instance and swaps it in, leaving in-flight users of
    /// the old one undisturbed.
    pub fn realm_for_plugin(
        &self,
        plugin: &Coordinate,
        artifacts: &[ResolvedArtifact],
        parent: Option<Arc<Realm>>,
        imports: Vec<String>,
        provides: Vec<String>,
    ) -> Result<Arc<Realm>> {
        let id = plugin_realm_id(plugin);
        let paths: Vec<PathBuf> = artifacts
            .iter()
            .map(|artifact| artifact.path.clone())
            .collect();
        let fingerprint = fingerprint_of(&paths);
        {
            let realms = self.lock()?;
            if let Some(existing) = realms.get(&id) {
                if existing.fingerprint == fingerprint
                    && parent_instance(&existing.parent) == parent_instance(&parent)
                {
                    debug!("Reusing realm {} ({})", id, existing.instance);
                    return Ok(Arc::clone(existing));
                }
            }
        }
        self.create_realm(RealmDescriptor {
            id,
            artifacts: artifacts.to_vec(),
            provides,
            imports,
            parent,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<Realm>>>> {
        self.realms
            .lock()
            .map_err(|_| GantryError::Realm("realm registry lock poisoned".into()))
    }
}

fn parent_instance(parent: &Option<Arc<Realm>>) -> Option<Uuid> {
    parent.as_ref().map(|realm| realm.instance)
}
