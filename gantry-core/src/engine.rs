// gantry-core/src/engine.rs
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use gantry_common::model::{
    ClasspathFlags, Descriptor, Identity, ResolvedArtifact, Scope, Version, SYSTEM_SOURCE_ID,
};
use gantry_common::{Config, GantryError, Result};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::graph::GraphBuilder;
use crate::resolve::{ConflictResolver, Displacement, PlannedArtifact};
use crate::store::RepositoryStore;

/// Upper bound on re-expansion rounds when conflict resolution keeps
/// moving versions. The pin set only grows, so hitting the bound means
/// the inputs are pathological rather than merely large.
const MAX_PIN_ROUNDS: usize = 8;

const PHASE_EXPANSION: usize = 0;
const PHASE_CONFLICT: usize = 1;
const PHASE_FETCH: usize = 2;
const PHASE_NAMES: [&str; 3] = ["graph expansion", "conflict resolution", "artifact fetch"];

/// How many payload fetches run at once during materialization.
fn fetch_parallelism() -> usize {
    num_cpus::get_physical().saturating_sub(1).clamp(1, 6)
}

#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    pub root: Descriptor,
}

impl ResolutionRequest {
    pub fn new(root: Descriptor) -> Self {
        Self { root }
    }
}

/// Final outcome of one resolution: winners in breadth-first order with
/// their local paths, plus the displacement diagnostics of the settled
/// round.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub artifacts: Vec<ResolvedArtifact>,
    pub displacements: Vec<Displacement>,
}

impl Resolution {
    /// Artifacts whose flags intersect `wanted`, in resolution order.
    pub fn classpath(&self, wanted: ClasspathFlags) -> Vec<&ResolvedArtifact> {
        self.artifacts
            .iter()
            .filter(|artifact| artifact.on_classpath(wanted))
            .collect()
    }

    pub fn compile_classpath(&self) -> Vec<&ResolvedArtifact> {
        self.classpath(ClasspathFlags::COMPILE)
    }

    pub fn runtime_classpath(&self) -> Vec<&ResolvedArtifact> {
        self.classpath(ClasspathFlags::RUNTIME)
    }

    pub fn test_classpath(&self) -> Vec<&ResolvedArtifact> {
        self.classpath(ClasspathFlags::TEST)
    }

    pub fn find(&self, group: &str, artifact: &str) -> Option<&ResolvedArtifact> {
        self.artifacts
            .iter()
            .find(|a| a.coordinate.group == group && a.coordinate.artifact == artifact)
    }
}

/// Drives graph expansion, conflict resolution and payload materialization
/// under one optional wall-clock deadline.
#[derive(Debug, Clone)]
pub struct ResolutionEngine {
    store: Arc<RepositoryStore>,
    deadline: Option<Duration>,
}

impl ResolutionEngine {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            store: Arc::new(RepositoryStore::new(config)?),
            deadline: config.deadline,
        })
    }

    pub fn with_store(store: Arc<RepositoryStore>, deadline: Option<Duration>) -> Self {
        Self { store, deadline }
    }

    pub fn store(&self) -> &RepositoryStore {
        &self.store
    }

    pub async fn resolve(&self, request: &ResolutionRequest) -> Result<Resolution> {
        self.store.begin_session();
        let phase = AtomicUsize::new(PHASE_EXPANSION);
        match self.deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.run(request, &phase)).await {
                    Ok(result) => result,
                    Err(_) => Err(GantryError::Timeout(format!(
                        "resolving {} exceeded the {:?} deadline during {}",
                        request.root.coordinate(),
                        deadline,
                        PHASE_NAMES[phase.load(Ordering::Relaxed)]
                    ))),
                }
            }
            None => self.run(request, &phase).await,
        }
    }

    /// Runs the resolution on its own task; `join` on the returned handle
    /// rethrows whatever the task produced.
    pub fn resolve_spawned(&self, request: ResolutionRequest) -> ResolutionHandle {
        let engine = self.clone();
        ResolutionHandle {
            handle: tokio::spawn(async move { engine.resolve(&request).await }),
        }
    }

    /// Expansion and conflict resolution alternate until the chosen
    /// versions agree with the expanded subtrees, then the winners are
    /// materialized.
    async fn run(&self, request: &ResolutionRequest, phase: &AtomicUsize) -> Result<Resolution> {
        let mut pins: HashMap<Identity, Version> = HashMap::new();
        let mut round = 0;
        let plan = loop {
            round += 1;
            if round > MAX_PIN_ROUNDS {
                return Err(GantryError::DependencyError(format!(
                    "version pinning did not settle after {MAX_PIN_ROUNDS} rounds for {}",
                    request.root.coordinate()
                )));
            }
            phase.store(PHASE_EXPANSION, Ordering::Relaxed);
            let graph = GraphBuilder::with_pins(&self.store, pins.clone())
                .build(&request.root)
                .await?;
            phase.store(PHASE_CONFLICT, Ordering::Relaxed);
            let plan = ConflictResolver::new(&self.store).resolve(&graph).await?;
            if plan.repins.is_empty() {
                break plan;
            }
            debug!(
                "Round {round}: re-expanding with {} version(s) pinned",
                plan.repins.len()
            );
            for (identity, version) in &plan.repins {
                pins.insert(identity.clone(), version.clone());
            }
        };

        phase.store(PHASE_FETCH, Ordering::Relaxed);
        let displacements = plan.displacements;
        let mut fetches = Vec::with_capacity(plan.artifacts.len());
        for planned in plan.artifacts.iter() {
            fetches.push(self.materialize(planned));
        }
        let results: Vec<Result<Option<ResolvedArtifact>>> = stream::iter(fetches)
            .buffered(fetch_parallelism())
            .collect()
            .await;

        // Every fetch settles before the first failure is rethrown, so the
        // store ends up as warm as the plan allows.
        let mut artifacts = Vec::with_capacity(results.len());
        for result in results {
            if let Some(artifact) = result? {
                artifacts.push(artifact);
            }
        }
        debug!(
            "Resolved {} into {} artifact(s) in {} round(s)",
            request.root.coordinate(),
            artifacts.len(),
            round
        );
        Ok(Resolution {
            artifacts,
            displacements,
        })
    }

    async fn materialize(&self, planned: &PlannedArtifact) -> Result<Option<ResolvedArtifact>> {
        if planned.scope == Scope::System {
            let path = match &planned.system_path {
                Some(path) => path.clone(),
                None => {
                    return Err(GantryError::DependencyError(format!(
                        "system-scoped {} carries no system_path",
                        planned.coordinate
                    )))
                }
            };
            if !path.is_file() {
                return Err(GantryError::NotFound(format!(
                    "system-scoped {} expects a file at {}",
                    planned.coordinate,
                    path.display()
                )));
            }
            return Ok(Some(ResolvedArtifact {
                coordinate: planned.coordinate.clone(),
                scope: planned.scope,
                flags: planned.flags,
                path,
                checksum: None,
                source_id: SYSTEM_SOURCE_ID.to_string(),
                via: planned.via.clone(),
            }));
        }
        match self.store.resolve_file(&planned.coordinate).await {
            Ok(stored) => Ok(Some(ResolvedArtifact {
                coordinate: planned.coordinate.clone(),
                scope: planned.scope,
                flags: planned.flags,
                path: stored.path,
                checksum: stored.checksum,
                source_id: stored.source_id,
                via: planned.via.clone(),
            })),
            Err(e) if planned.optional => {
                warn!("Skipping optional {}: {e}", planned.coordinate);
                Ok(None)
            }
            Err(GantryError::NotFound(msg)) => Err(GantryError::NotFound(format!(
                "{msg}\n  required by: {}",
                planned.via.join(" -> ")
            ))),
            Err(e) => Err(e),
        }
    }

    /// Writes a properties-style report: a stats header, displacement
    /// comments, then one `identity=path` line per resolved artifact.
    pub fn write_report(&self, resolution: &Resolution, path: &Path) -> Result<()> {
        let stats = self.store.stats();
        let mut out = String::new();
        out.push_str(&format!(
            "# resolved {} artifact(s)\n",
            resolution.artifacts.len()
        ));
        out.push_str(&format!(
            "# cache hits {}, remote fetches {}, metadata fetches {}, flight waits {}\n",
            stats.cache_hits(),
            stats.remote_fetches(),
            stats.metadata_fetches(),
            stats.flight_waits()
        ));
        for displacement in &resolution.displacements {
            out.push_str(&format!("# {displacement}\n"));
        }
        for artifact in &resolution.artifacts {
            out.push_str(&format!(
                "{}={}\n",
                artifact.coordinate.identity(),
                artifact.path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &out)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// A resolution running on a spawned task.
pub struct ResolutionHandle {
    handle: JoinHandle<Result<Resolution>>,
}

impl ResolutionHandle {
    pub async fn join(self) -> Result<Resolution> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(GantryError::DependencyError(format!(
                "background resolution failed: {e}"
            ))),
        }
    }
}
