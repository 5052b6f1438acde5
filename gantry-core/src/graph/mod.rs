// gantry-core/src/graph/mod.rs
use std::collections::HashMap;
use std::path::PathBuf;

use async_recursion::async_recursion;
use futures::future::join_all;
use gantry_common::model::{
    Coordinate, DependencyDeclaration, Descriptor, Exclusion, Identity, Scope, Version,
    VersionRange,
};
use gantry_common::{GantryError, Result};
use tracing::{debug, warn};

use crate::store::RepositoryStore;

/// One expansion of a dependency declaration. Node 0 is the root project
/// itself; its direct dependencies sit at depth 1.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub coordinate: Coordinate,
    pub declared_scope: Scope,
    pub range: VersionRange,
    pub depth: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Exclusions in force below this node: every ancestor's plus this
    /// edge's own.
    pub exclusions: Vec<Exclusion>,
    pub optional: bool,
    pub system_path: Option<PathBuf>,
}

impl GraphNode {
    pub fn identity(&self) -> Identity {
        self.coordinate.identity()
    }
}

/// Raw expansion output: an arena of nodes in preorder discovery order, so
/// the arena index doubles as the discovery sequence number. The same
/// identity may appear several times at different versions and depths; the
/// conflict resolver collapses them to winners.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
}

impl DependencyGraph {
    pub fn root(&self) -> &GraphNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: usize) -> &GraphNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Coordinates from the root project down to `id`.
    pub fn via(&self, id: usize) -> Vec<String> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(i) = cursor {
            chain.push(self.nodes[i].coordinate.to_string());
            cursor = self.nodes[i].parent;
        }
        chain.reverse();
        chain
    }

    /// The `via` chain rendered for error messages.
    pub fn path_to(&self, id: usize) -> String {
        self.via(id).join(" -> ")
    }
}

/// Expands a root descriptor into a [`DependencyGraph`] against the store.
/// Pins force specific versions per identity; the engine supplies them when
/// conflict resolution settles on a version other than the expanded one.
pub struct GraphBuilder<'a> {
    store: &'a RepositoryStore,
    pins: HashMap<Identity, Version>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(store: &'a RepositoryStore) -> Self {
        Self {
            store,
            pins: HashMap::new(),
        }
    }

    pub fn with_pins(store: &'a RepositoryStore, pins: HashMap<Identity, Version>) -> Self {
        Self { store, pins }
    }

    pub async fn build(&self, root: &Descriptor) -> Result<DependencyGraph> {
        let managed: HashMap<Identity, Version> = root
            .dependency_management
            .iter()
            .map(|entry| (entry.identity(), entry.version.clone()))
            .collect();
        let mut graph = DependencyGraph {
            nodes: vec![GraphNode {
                coordinate: root.coordinate(),
                declared_scope: Scope::Compile,
                range: VersionRange::Soft(root.version.clone()),
                depth: 0,
                parent: None,
                children: Vec::new(),
                exclusions: Vec::new(),
                optional: false,
                system_path: None,
            }],
        };
        self.expand(&mut graph, 0, &root.dependencies, &managed)
            .await?;
        debug!(
            "Expanded {} into {} node(s)",
            root.coordinate(),
            graph.len() - 1
        );
        Ok(graph)
    }

    #[async_recursion]
    async fn expand(
        &self,
        graph: &mut DependencyGraph,
        parent_id: usize,
        declarations: &[DependencyDeclaration],
        managed: &HashMap<Identity, Version>,
    ) -> Result<()> {
        let depth = graph.nodes[parent_id].depth + 1;
        let inherited = graph.nodes[parent_id].exclusions.clone();

        // First pass: decide which declarations expand, and into which
        // concrete version, in declaration order.
        let mut planned: Vec<(DependencyDeclaration, Coordinate)> = Vec::new();
        for decl in declarations {
            if decl.is_excluded_by(&inherited) {
                debug!(
                    "Excluding {}:{} below {}",
                    decl.group,
                    decl.artifact,
                    graph.nodes[parent_id].coordinate
                );
                continue;
            }
            if depth > 1 && !decl.scope.propagates_transitively() {
                debug!(
                    "Dropping transitive {}-scope edge {}:{}",
                    decl.scope, decl.group, decl.artifact
                );
                continue;
            }
            if depth > 1 && decl.optional {
                debug!(
                    "Dropping optional transitive {}:{}",
                    decl.group, decl.artifact
                );
                continue;
            }
            let identity = decl.identity();
            if let Some(cycle) = cycle_path(graph, parent_id, &identity) {
                return Err(GantryError::Cycle(cycle));
            }
            if decl.scope == Scope::System && decl.system_path.is_none() {
                let err = GantryError::DependencyError(format!(
                    "system-scoped {}:{} declares no system_path",
                    decl.group, decl.artifact
                ));
                if decl.optional {
                    warn!("Skipping optional dependency: {err}");
                    continue;
                }
                return Err(err);
            }
            let version = match self.choose_version(decl, &identity, managed).await {
                Ok(version) => version,
                Err(e) if decl.optional => {
                    warn!(
                        "Skipping optional dependency {}:{}: {e}",
                        decl.group, decl.artifact
                    );
                    continue;
                }
                Err(e) => {
                    return Err(annotate(
                        e,
                        &format!("{} -> {}:{}", graph.path_to(parent_id), decl.group, decl.artifact),
                    ))
                }
            };
            let coordinate = Coordinate {
                group: decl.group.clone(),
                artifact: decl.artifact.clone(),
                version,
                kind: decl.kind.clone(),
                classifier: decl.classifier.clone(),
            };
            planned.push((decl.clone(), coordinate));
        }

        // Second pass: warm the descriptor cache for all siblings at once.
        // Failures resurface per-declaration below, in deterministic order.
        let prefetch = planned
            .iter()
            .filter(|(decl, _)| decl.scope != Scope::System)
            .map(|(_, coordinate)| self.store.resolve_descriptor(coordinate));
        let _ = join_all(prefetch).await;

        // Third pass: append nodes and recurse, single-writer.
        for (decl, coordinate) in planned {
            let node_id = graph.nodes.len();
            let mut exclusions = inherited.clone();
            exclusions.extend(decl.exclusions.iter().cloned());
            graph.nodes.push(GraphNode {
                coordinate: coordinate.clone(),
                declared_scope: decl.scope,
                range: decl.range.clone(),
                depth,
                parent: Some(parent_id),
                children: Vec::new(),
                exclusions,
                optional: decl.optional,
                system_path: decl.system_path.clone(),
            });
            graph.nodes[parent_id].children.push(node_id);

            if decl.scope == Scope::System {
                // System artifacts carry no descriptor and expand nothing.
                continue;
            }
            match self.store.resolve_descriptor(&coordinate).await {
                Ok(descriptor) => {
                    self.expand(graph, node_id, &descriptor.dependencies, managed)
                        .await?;
                }
                Err(e) if decl.optional => {
                    warn!(
                        "Optional dependency {} has no readable descriptor: {e}",
                        coordinate
                    );
                }
                Err(e) => return Err(annotate(e, &graph.path_to(node_id))),
            }
        }
        Ok(())
    }

    /// Concrete version for one declaration: an engine pin beats everything;
    /// a root-managed version overrides a soft recommendation; hard ranges
    /// pick the highest known candidate.
    async fn choose_version(
        &self,
        decl: &DependencyDeclaration,
        identity: &Identity,
        managed: &HashMap<Identity, Version>,
    ) -> Result<Version> {
        if let Some(pinned) = self.pins.get(identity) {
            debug!("Using pinned version {pinned} for {identity}");
            return Ok(pinned.clone());
        }
        if decl.scope == Scope::System {
            return match decl.range.soft_recommendation() {
                Some(version) => Ok(version.clone()),
                None => Err(GantryError::DependencyError(format!(
                    "system-scoped {identity} cannot use a version range"
                ))),
            };
        }
        if let Some(recommendation) = decl.range.soft_recommendation() {
            if let Some(managed_version) = managed.get(identity) {
                debug!(
                    "Managed version {managed_version} overrides {recommendation} for {identity}"
                );
                return Ok(managed_version.clone());
            }
            return Ok(recommendation.clone());
        }
        let candidates = self.store.list_versions(&decl.group, &decl.artifact).await;
        match decl.range.pick_highest_satisfying(&candidates) {
            Some(version) => Ok(version),
            None => Err(GantryError::Unresolvable {
                identity: identity.to_string(),
                details: format!(
                    "no known version satisfies {} (candidates: {})",
                    decl.range,
                    render_versions(&candidates)
                ),
            }),
        }
    }
}

/// Looks for `identity` along the ancestor chain of `parent_id`. A match
/// means the declaration closes a cycle; the rendered path runs from the
/// matching ancestor back down to the repeated identity.
fn cycle_path(graph: &DependencyGraph, parent_id: usize, identity: &Identity) -> Option<String> {
    let mut chain = Vec::new();
    let mut cursor = Some(parent_id);
    let mut hit = None;
    while let Some(i) = cursor {
        chain.push(i);
        if graph.nodes[i].identity() == *identity {
            hit = Some(chain.len() - 1);
            break;
        }
        cursor = graph.nodes[i].parent;
    }
    hit.map(|idx| {
        let mut names: Vec<String> = chain[..=idx]
            .iter()
            .rev()
            .map(|&i| graph.nodes[i].identity().to_string())
            .collect();
        names.push(identity.to_string());
        names.join(" -> ")
    })
}

fn annotate(err: GantryError, path: &str) -> GantryError {
    match err {
        GantryError::NotFound(msg) => {
            GantryError::NotFound(format!("{msg}\n  required by: {path}"))
        }
        GantryError::Unresolvable { identity, details } => GantryError::Unresolvable {
            identity,
            details: format!("{details}\n  required by: {path}"),
        },
        other => other,
    }
}

pub(crate) fn render_versions(versions: &[Version]) -> String {
    if versions.is_empty() {
        "none".to_string()
    } else {
        versions
            .iter()
            .map(Version::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
