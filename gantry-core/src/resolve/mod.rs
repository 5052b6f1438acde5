// gantry-core/src/resolve/mod.rs
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use gantry_common::model::{ClasspathFlags, Coordinate, Identity, Scope, Version, VersionRange};
use gantry_common::{GantryError, Result};
use tracing::debug;

use crate::graph::{render_versions, DependencyGraph};
use crate::store::RepositoryStore;

/// One artifact selected by conflict resolution, not yet materialized.
#[derive(Debug, Clone)]
pub struct PlannedArtifact {
    pub coordinate: Coordinate,
    /// Effective scope after propagation along the winning path.
    pub scope: Scope,
    pub flags: ClasspathFlags,
    pub optional: bool,
    pub system_path: Option<PathBuf>,
    /// Coordinates from the request root down to the winning occurrence.
    pub via: Vec<String>,
    /// Arena id of the winning occurrence in the expanded graph.
    pub node: usize,
}

/// A graph occurrence that lost nearest-wins to another version.
#[derive(Debug, Clone)]
pub struct Displacement {
    pub loser: Coordinate,
    pub winner: Version,
    pub path: String,
}

impl fmt::Display for Displacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} omitted for conflict with {} ({})",
            self.loser, self.winner, self.path
        )
    }
}

/// Outcome of conflict resolution over one expanded graph. When `repins`
/// is non-empty the chosen versions disagree with the expanded ones and
/// the engine re-expands with them pinned before trusting `artifacts`.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPlan {
    /// Winners in breadth-first order: by depth, then discovery sequence.
    pub artifacts: Vec<PlannedArtifact>,
    pub displacements: Vec<Displacement>,
    pub repins: HashMap<Identity, Version>,
}

/// Collapses a [`DependencyGraph`] to one version per identity.
///
/// Nearest wins: the smallest depth, breaking ties by discovery order.
/// Occurrences below a displaced occurrence are dead, but the displaced
/// occurrence itself still contributes its hard range when the surviving
/// version is solved.
pub struct ConflictResolver<'a> {
    store: &'a RepositoryStore,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(store: &'a RepositoryStore) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, graph: &DependencyGraph) -> Result<ResolutionPlan> {
        let mut order: Vec<usize> = (1..graph.len()).collect();
        order.sort_by_key(|&id| (graph.node(id).depth, id));

        // Single pass in (depth, discovery) order: every node's parent is
        // classified before the node itself, so a recorded winner is final.
        // A node is live when its parent is the root or the winning
        // occurrence of the parent's identity.
        let mut winners: HashMap<Identity, usize> = HashMap::new();
        let mut live = vec![false; graph.len()];
        if !graph.is_empty() {
            live[0] = true;
        }
        for &id in &order {
            let node = graph.node(id);
            let parent = match node.parent {
                Some(parent) => parent,
                None => continue,
            };
            let parent_won =
                parent == 0 || winners.get(&graph.node(parent).identity()) == Some(&parent);
            if !live[parent] || !parent_won {
                continue;
            }
            live[id] = true;
            winners.entry(node.identity()).or_insert(id);
        }

        // Live occurrences per identity, nearest first.
        let mut members: HashMap<Identity, Vec<usize>> = HashMap::new();
        for &id in &order {
            if live[id] {
                members
                    .entry(graph.node(id).identity())
                    .or_default()
                    .push(id);
            }
        }

        let mut solved: HashMap<Identity, Version> = HashMap::new();
        let mut repins: HashMap<Identity, Version> = HashMap::new();
        for &id in &order {
            let identity = graph.node(id).identity();
            if winners.get(&identity) != Some(&id) {
                continue;
            }
            let version = self
                .solve_version(graph, &identity, id, &members[&identity])
                .await?;
            if version != graph.node(id).coordinate.version {
                debug!(
                    "Settling {} at {} instead of the expanded {}",
                    identity,
                    version,
                    graph.node(id).coordinate.version
                );
                repins.insert(identity.clone(), version.clone());
            }
            solved.insert(identity, version);
        }

        // Effective scopes flow parent to child along winning paths only;
        // processing order guarantees the parent's scope is already known.
        let mut effective: HashMap<usize, Scope> = HashMap::new();
        let mut artifacts = Vec::new();
        let mut displacements = Vec::new();
        for &id in &order {
            if !live[id] {
                continue;
            }
            let node = graph.node(id);
            let identity = node.identity();
            if winners.get(&identity) != Some(&id) {
                let winner = solved[&identity].clone();
                if node.coordinate.version == winner {
                    debug!(
                        "Dropping duplicate {} at {}",
                        node.coordinate,
                        graph.path_to(id)
                    );
                } else {
                    displacements.push(Displacement {
                        loser: node.coordinate.clone(),
                        winner,
                        path: graph.path_to(id),
                    });
                }
                continue;
            }
            let scope = if node.depth <= 1 {
                node.declared_scope
            } else {
                let parent_scope = match node.parent.and_then(|p| effective.get(&p).copied()) {
                    Some(scope) => scope,
                    None => {
                        debug!("Skipping {} below a dropped edge", node.coordinate);
                        continue;
                    }
                };
                match node.declared_scope.effective_under(parent_scope) {
                    Some(scope) => scope,
                    None => {
                        debug!(
                            "Dropping non-propagating {}-scope edge {}",
                            node.declared_scope, node.coordinate
                        );
                        continue;
                    }
                }
            };
            effective.insert(id, scope);
            let version = solved[&identity].clone();
            artifacts.push(PlannedArtifact {
                coordinate: node.coordinate.with_version(version),
                scope,
                flags: scope.classpath_flags(),
                optional: node.optional,
                system_path: node.system_path.clone(),
                via: graph.via(id),
                node: id,
            });
        }

        debug!(
            "Planned {} artifact(s), displaced {}, repinning {}",
            artifacts.len(),
            displacements.len(),
            repins.len()
        );
        Ok(ResolutionPlan {
            artifacts,
            displacements,
            repins,
        })
    }

    /// One version for every live occurrence of `identity`: intersect the
    /// hard ranges, then prefer the nearest soft recommendation inside the
    /// intersection, then the highest known candidate.
    async fn solve_version(
        &self,
        graph: &DependencyGraph,
        identity: &Identity,
        winner_id: usize,
        members: &[usize],
    ) -> Result<Version> {
        let mut intersection: Option<VersionRange> = None;
        let mut constraints: Vec<(String, String)> = Vec::new();
        for &id in members {
            let node = graph.node(id);
            if node.range.is_hard() {
                constraints.push((node.range.to_string(), graph.path_to(id)));
                intersection = Some(match intersection {
                    None => node.range.clone(),
                    Some(current) => current.intersect(&node.range),
                });
            }
        }

        let intersection = match intersection {
            // No hard requirement anywhere: the nearest declaration fixed
            // the version during expansion.
            None => return Ok(graph.node(winner_id).coordinate.version.clone()),
            Some(intersection) => intersection,
        };
        if intersection.is_empty() {
            return Err(unresolvable(
                identity,
                "the hard ranges do not overlap",
                &constraints,
            ));
        }

        for &id in members {
            let node = graph.node(id);
            if let Some(recommendation) = node.range.soft_recommendation() {
                if intersection.contains(recommendation) {
                    return Ok(recommendation.clone());
                }
            }
        }

        let mut candidates = self
            .store
            .list_versions(&identity.group, &identity.artifact)
            .await;
        for &id in members {
            candidates.push(graph.node(id).coordinate.version.clone());
        }
        candidates.sort();
        candidates.dedup();
        match intersection.pick_highest_satisfying(&candidates) {
            Some(version) => Ok(version),
            None => Err(unresolvable(
                identity,
                &format!(
                    "no known version satisfies every range (candidates: {})",
                    render_versions(&candidates)
                ),
                &constraints,
            )),
        }
    }
}

fn unresolvable(
    identity: &Identity,
    reason: &str,
    constraints: &[(String, String)],
) -> GantryError {
    let mut details = String::from(reason);
    for (range, path) in constraints {
        details.push_str(&format!("\n  {range} required by {path}"));
    }
    GantryError::Unresolvable {
        identity: identity.to_string(),
        details,
    }
}
