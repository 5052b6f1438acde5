// gantry-core/src/lib.rs

// Top-level modules of the resolution library.
pub mod engine;
pub mod graph;
pub mod realm;
pub mod resolve;
pub mod store;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export the types callers need for a whole resolution without
// reaching into submodules.
pub use engine::{Resolution, ResolutionEngine, ResolutionHandle, ResolutionRequest};
pub use graph::{DependencyGraph, GraphBuilder, GraphNode};
pub use realm::{plugin_realm_id, Realm, RealmDescriptor, RealmManager, PLUGIN_REALM_PREFIX};
pub use resolve::{ConflictResolver, Displacement, PlannedArtifact, ResolutionPlan};
pub use store::flight::FetchStats;
pub use store::{RepositoryStore, StoredFile, LOCAL_SOURCE_ID};
