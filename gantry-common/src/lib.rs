// gantry-common/src/lib.rs
pub mod config;
pub mod error;
pub mod model;

// Re-export key types
pub use config::{Config, RemoteConfig};
pub use error::{GantryError, Result};
pub use model::{
    ClasspathFlags, Coordinate, DependencyDeclaration, Descriptor, Exclusion, Identity,
    ManagedVersion, ResolvedArtifact, Scope, Version, VersionRange,
};
