// gantry-common/src/model/mod.rs
pub mod artifact;
pub mod coordinate;
pub mod dependency;
pub mod descriptor;
pub mod range;
pub mod scope;
pub mod version;

pub use artifact::{ResolvedArtifact, SYSTEM_SOURCE_ID};
pub use coordinate::{Coordinate, Identity};
pub use dependency::{DependencyDeclaration, Exclusion};
pub use descriptor::{Descriptor, ManagedVersion};
pub use range::VersionRange;
pub use scope::{ClasspathFlags, Scope};
pub use version::Version;
