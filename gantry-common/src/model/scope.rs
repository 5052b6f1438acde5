use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::GantryError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ClasspathFlags: u8 {
        const COMPILE = 0b00000001;
        const RUNTIME = 0b00000010;
        const TEST    = 0b00000100;
    }
}

impl Default for ClasspathFlags {
    fn default() -> Self {
        Self::COMPILE | Self::RUNTIME | Self::TEST
    }
}

impl fmt::Display for ClasspathFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Dependency scope as declared in a descriptor. `System` behaves like
/// `Provided` on classpaths but is satisfied from an explicit local path
/// instead of the repository store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Compile,
    Provided,
    Runtime,
    Test,
    System,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Provided => "provided",
            Scope::Runtime => "runtime",
            Scope::Test => "test",
            Scope::System => "system",
        }
    }

    /// Which classpaths an artifact with this effective scope lands on.
    pub fn classpath_flags(&self) -> ClasspathFlags {
        match self {
            Scope::Compile => {
                ClasspathFlags::COMPILE | ClasspathFlags::RUNTIME | ClasspathFlags::TEST
            }
            Scope::Provided | Scope::System => ClasspathFlags::COMPILE | ClasspathFlags::TEST,
            Scope::Runtime => ClasspathFlags::RUNTIME | ClasspathFlags::TEST,
            Scope::Test => ClasspathFlags::TEST,
        }
    }

    /// Whether a dependency declared with this scope is carried into the
    /// transitive closure at all. `provided`, `test` and `system`
    /// declarations apply only to the module that declares them.
    pub fn propagates_transitively(&self) -> bool {
        matches!(self, Scope::Compile | Scope::Runtime)
    }

    /// Effective scope of a transitive dependency declared with `self`
    /// underneath a parent whose effective scope is `parent`. Returns
    /// `None` when the edge is dropped.
    pub fn effective_under(&self, parent: Scope) -> Option<Scope> {
        match self {
            Scope::Compile => Some(parent),
            Scope::Runtime => match parent {
                Scope::Compile => Some(Scope::Runtime),
                other => Some(other),
            },
            Scope::Provided | Scope::Test | Scope::System => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = GantryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compile" => Ok(Scope::Compile),
            "provided" => Ok(Scope::Provided),
            "runtime" => Ok(Scope::Runtime),
            "test" => Ok(Scope::Test),
            "system" => Ok(Scope::System),
            other => Err(GantryError::ParseError(
                "scope",
                format!("unknown scope '{other}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classpath_membership_per_scope() {
        assert_eq!(Scope::Compile.classpath_flags(), ClasspathFlags::default());
        assert_eq!(
            Scope::Provided.classpath_flags(),
            ClasspathFlags::COMPILE | ClasspathFlags::TEST
        );
        assert_eq!(
            Scope::System.classpath_flags(),
            ClasspathFlags::COMPILE | ClasspathFlags::TEST
        );
        assert_eq!(
            Scope::Runtime.classpath_flags(),
            ClasspathFlags::RUNTIME | ClasspathFlags::TEST
        );
        assert_eq!(Scope::Test.classpath_flags(), ClasspathFlags::TEST);
    }

    #[test]
    fn only_compile_and_runtime_propagate() {
        assert!(Scope::Compile.propagates_transitively());
        assert!(Scope::Runtime.propagates_transitively());
        assert!(!Scope::Provided.propagates_transitively());
        assert!(!Scope::Test.propagates_transitively());
        assert!(!Scope::System.propagates_transitively());
    }

    #[test]
    fn transitive_scope_table() {
        // A compile declaration takes whatever the parent resolved to.
        assert_eq!(Scope::Compile.effective_under(Scope::Compile), Some(Scope::Compile));
        assert_eq!(Scope::Compile.effective_under(Scope::Runtime), Some(Scope::Runtime));
        assert_eq!(Scope::Compile.effective_under(Scope::Test), Some(Scope::Test));
        // Dependencies of a provided parent stay provided, so they reach
        // the compile classpath but never the runtime one.
        assert_eq!(
            Scope::Compile.effective_under(Scope::Provided),
            Some(Scope::Provided)
        );
        // A runtime declaration can weaken compile but nothing else.
        assert_eq!(Scope::Runtime.effective_under(Scope::Compile), Some(Scope::Runtime));
        assert_eq!(Scope::Runtime.effective_under(Scope::Test), Some(Scope::Test));
        assert_eq!(
            Scope::Runtime.effective_under(Scope::Provided),
            Some(Scope::Provided)
        );
        // Provided, test and system edges never travel.
        assert_eq!(Scope::Provided.effective_under(Scope::Compile), None);
        assert_eq!(Scope::Test.effective_under(Scope::Compile), None);
        assert_eq!(Scope::System.effective_under(Scope::Compile), None);
    }

    #[test]
    fn scope_round_trips_through_strings() {
        for scope in [
            Scope::Compile,
            Scope::Provided,
            Scope::Runtime,
            Scope::Test,
            Scope::System,
        ] {
            assert_eq!(scope.as_str().parse::<Scope>().unwrap(), scope);
        }
        assert!("banana".parse::<Scope>().is_err());
        let parsed: Scope = serde_json::from_str("\"provided\"").unwrap();
        assert_eq!(parsed, Scope::Provided);
    }
}
