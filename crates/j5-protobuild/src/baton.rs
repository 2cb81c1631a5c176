//! Circular package dependency detection.

use thiserror::Error;

/// Loading `dependency` from the end of `chain` would re-enter a package
/// already being loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circular dependency: {} -> {dependency}", chain.join(" -> "))]
pub struct CircularDependencyError {
    pub chain: Vec<String>,
    pub dependency: String,
}

/// The chain of packages currently being loaded, outermost first.
///
/// Each recursive load gets its own copy, extended by one name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveBaton {
    chain: Vec<String>,
}

impl ResolveBaton {
    pub fn new() -> Self {
        Self::default()
    }

    /// The baton for loading `package` from here.
    pub fn clone_for(&self, package: &str) -> Result<Self, CircularDependencyError> {
        if self.chain.iter().any(|p| p == package) {
            return Err(CircularDependencyError {
                chain: self.chain.clone(),
                dependency: package.to_string(),
            });
        }
        let mut chain = self.chain.clone();
        chain.push(package.to_string());
        Ok(Self { chain })
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentry_reports_the_whole_chain() {
        let baton = ResolveBaton::new()
            .clone_for("a.v1")
            .and_then(|b| b.clone_for("b.v1"))
            .unwrap();
        assert_eq!(baton.chain(), ["a.v1", "b.v1"]);

        let err = baton.clone_for("a.v1").unwrap_err();
        assert_eq!(err.chain, vec!["a.v1", "b.v1"]);
        assert_eq!(err.dependency, "a.v1");
        assert_eq!(err.to_string(), "circular dependency: a.v1 -> b.v1 -> a.v1");
    }

    #[test]
    fn siblings_do_not_conflict() {
        let root = ResolveBaton::new().clone_for("app.v1").unwrap();
        assert!(root.clone_for("lib.v1").is_ok());
        assert!(root.clone_for("lib.v1").is_ok());
    }
}
