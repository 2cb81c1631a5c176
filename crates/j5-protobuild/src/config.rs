//! Repository configuration (`j5.yaml`).

use j5_convert::names::is_version_segment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "j5.yaml";
const SUPPORTED_VERSIONS: &[u32] = &[1];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported configuration version {found}, supported: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    #[error("package {0} must end in a version segment, e.g. foo.v1")]
    UnversionedPackage(String),

    #[error("package {0} is listed more than once")]
    DuplicatePackage(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub packages: Vec<PackageConfig>,
    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,
    /// Files with this suffix in a package directory are its prose.
    #[serde(default = "default_prose_suffix")]
    pub prose_suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// A pre-built `FileDescriptorSet`, relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyConfig {
    pub descriptor_set: PathBuf,
}

fn default_version() -> u32 {
    1
}

fn default_prose_suffix() -> String {
    ".md".to_string()
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            packages: Vec::new(),
            dependencies: Vec::new(),
            prose_suffix: default_prose_suffix(),
        }
    }
}

impl RepoConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RepoConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `j5.yaml` from a repository root.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_VERSIONS.contains(&self.version) {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }
        let mut seen = BTreeSet::new();
        for package in &self.packages {
            let versioned = package
                .name
                .rsplit('.')
                .next()
                .is_some_and(is_version_segment);
            if !versioned {
                return Err(ConfigError::UnversionedPackage(package.name.clone()));
            }
            if !seen.insert(package.name.as_str()) {
                return Err(ConfigError::DuplicatePackage(package.name.clone()));
            }
        }
        Ok(())
    }

    pub fn package_names(&self) -> Vec<String> {
        self.packages.iter().map(|p| p.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_packages_and_dependencies() {
        let config = RepoConfig::from_yaml_str(
            r#"
packages:
  - name: foo.v1
  - name: bar.v1
    label: Bar
dependencies:
  - descriptor_set: deps/image.binpb
"#,
        )
        .unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.package_names(), vec!["foo.v1", "bar.v1"]);
        assert_eq!(config.packages[1].label.as_deref(), Some("Bar"));
        assert_eq!(
            config.dependencies[0].descriptor_set,
            PathBuf::from("deps/image.binpb")
        );
        assert_eq!(config.prose_suffix, ".md");
    }

    #[test]
    fn rejects_unversioned_packages() {
        let err = RepoConfig::from_yaml_str("packages:\n  - name: foo\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnversionedPackage(name) if name == "foo"));
    }

    #[test]
    fn rejects_duplicates_and_unknown_versions() {
        let err =
            RepoConfig::from_yaml_str("packages:\n  - name: a.v1\n  - name: a.v1\n").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePackage(_)));

        let err = RepoConfig::from_yaml_str("version: 7\n").unwrap_err();
        assert!(err.to_string().contains("unsupported configuration version 7"));
    }

    #[test]
    fn unknown_keys_are_errors() {
        assert!(matches!(
            RepoConfig::from_yaml_str("pakages: []\n"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
