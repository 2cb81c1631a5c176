//! Filesystem sources.
//!
//! A package `foo.v1` lives in `<root>/foo/v1/`. J5 sources (`*.j5s`) are
//! JSON-encoded source documents; `.proto` sources go through a
//! [`ProtoParser`] when one is configured and are skipped otherwise.

use crate::config::RepoConfig;
use crate::error::{BuildError, Result};
use crate::source::{DependencySet, LocalSourceResolver, ProseFile, ProtoParser, SourceFile};
use j5_convert::names::{package_for_path, SOURCE_EXT};
use j5_source::ast::parse_source_json;
use j5_source::errpos::PosError;
use j5_source::Span;
use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const PROTO_EXT: &str = ".proto";

pub struct DirectorySource {
    root: PathBuf,
    packages: BTreeSet<String>,
    prose_suffix: String,
    parser: Option<Box<dyn ProtoParser>>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, packages: impl IntoIterator<Item = String>) -> Self {
        Self {
            root: root.into(),
            packages: packages.into_iter().collect(),
            prose_suffix: ".md".to_string(),
            parser: None,
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &RepoConfig) -> Self {
        let mut source = Self::new(root, config.package_names());
        source.prose_suffix = config.prose_suffix.clone();
        source
    }

    pub fn with_proto_parser(mut self, parser: Box<dyn ProtoParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn package_dir(&self, package: &str) -> PathBuf {
        package.split('.').fold(self.root.clone(), |dir, part| dir.join(part))
    }

    /// `/`-separated path relative to the root.
    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    fn read(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))
    }

    fn j5_source(&self, package: &str, filename: String, text: String) -> Result<SourceFile> {
        let mut source = parse_source_json(&text).map_err(|err| {
            let line = err.line.saturating_sub(1) as u32;
            let column = err.column.saturating_sub(1) as u32;
            BuildError::Source {
                filename: filename.clone(),
                errors: PosError::at(filename.clone(), Span::at(line, column), err).into(),
            }
        })?;
        if source.path.is_empty() {
            source.path = filename.clone();
        }
        if source.package.is_empty() {
            source.package = package.to_string();
        }
        SourceFile::j5(source, Some(text)).map_err(|errors| BuildError::Source { filename, errors })
    }
}

impl LocalSourceResolver for DirectorySource {
    fn list_packages(&self) -> Vec<String> {
        self.packages.iter().cloned().collect()
    }

    fn package_for_file(&self, filename: &str) -> Result<(String, bool)> {
        let package = package_for_path(filename).unwrap_or_else(|| {
            let dir = filename.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
            dir.replace('/', ".")
        });
        let local = self.packages.contains(&package);
        Ok((package, local))
    }

    fn is_local_package(&self, package: &str) -> bool {
        self.packages.contains(package)
    }

    fn package_source_files(&self, package: &str) -> Result<Vec<SourceFile>> {
        let dir = self.package_dir(package);
        if !dir.is_dir() {
            return Err(BuildError::PackageNotFound(package.to_string()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                BuildError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(filename) = self.relative(entry.path()) else {
                continue;
            };
            // Nested directories that are packages of their own.
            if package_for_path(&filename).as_deref() != Some(package) {
                continue;
            }

            if filename.ends_with(SOURCE_EXT) {
                let text = self.read(entry.path())?;
                files.push(self.j5_source(package, filename, text)?);
            } else if filename.ends_with(PROTO_EXT) {
                let Some(parser) = &self.parser else {
                    warn!(file = %filename, "no proto parser configured, skipping");
                    continue;
                };
                let text = self.read(entry.path())?;
                let mut parsed = parser
                    .parse_proto(&filename, &text)
                    .map_err(|errors| BuildError::Source {
                        filename: filename.clone(),
                        errors,
                    })?;
                parsed.descriptor.name = Some(filename);
                files.push(SourceFile::proto(parsed, Some(text)));
            }
        }
        debug!(package, files = files.len(), dir = %dir.display(), "read package sources");
        Ok(files)
    }

    fn package_prose_files(&self, package: &str) -> Result<Vec<ProseFile>> {
        let dir = self.package_dir(package);
        let mut prose = Vec::new();
        for entry in WalkDir::new(&dir).max_depth(1).sort_by_file_name() {
            let Ok(entry) = entry else {
                continue;
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(filename) = self.relative(entry.path()) else {
                continue;
            };
            if filename.ends_with(&self.prose_suffix) {
                let content = self.read(entry.path())?;
                prose.push(ProseFile { filename, content });
            }
        }
        Ok(prose)
    }
}

// ============================================================================
// Descriptor set dependencies
// ============================================================================

/// A [`DependencySet`] over a decoded `FileDescriptorSet`.
#[derive(Debug, Clone, Default)]
pub struct DescriptorSetDependencies {
    files: BTreeMap<String, FileDescriptorProto>,
}

impl DescriptorSetDependencies {
    pub fn new(set: FileDescriptorSet) -> Self {
        Self {
            files: set
                .file
                .into_iter()
                .map(|f| (f.name().to_string(), f))
                .collect(),
        }
    }

    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, prost::DecodeError> {
        Ok(Self::new(FileDescriptorSet::decode(bytes)?))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| BuildError::io(path, e))?;
        Self::decode(&bytes).map_err(|source| BuildError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl DependencySet for DescriptorSetDependencies {
    fn list_dependency_files(&self, root: &str) -> Vec<String> {
        self.files
            .keys()
            .filter(|name| name.starts_with(root))
            .cloned()
            .collect()
    }

    fn get_dependency_file(&self, filename: &str) -> Result<Option<FileDescriptorProto>> {
        Ok(self.files.get(filename).cloned())
    }
}
