//! Packages: loading, ordering, building and linting.
//!
//! A [`PackageSet`] owns everything one compilation run shares: the loaded
//! packages, the resolved-file cache, the symbol table and the linked files.
//! A package moves through [`PackageState`] in order; loading is recursive
//! and guarded by a [`ResolveBaton`].

use crate::baton::ResolveBaton;
use crate::builtin::BuiltinCatalog;
use crate::dag::{sort_dag, DagNode};
use crate::error::{BuildError, Result};
use crate::linker::{link_file, LinkedFile, Symbols, UnusedImport};
use crate::lint::{FileDiagnostics, LintReport};
use crate::source::{
    proto_file_summary, DependencySet, LocalSourceResolver, ProseFile, SourceBody, SourceFile,
};
use j5_convert::{convert_j5_file, ResolveError, TypeRef, TypeResolver};
use j5_source::errpos::{PosError, PosErrors};
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PackageState {
    /// Source files read and summarized; dependency names known.
    Summarized,
    /// Every direct dependency loaded, without cycles.
    DependenciesResolved,
    /// Converted and linked.
    Built,
}

/// The linked output of one package.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPackage {
    pub name: String,
    pub proto: Vec<LinkedFile>,
    pub prose: Vec<ProseFile>,
    pub dependencies: Vec<BuiltPackage>,
}

impl BuiltPackage {
    /// This package's files, preceded by those of its dependencies.
    pub fn file_descriptor_set(&self) -> FileDescriptorSet {
        flatten_descriptor_set(std::slice::from_ref(self))
    }
}

/// Every local file of `packages` and their dependencies, dependencies
/// first, each file once.
pub fn flatten_descriptor_set(packages: &[BuiltPackage]) -> FileDescriptorSet {
    fn visit(package: &BuiltPackage, seen: &mut BTreeSet<String>, out: &mut Vec<FileDescriptorProto>) {
        for dep in &package.dependencies {
            visit(dep, seen, out);
        }
        for file in &package.proto {
            if seen.insert(file.name().to_string()) {
                out.push(file.descriptor.clone());
            }
        }
    }

    let mut seen = BTreeSet::new();
    let mut file = Vec::new();
    for package in packages {
        visit(package, &mut seen, &mut file);
    }
    FileDescriptorSet { file }
}

#[derive(Debug)]
struct Package {
    state: PackageState,
    source_files: Vec<SourceFile>,
    prose: Vec<ProseFile>,
    /// Keyed by full name.
    exports: BTreeMap<String, TypeRef>,
    direct_dependencies: Vec<String>,
    materialized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FileOrigin {
    Local { package: String, source: String },
    Dependency,
    Builtin,
}

#[derive(Debug, Clone)]
struct ResolvedFile {
    descriptor: FileDescriptorProto,
    origin: FileOrigin,
}

pub struct PackageSet {
    local: Box<dyn LocalSourceResolver>,
    dependencies: Vec<Box<dyn DependencySet>>,
    builtin: BuiltinCatalog,
    packages: BTreeMap<String, Package>,
    built: BTreeMap<String, BuiltPackage>,
    /// Successful file resolutions only.
    files: BTreeMap<String, ResolvedFile>,
    symbols: Symbols,
    linked: BTreeMap<String, LinkedFile>,
    /// Files being linked, outermost first.
    linking: Vec<String>,
}

impl PackageSet {
    pub fn new(local: Box<dyn LocalSourceResolver>) -> Self {
        Self {
            local,
            dependencies: Vec::new(),
            builtin: BuiltinCatalog::new(),
            packages: BTreeMap::new(),
            built: BTreeMap::new(),
            files: BTreeMap::new(),
            symbols: Symbols::new(),
            linked: BTreeMap::new(),
            linking: Vec::new(),
        }
    }

    pub fn with_builtin(mut self, catalog: BuiltinCatalog) -> Self {
        self.builtin = catalog;
        self
    }

    /// Add a dependency set. Sets are consulted in the order they were added.
    pub fn with_dependencies(mut self, dependencies: Box<dyn DependencySet>) -> Self {
        self.dependencies.push(dependencies);
        self
    }

    pub fn package_state(&self, name: &str) -> Option<PackageState> {
        self.packages.get(name).map(|p| p.state)
    }

    pub fn list_packages(&self) -> Vec<String> {
        self.local.list_packages()
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    fn load_package(&mut self, name: &str, baton: &ResolveBaton) -> Result<()> {
        let baton = baton.clone_for(name)?;
        if self
            .packages
            .get(name)
            .is_some_and(|p| p.state >= PackageState::DependenciesResolved)
        {
            return Ok(());
        }
        if !self.local.is_local_package(name) {
            return Err(BuildError::PackageNotFound(name.to_string()));
        }
        if !self.packages.contains_key(name) {
            let package = self.summarize(name)?;
            self.packages.insert(name.to_string(), package);
        }

        let dependencies = self
            .packages
            .get(name)
            .map(|p| p.direct_dependencies.clone())
            .unwrap_or_default();
        for dep in &dependencies {
            self.load_package(dep, &baton)?;
        }
        if let Some(package) = self.packages.get_mut(name) {
            package.state = PackageState::DependenciesResolved;
        }
        debug!(package = name, dependencies = ?dependencies, "resolved package dependencies");
        Ok(())
    }

    fn summarize(&self, name: &str) -> Result<Package> {
        let source_files = self.local.package_source_files(name)?;
        let prose = self.local.package_prose_files(name)?;

        let mut exports = BTreeMap::new();
        let mut dependencies = BTreeSet::new();
        for file in &source_files {
            exports.extend(file.summary.exports.clone());
            for package in file.summary.package_dependencies() {
                if self.local.is_local_package(&package) {
                    dependencies.insert(package);
                }
            }
            for import in &file.summary.file_dependencies {
                let (package, local) = self.local.package_for_file(import)?;
                if local {
                    dependencies.insert(package);
                }
            }
        }
        dependencies.remove(name);

        debug!(
            package = name,
            files = source_files.len(),
            exports = exports.len(),
            "summarized package"
        );
        Ok(Package {
            state: PackageState::Summarized,
            source_files,
            prose,
            exports,
            direct_dependencies: dependencies.into_iter().collect(),
            materialized: false,
        })
    }

    fn package(&self, name: &str) -> Result<&Package> {
        self.packages
            .get(name)
            .ok_or_else(|| BuildError::PackageNotFound(name.to_string()))
    }

    // ------------------------------------------------------------------
    // Ordering and building
    // ------------------------------------------------------------------

    /// The packages `names` need, dependencies first.
    pub fn build_order(&mut self, names: &[String]) -> Result<Vec<String>> {
        for name in names {
            self.load_package(name, &ResolveBaton::new())?;
        }

        let mut nodes = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack: Vec<String> = names.iter().rev().cloned().collect();
        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let package = self.package(&name)?;
            let mut node = DagNode::new(&name);
            for dep in &package.direct_dependencies {
                node = node.blocked_by(dep);
                stack.push(dep.clone());
            }
            nodes.push(node);
        }
        Ok(sort_dag(&nodes)?)
    }

    /// Load, convert and link one package and everything it depends on.
    pub fn compile_package(&mut self, name: &str) -> Result<BuiltPackage> {
        self.load_package(name, &ResolveBaton::new())?;
        self.build_loaded(name)
    }

    /// Build several packages. The result lists every package reached,
    /// dependencies first, each once.
    pub fn build_packages(&mut self, names: &[String]) -> Result<Vec<BuiltPackage>> {
        let order = self.build_order(names)?;
        info!(packages = ?order, "building packages");
        order.iter().map(|name| self.build_loaded(name)).collect()
    }

    fn build_loaded(&mut self, name: &str) -> Result<BuiltPackage> {
        if let Some(built) = self.built.get(name) {
            return Ok(built.clone());
        }

        let dependency_names = self.package(name)?.direct_dependencies.clone();
        let mut dependencies = Vec::with_capacity(dependency_names.len());
        for dep in &dependency_names {
            dependencies.push(self.build_loaded(dep)?);
        }

        self.materialize(name)?;
        let package = self.package(name)?;
        let produced: Vec<String> = package
            .source_files
            .iter()
            .flat_map(|f| f.summary.produces.iter().cloned())
            .collect();
        let prose = package.prose.clone();

        let mut proto = Vec::with_capacity(produced.len());
        for filename in &produced {
            proto.push(self.link(filename)?);
        }

        let built = BuiltPackage {
            name: name.to_string(),
            proto,
            prose,
            dependencies,
        };
        if let Some(package) = self.packages.get_mut(name) {
            package.state = PackageState::Built;
        }
        info!(package = name, files = built.proto.len(), "built package");
        self.built.insert(name.to_string(), built.clone());
        Ok(built)
    }

    /// Convert every source of a loaded package into the file cache.
    fn materialize(&mut self, name: &str) -> Result<()> {
        let package = self.package(name)?;
        if package.materialized {
            return Ok(());
        }
        let sources = package.source_files.clone();
        for source in &sources {
            let files = self
                .convert_source(source)
                .map_err(|errors| BuildError::Source {
                    filename: source.filename.clone(),
                    errors,
                })?;
            self.cache_local(name, source, files);
        }
        if let Some(package) = self.packages.get_mut(name) {
            package.materialized = true;
        }
        Ok(())
    }

    fn convert_source(&self, source: &SourceFile) -> std::result::Result<Vec<FileDescriptorProto>, PosErrors> {
        match &source.body {
            SourceBody::J5(j5) => convert_j5_file(&PackageTypes { set: self }, j5),
            SourceBody::Proto(parsed) => Ok(vec![parsed.descriptor.clone()]),
        }
    }

    fn cache_local(&mut self, package: &str, source: &SourceFile, files: Vec<FileDescriptorProto>) {
        for descriptor in files {
            let origin = FileOrigin::Local {
                package: package.to_string(),
                source: source.filename.clone(),
            };
            self.files.insert(
                descriptor.name().to_string(),
                ResolvedFile { descriptor, origin },
            );
        }
    }

    // ------------------------------------------------------------------
    // File resolution and linking
    // ------------------------------------------------------------------

    /// Cache, then local packages, then dependency sets, then builtins.
    fn resolve_file(&mut self, filename: &str) -> Result<ResolvedFile> {
        if let Some(found) = self.files.get(filename) {
            return Ok(found.clone());
        }

        let (package, local) = self.local.package_for_file(filename)?;
        if local {
            self.load_package(&package, &ResolveBaton::new())?;
            self.materialize(&package)?;
            return self
                .files
                .get(filename)
                .cloned()
                .ok_or_else(|| BuildError::FileNotFound(filename.to_string()));
        }

        let mut found = None;
        for dependencies in &self.dependencies {
            if let Some(descriptor) = dependencies.get_dependency_file(filename)? {
                found = Some(ResolvedFile {
                    descriptor,
                    origin: FileOrigin::Dependency,
                });
                break;
            }
        }
        if found.is_none() {
            found = self.builtin.get(filename).map(|descriptor| ResolvedFile {
                descriptor: descriptor.clone(),
                origin: FileOrigin::Builtin,
            });
        }
        let Some(found) = found else {
            return Err(BuildError::FileNotFound(filename.to_string()));
        };
        debug!(file = filename, origin = ?found.origin, "resolved file");
        self.files.insert(filename.to_string(), found.clone());
        Ok(found)
    }

    /// Link a file after its imports. Linking a file twice returns the
    /// first result.
    fn link(&mut self, filename: &str) -> Result<LinkedFile> {
        if let Some(linked) = self.linked.get(filename) {
            return Ok(linked.clone());
        }
        if self.linking.iter().any(|f| f == filename) {
            let mut chain = self.linking.clone();
            chain.push(filename.to_string());
            return Err(BuildError::ImportCycle(chain));
        }

        let resolved = self.resolve_file(filename)?;
        self.linking.push(filename.to_string());
        let result = self.link_resolved(filename, &resolved);
        self.linking.pop();
        result
    }

    fn link_resolved(&mut self, filename: &str, resolved: &ResolvedFile) -> Result<LinkedFile> {
        for dep in &resolved.descriptor.dependency {
            self.link(dep)?;
        }
        let wrap = |source| BuildError::Link {
            filename: filename.to_string(),
            source,
        };
        self.symbols
            .import_file(&resolved.descriptor)
            .map_err(wrap)?;
        let linked = link_file(&resolved.descriptor, &self.symbols).map_err(wrap)?;
        if !linked.unused_imports.is_empty() {
            if let FileOrigin::Local { package, source } = &resolved.origin {
                debug!(
                    package = %package,
                    source = %source,
                    file = filename,
                    unused = ?linked.unused_imports,
                    "unused imports"
                );
            }
        }
        self.linked.insert(filename.to_string(), linked.clone());
        Ok(linked)
    }

    /// Every file the given packages link against, including dependency and
    /// builtin files, imports first. Suitable for registering in one pass.
    pub fn descriptor_set_with_imports(&self, packages: &[BuiltPackage]) -> FileDescriptorSet {
        fn visit(
            set: &PackageSet,
            filename: &str,
            seen: &mut BTreeSet<String>,
            out: &mut Vec<FileDescriptorProto>,
        ) {
            if !seen.insert(filename.to_string()) {
                return;
            }
            let Some(linked) = set.linked.get(filename) else {
                return;
            };
            for dep in &linked.descriptor.dependency {
                visit(set, dep, seen, out);
            }
            out.push(linked.descriptor.clone());
        }

        let mut seen = BTreeSet::new();
        let mut file = Vec::new();
        for local in flatten_descriptor_set(packages).file {
            visit(self, local.name(), &mut seen, &mut file);
        }
        FileDescriptorSet { file }
    }

    // ------------------------------------------------------------------
    // Type resolution
    // ------------------------------------------------------------------

    /// Find an exported type: local packages by their summaries, others in
    /// the dependency sets and then the builtin catalog.
    pub fn resolve_type(&self, package: &str, name: &str) -> std::result::Result<TypeRef, ResolveError> {
        let full = format!("{package}.{name}");
        let not_found = || ResolveError::TypeNotFound {
            package: package.to_string(),
            name: name.to_string(),
        };

        if let Some(local) = self.packages.get(package) {
            return local.exports.get(&full).cloned().ok_or_else(not_found);
        }
        if self.local.is_local_package(package) {
            // Local but never loaded: nothing in this run depends on it.
            return Err(ResolveError::PackageNotFound {
                package: package.to_string(),
            });
        }

        let mut package_seen = false;
        let root = package.replace('.', "/");
        for dependencies in &self.dependencies {
            for filename in dependencies.list_dependency_files(&root) {
                let file = match dependencies.get_dependency_file(&filename) {
                    Ok(Some(file)) => file,
                    Ok(None) => continue,
                    Err(err) => {
                        warn!(file = %filename, error = %err, "skipping unreadable dependency file");
                        continue;
                    }
                };
                if file.package() != package {
                    continue;
                }
                package_seen = true;
                if let Some(found) = proto_file_summary(&file).exports.remove(&full) {
                    return Ok(found);
                }
            }
        }
        for file in self.builtin.files_in_package(package) {
            package_seen = true;
            if let Some(found) = proto_file_summary(file).exports.remove(&full) {
                return Ok(found);
            }
        }

        if package_seen {
            Err(not_found())
        } else {
            Err(ResolveError::PackageNotFound {
                package: package.to_string(),
            })
        }
    }

    // ------------------------------------------------------------------
    // Lint
    // ------------------------------------------------------------------

    /// Convert and link one package, collecting diagnostics per source file
    /// instead of stopping at the first.
    ///
    /// Failures loading the package or building its dependencies are still
    /// returned as errors.
    pub fn lint_package(&mut self, name: &str) -> Result<LintReport> {
        self.load_package(name, &ResolveBaton::new())?;
        let dependencies = self.package(name)?.direct_dependencies.clone();
        for dep in &dependencies {
            self.build_loaded(dep)?;
        }

        let sources = self.package(name)?.source_files.clone();
        let mut report = LintReport::new(name);
        let mut produced = Vec::with_capacity(sources.len());
        for source in &sources {
            let mut diagnostics = PosErrors::new();
            match self.convert_source(source) {
                Ok(files) => {
                    produced.push(files.iter().map(|f| f.name().to_string()).collect());
                    self.cache_local(name, source, files);
                }
                Err(errors) => {
                    produced.push(Vec::new());
                    diagnostics.extend(errors);
                }
            }
            report.files.push(FileDiagnostics {
                filename: source.filename.clone(),
                text: source.text.clone(),
                diagnostics,
            });
        }

        for ((source, files), entry) in sources.iter().zip(&produced).zip(&mut report.files) {
            for filename in files {
                match self.link(filename) {
                    Ok(linked) => {
                        for import in linked.unused_imports {
                            entry.diagnostics.push(unused_import(source, import));
                        }
                    }
                    Err(err) => entry
                        .diagnostics
                        .push(PosError::new(err).in_file(&source.filename)),
                }
            }
        }

        info!(
            package = name,
            errors = report.error_count(),
            warnings = report.warning_count(),
            "linted package"
        );
        Ok(report)
    }
}

fn unused_import(source: &SourceFile, import: String) -> PosError {
    let span = source.import_span(&import);
    let err = UnusedImport { import };
    match span {
        Some(span) => PosError::at(source.filename.clone(), span, err),
        None => PosError::new(err).in_file(&source.filename),
    }
    .warning()
}

/// The conversion-time view of a package set.
struct PackageTypes<'a> {
    set: &'a PackageSet,
}

impl TypeResolver for PackageTypes<'_> {
    fn resolve_type(&self, package: &str, name: &str) -> std::result::Result<TypeRef, ResolveError> {
        self.set.resolve_type(package, name)
    }
}
