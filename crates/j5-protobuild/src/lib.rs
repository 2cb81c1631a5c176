//! Package resolution, build ordering, linking and lint.
//!
//! - [`PackageSet`]: loads local packages through a [`LocalSourceResolver`],
//!   converts their J5 sources, and links everything against one shared
//!   symbol table. Files outside the local packages come from
//!   [`DependencySet`]s and then the [`BuiltinCatalog`].
//! - [`dag`]: topological ordering for multi-package builds.
//! - [`linker`]: the symbol table and per-file reference resolution.
//! - [`DirectorySource`] / [`DescriptorSetDependencies`]: filesystem and
//!   descriptor-set adapters, configured from [`RepoConfig`].

mod baton;
mod builtin;
mod config;
pub mod dag;
mod directory;
mod error;
pub mod linker;
mod lint;
mod package;
mod source;

pub use baton::{CircularDependencyError, ResolveBaton};
pub use builtin::{BuiltinCatalog, DESCRIPTOR_FILE};
pub use config::{ConfigError, DependencyConfig, PackageConfig, RepoConfig, CONFIG_FILE};
pub use directory::{DescriptorSetDependencies, DirectorySource};
pub use error::{BuildError, Result};
pub use linker::{LinkError, LinkedFile};
pub use lint::{FileDiagnostics, LintReport};
pub use package::{flatten_descriptor_set, BuiltPackage, PackageSet, PackageState};
pub use source::{
    proto_file_summary, DependencySet, LocalSourceResolver, ParsedProto, ProseFile, ProtoParser,
    SourceBody, SourceFile,
};
