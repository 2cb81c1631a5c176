//! Conversion-time symbol lookup.

use crate::summary::{TypeRef, TypeRefKind};
use j5_source::ast::SourceFile;
use j5_source::sourcewalk::{
    EVENT_METADATA, EVENT_PUBLISH_METADATA, PAGE_REQUEST, PAGE_RESPONSE, QUERY_REQUEST,
    STATE_METADATA, UPSERT_METADATA,
};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("type {name} not found in package {package}")]
    TypeNotFound { package: String, name: String },

    #[error("package {package} not found")]
    PackageNotFound { package: String },
}

/// Looks up exported types in other files and packages.
pub trait TypeResolver {
    fn resolve_type(&self, package: &str, name: &str) -> Result<TypeRef, ResolveError>;
}

/// A resolver over a fixed set of types, for tests and single-file use.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    types: BTreeMap<(String, String), TypeRef>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_ref: TypeRef) {
        self.types
            .insert((type_ref.package.clone(), type_ref.name.clone()), type_ref);
    }

    pub fn with(mut self, type_ref: TypeRef) -> Self {
        self.insert(type_ref);
        self
    }
}

impl TypeResolver for StaticResolver {
    fn resolve_type(&self, package: &str, name: &str) -> Result<TypeRef, ResolveError> {
        if let Some(found) = self.types.get(&(package.to_string(), name.to_string())) {
            return Ok(found.clone());
        }
        if self.types.keys().any(|(p, _)| p == package) {
            Err(ResolveError::TypeNotFound {
                package: package.to_string(),
                name: name.to_string(),
            })
        } else {
            Err(ResolveError::PackageNotFound {
                package: package.to_string(),
            })
        }
    }
}

// ============================================================================
// Well-known types
// ============================================================================

pub const TIMESTAMP: (&str, &str) = ("google.protobuf", "Timestamp");
pub const EMPTY: (&str, &str) = ("google.protobuf", "Empty");
pub const DECIMAL: (&str, &str) = ("j5.types.decimal.v1", "Decimal");
pub const DATE: (&str, &str) = ("j5.types.date.v1", "Date");
pub const ANY: (&str, &str) = ("j5.types.any.v1", "Any");

/// Every message type the converter may reference outside the user's own
/// packages, with its declaring file.
const WELL_KNOWN: &[((&str, &str), &str)] = &[
    (TIMESTAMP, "google/protobuf/timestamp.proto"),
    (EMPTY, "google/protobuf/empty.proto"),
    (DECIMAL, "j5/types/decimal/v1/decimal.proto"),
    (DATE, "j5/types/date/v1/date.proto"),
    (ANY, "j5/types/any/v1/any.proto"),
    (STATE_METADATA, "j5/state/v1/metadata.proto"),
    (EVENT_METADATA, "j5/state/v1/metadata.proto"),
    (PAGE_REQUEST, "j5/list/v1/page.proto"),
    (PAGE_RESPONSE, "j5/list/v1/page.proto"),
    (QUERY_REQUEST, "j5/list/v1/query.proto"),
    (EVENT_PUBLISH_METADATA, "j5/messaging/v1/metadata.proto"),
    (UPSERT_METADATA, "j5/messaging/v1/metadata.proto"),
];

/// Resolve a builtin message type without consulting any resolver.
pub fn well_known_type(package: &str, name: &str) -> Option<TypeRef> {
    WELL_KNOWN
        .iter()
        .find(|((p, n), _)| *p == package && *n == name)
        .map(|((p, n), file)| TypeRef {
            package: p.to_string(),
            name: n.to_string(),
            file: file.to_string(),
            kind: TypeRefKind::Object { entity: None },
        })
}

/// True for packages served by the builtin catalog rather than the package
/// set.
pub fn is_well_known_package(package: &str) -> bool {
    WELL_KNOWN.iter().any(|((p, _), _)| *p == package)
        || package.starts_with("google.")
        || package.starts_with("buf.validate")
}

pub fn well_known_file(package: &str, name: &str) -> Option<&'static str> {
    WELL_KNOWN
        .iter()
        .find(|((p, n), _)| *p == package && *n == name)
        .map(|(_, file)| *file)
}

// ============================================================================
// Import aliases
// ============================================================================

/// Maps the package qualifiers a source file may use in references to full
/// package names.
///
/// A package import is reachable by its full name, by its explicit alias, and
/// by the segment before its version (`acme.foo.v1` → `foo`).
#[derive(Debug, Default, Clone)]
pub struct ImportScope {
    aliases: BTreeMap<String, String>,
}

impl ImportScope {
    pub fn new(file: &SourceFile) -> Self {
        let mut aliases = BTreeMap::new();
        for import in &file.imports {
            let Some(package) = &import.package else {
                continue;
            };
            if let Some(alias) = &import.alias {
                aliases.insert(alias.clone(), package.clone());
            } else if let Some(short) = short_alias(package) {
                aliases.entry(short.to_string()).or_insert_with(|| package.clone());
            }
        }
        Self { aliases }
    }

    pub fn expand_package(&self, qualifier: &str) -> String {
        self.aliases
            .get(qualifier)
            .cloned()
            .unwrap_or_else(|| qualifier.to_string())
    }
}

fn short_alias(package: &str) -> Option<&str> {
    let parts: Vec<&str> = package.split('.').collect();
    let version = parts
        .iter()
        .position(|p| crate::names::is_version_segment(p))?;
    version.checked_sub(1).map(|i| parts[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use j5_source::ast::Import;

    #[test]
    fn well_known_lookup() {
        let ts = well_known_type("google.protobuf", "Timestamp").expect("timestamp");
        assert_eq!(ts.file, "google/protobuf/timestamp.proto");
        assert_eq!(ts.proto_type_name(), ".google.protobuf.Timestamp");
        assert!(well_known_type("foo.v1", "Timestamp").is_none());
        assert!(is_well_known_package("j5.list.v1"));
        assert!(!is_well_known_package("foo.v1"));
    }

    #[test]
    fn aliases_expand() {
        let file = SourceFile {
            imports: vec![
                Import {
                    package: Some("acme.bar.v1".into()),
                    ..Default::default()
                },
                Import {
                    package: Some("acme.baz.v2".into()),
                    alias: Some("bz".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let scope = ImportScope::new(&file);
        assert_eq!(scope.expand_package("bar"), "acme.bar.v1");
        assert_eq!(scope.expand_package("bz"), "acme.baz.v2");
        assert_eq!(scope.expand_package("other.v1"), "other.v1");
    }

    #[test]
    fn static_resolver_distinguishes_missing_package() {
        let resolver = StaticResolver::new().with(TypeRef {
            package: "bar.v1".into(),
            name: "Bar".into(),
            file: "bar/v1/bar.j5s.proto".into(),
            kind: TypeRefKind::Oneof,
        });
        assert!(resolver.resolve_type("bar.v1", "Bar").is_ok());
        assert_eq!(
            resolver.resolve_type("bar.v1", "Nope"),
            Err(ResolveError::TypeNotFound {
                package: "bar.v1".into(),
                name: "Nope".into()
            })
        );
        assert!(matches!(
            resolver.resolve_type("baz.v1", "Bar"),
            Err(ResolveError::PackageNotFound { .. })
        ));
    }
}
