//! Per-file manifests: what a source file exports and what it needs.
//!
//! Summaries are computed from the node model alone, before anything is
//! resolved, so the package graph can be built without converting files.

use crate::enums::enum_values;
use crate::names::{proto_filename, sub_filename, SUB_SERVICE, SUB_TOPIC};
use crate::resolver::{is_well_known_package, ImportScope};
use j5_source::ast::{RefName, SourceFile, Span};
use j5_source::errpos::PosErrors;
use j5_source::sourcewalk::{
    walk_file, EntityRef, EnumNode, FieldNode, ObjectNode, OneofNode, PolymorphNode,
    PropertyNode, SchemaNode, SchemaVisitor, ServiceNode, TopicNode, WalkError,
};
use std::collections::{BTreeMap, BTreeSet};

/// The exported-symbol record for one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub package: String,
    /// Name within the package, dot-joined for nested types.
    pub name: String,
    /// The proto file declaring the type.
    pub file: String,
    pub kind: TypeRefKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRefKind {
    Object { entity: Option<EntityRef> },
    Oneof,
    Enum(EnumRef),
    Polymorph { members: Vec<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumRef {
    pub prefix: String,
    /// Full (prefixed) value names with their numbers, including 0.
    pub values: Vec<(String, i32)>,
}

impl EnumRef {
    /// Look up a value by full or unprefixed name.
    pub fn value(&self, name: &str) -> Option<(&str, i32)> {
        let full = if name.starts_with(&self.prefix) {
            name.to_string()
        } else {
            format!("{}{name}", self.prefix)
        };
        self.values
            .iter()
            .find(|(n, _)| *n == full)
            .map(|(n, v)| (n.as_str(), *v))
    }
}

impl TypeRef {
    pub fn full_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    /// Fully qualified name as used in descriptor `type_name`.
    pub fn proto_type_name(&self) -> String {
        format!(".{}", self.full_name())
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            TypeRefKind::Object { .. } => "object",
            TypeRefKind::Oneof => "oneof",
            TypeRefKind::Enum(_) => "enum",
            TypeRefKind::Polymorph { .. } => "polymorph",
        }
    }

    pub fn as_enum(&self) -> Option<&EnumRef> {
        match &self.kind {
            TypeRefKind::Enum(e) => Some(e),
            _ => None,
        }
    }
}

/// A symbolic reference to a type in another package, not yet resolved to a
/// file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeDependency {
    pub package: String,
    pub schema: String,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub source_filename: String,
    pub package: String,
    /// Keyed by full name (`foo.v1.Bar`).
    pub exports: BTreeMap<String, TypeRef>,
    /// Imported file paths.
    pub file_dependencies: Vec<String>,
    pub type_dependencies: Vec<TypeDependency>,
    /// Packages imported by name, whether or not a type is used.
    pub package_imports: Vec<String>,
    /// Proto files this source file produces, main file first.
    pub produces: Vec<String>,
}

impl FileSummary {
    /// Packages this file depends on through type references or package
    /// imports, excluding its own.
    pub fn package_dependencies(&self) -> BTreeSet<String> {
        self.type_dependencies
            .iter()
            .map(|d| d.package.clone())
            .chain(self.package_imports.iter().cloned())
            .filter(|p| *p != self.package)
            .collect()
    }

    pub fn export(&self, package: &str, name: &str) -> Option<&TypeRef> {
        self.exports.get(&format!("{package}.{name}"))
    }
}

/// Build the manifest for one J5 source file.
///
/// Structural errors are collected and returned together; nothing is
/// resolved.
pub fn source_file_summary(file: &SourceFile) -> Result<FileSummary, PosErrors> {
    let main = proto_filename(&file.path);
    let scope = ImportScope::new(file);
    let mut collector = SummaryCollector {
        package: &file.package,
        main: &main,
        scope: &scope,
        exports: BTreeMap::new(),
        type_deps: BTreeSet::new(),
        services: false,
        topics: false,
        errors: PosErrors::new(),
    };

    if let Err(err) = walk_file(file, &mut collector) {
        collector.errors.push(err.into_pos_error());
    }
    if collector.errors.has_errors() {
        return Err(collector.errors);
    }

    let mut produces = vec![main.clone()];
    if collector.services {
        produces.push(sub_filename(&file.path, SUB_SERVICE));
    }
    if collector.topics {
        produces.push(sub_filename(&file.path, SUB_TOPIC));
    }

    let file_dependencies: BTreeSet<String> =
        file.imports.iter().filter_map(|i| i.path.clone()).collect();
    let package_imports: BTreeSet<String> =
        file.imports.iter().filter_map(|i| i.package.clone()).collect();

    Ok(FileSummary {
        source_filename: file.path.clone(),
        package: file.package.clone(),
        exports: collector.exports,
        file_dependencies: file_dependencies.into_iter().collect(),
        type_dependencies: collector.type_deps.into_iter().collect(),
        package_imports: package_imports.into_iter().collect(),
        produces,
    })
}

/// Exported types of one file, keyed by name within the package.
pub(crate) fn local_exports(
    package: &str,
    main_file: &str,
    nodes: &[SchemaNode],
    out: &mut BTreeMap<String, TypeRef>,
) {
    for node in nodes {
        let name = node.name_in_package();
        let kind = match node {
            SchemaNode::Object(o) => TypeRefKind::Object {
                entity: o.entity.clone(),
            },
            SchemaNode::Oneof(_) => TypeRefKind::Oneof,
            SchemaNode::Enum(e) => TypeRefKind::Enum(enum_ref(e)),
            SchemaNode::Polymorph(p) => TypeRefKind::Polymorph {
                members: p.members.clone(),
            },
        };
        out.insert(
            name.clone(),
            TypeRef {
                package: package.to_string(),
                name,
                file: main_file.to_string(),
                kind,
            },
        );
        match node {
            SchemaNode::Object(o) => local_exports(package, main_file, &o.nested, out),
            SchemaNode::Oneof(o) => local_exports(package, main_file, &o.nested, out),
            _ => {}
        }
    }
}

pub(crate) fn enum_ref(node: &EnumNode) -> EnumRef {
    EnumRef {
        prefix: node.prefix.clone(),
        values: enum_values(node)
            .into_iter()
            .map(|v| (v.name, v.number))
            .collect(),
    }
}

struct SummaryCollector<'a> {
    package: &'a str,
    main: &'a str,
    scope: &'a ImportScope,
    exports: BTreeMap<String, TypeRef>,
    type_deps: BTreeSet<TypeDependency>,
    services: bool,
    topics: bool,
    errors: PosErrors,
}

impl SummaryCollector<'_> {
    fn schema(&mut self, node: SchemaNode) {
        let mut by_name = BTreeMap::new();
        local_exports(self.package, self.main, std::slice::from_ref(&node), &mut by_name);
        for (_, type_ref) in by_name {
            self.exports.insert(type_ref.full_name(), type_ref);
        }
    }

    fn properties(&mut self, props: &[PropertyNode], nested: &[SchemaNode]) {
        for prop in props {
            self.field(&prop.field, prop);
        }
        for node in nested {
            match node {
                SchemaNode::Object(o) => self.properties(&o.properties, &o.nested),
                SchemaNode::Oneof(o) => self.properties(&o.properties, &o.nested),
                _ => {}
            }
        }
    }

    fn field(&mut self, field: &FieldNode, prop: &PropertyNode) {
        let Some(target) = field.target() else {
            return;
        };
        if let Some(dep) = self.dependency(target, prop.span) {
            self.type_deps.insert(dep);
        }
    }

    fn dependency(&self, target: &RefName, span: Span) -> Option<TypeDependency> {
        let package = self.scope.expand_package(target.package.as_deref()?);
        if package == self.package || is_well_known_package(&package) {
            return None;
        }
        Some(TypeDependency {
            package,
            schema: target.schema.clone(),
            span,
        })
    }

    fn object(&mut self, node: &ObjectNode) {
        self.properties(&node.properties, &node.nested);
    }
}

impl SchemaVisitor for SummaryCollector<'_> {
    fn visit_object(&mut self, node: &ObjectNode) -> Result<(), WalkError> {
        self.object(node);
        self.schema(SchemaNode::Object(node.clone()));
        Ok(())
    }

    fn visit_oneof(&mut self, node: &OneofNode) -> Result<(), WalkError> {
        self.properties(&node.properties, &node.nested);
        self.schema(SchemaNode::Oneof(node.clone()));
        Ok(())
    }

    fn visit_enum(&mut self, node: &EnumNode) -> Result<(), WalkError> {
        self.schema(SchemaNode::Enum(node.clone()));
        Ok(())
    }

    fn visit_polymorph(&mut self, node: &PolymorphNode) -> Result<(), WalkError> {
        self.schema(SchemaNode::Polymorph(node.clone()));
        Ok(())
    }

    fn visit_service(&mut self, node: &ServiceNode) -> Result<(), WalkError> {
        self.services = true;
        for method in &node.methods {
            self.object(&method.request);
            self.object(&method.response);
        }
        Ok(())
    }

    fn visit_topic(&mut self, node: &TopicNode) -> Result<(), WalkError> {
        self.topics = true;
        for message in &node.messages {
            self.object(&message.message);
        }
        Ok(())
    }

    fn structural_error(&mut self, err: WalkError) -> Result<(), WalkError> {
        self.errors.push(err.into_pos_error());
        Ok(())
    }
}
