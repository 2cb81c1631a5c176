//! The collaborators a [`PackageSet`](crate::PackageSet) reads from.

use crate::error::BuildError;
use j5_convert::{FileSummary, TypeRef, TypeRefKind};
use j5_source::errpos::PosErrors;
use j5_source::Span;
use prost_types::{DescriptorProto, FileDescriptorProto};
use std::collections::BTreeMap;

/// Local packages: the ones this repository builds from source.
pub trait LocalSourceResolver {
    fn list_packages(&self) -> Vec<String>;

    /// The package a proto file path belongs to, and whether that package is
    /// local.
    fn package_for_file(&self, filename: &str) -> Result<(String, bool), BuildError>;

    fn is_local_package(&self, package: &str) -> bool;

    fn package_source_files(&self, package: &str) -> Result<Vec<SourceFile>, BuildError>;

    fn package_prose_files(&self, package: &str) -> Result<Vec<ProseFile>, BuildError>;
}

/// Pre-built files for packages this repository depends on.
pub trait DependencySet {
    /// Every file whose name starts with `root`.
    fn list_dependency_files(&self, root: &str) -> Vec<String>;

    /// `Ok(None)` means the file is not in this set.
    fn get_dependency_file(&self, filename: &str)
        -> Result<Option<FileDescriptorProto>, BuildError>;
}

/// Front end for `.proto` text.
pub trait ProtoParser {
    fn parse_proto(&self, filename: &str, text: &str) -> Result<ParsedProto, PosErrors>;
}

/// A `.proto` file as a parser returns it: a descriptor whose type names may
/// still be relative, plus the positions of its imports.
#[derive(Debug, Clone, Default)]
pub struct ParsedProto {
    pub descriptor: FileDescriptorProto,
    pub import_spans: BTreeMap<String, Span>,
}

#[derive(Debug, Clone)]
pub enum SourceBody {
    J5(j5_source::SourceFile),
    Proto(ParsedProto),
}

/// One source file of a local package.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: String,
    pub summary: FileSummary,
    pub body: SourceBody,
    /// Raw text, kept for rendering diagnostics.
    pub text: Option<String>,
}

impl SourceFile {
    /// Wrap a J5 source, collecting its summary.
    pub fn j5(source: j5_source::SourceFile, text: Option<String>) -> Result<Self, PosErrors> {
        let summary = j5_convert::source_file_summary(&source)?;
        Ok(Self {
            filename: source.path.clone(),
            summary,
            body: SourceBody::J5(source),
            text,
        })
    }

    pub fn proto(parsed: ParsedProto, text: Option<String>) -> Self {
        let summary = proto_file_summary(&parsed.descriptor);
        Self {
            filename: parsed.descriptor.name().to_string(),
            summary,
            body: SourceBody::Proto(parsed),
            text,
        }
    }

    /// Where `import` is written in this file, when known.
    pub fn import_span(&self, import: &str) -> Option<Span> {
        match &self.body {
            SourceBody::J5(source) => source
                .imports
                .iter()
                .find(|i| i.path.as_deref() == Some(import))
                .map(|i| i.span),
            SourceBody::Proto(parsed) => parsed.import_spans.get(import).copied(),
        }
    }
}

/// Markdown documentation shipped with a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProseFile {
    pub filename: String,
    pub content: String,
}

/// Summarize a descriptor: its top-level and nested messages and enums, and
/// its imports.
pub fn proto_file_summary(file: &FileDescriptorProto) -> FileSummary {
    let package = file.package().to_string();
    let filename = file.name().to_string();
    let mut exports = BTreeMap::new();
    for message in &file.message_type {
        export_message(&package, &filename, "", message, &mut exports);
    }
    for enumeration in &file.enum_type {
        let name = enumeration.name().to_string();
        let type_ref = enum_type_ref(&package, &filename, &name, enumeration);
        exports.insert(type_ref.full_name(), type_ref);
    }
    FileSummary {
        source_filename: filename.clone(),
        package,
        exports,
        file_dependencies: file.dependency.clone(),
        type_dependencies: Vec::new(),
        package_imports: Vec::new(),
        produces: vec![filename],
    }
}

fn export_message(
    package: &str,
    filename: &str,
    parent: &str,
    message: &DescriptorProto,
    out: &mut BTreeMap<String, TypeRef>,
) {
    let name = if parent.is_empty() {
        message.name().to_string()
    } else {
        format!("{parent}.{}", message.name())
    };
    if message.options.as_ref().and_then(|o| o.map_entry) == Some(true) {
        return;
    }
    let type_ref = TypeRef {
        package: package.to_string(),
        name: name.clone(),
        file: filename.to_string(),
        kind: TypeRefKind::Object { entity: None },
    };
    out.insert(type_ref.full_name(), type_ref);
    for nested in &message.nested_type {
        export_message(package, filename, &name, nested, out);
    }
    for enumeration in &message.enum_type {
        let nested = format!("{name}.{}", enumeration.name());
        let type_ref = enum_type_ref(package, filename, &nested, enumeration);
        out.insert(type_ref.full_name(), type_ref);
    }
}

/// A descriptor enum as a [`TypeRef`]. The value prefix is whatever precedes
/// `UNSPECIFIED` on the zero value.
pub(crate) fn enum_type_ref(
    package: &str,
    filename: &str,
    name: &str,
    enumeration: &prost_types::EnumDescriptorProto,
) -> TypeRef {
    let prefix = enumeration
        .value
        .iter()
        .find(|v| v.number() == 0)
        .and_then(|v| v.name().strip_suffix("UNSPECIFIED"))
        .unwrap_or_default()
        .to_string();
    let values = enumeration
        .value
        .iter()
        .map(|v| (v.name().to_string(), v.number()))
        .collect();
    TypeRef {
        package: package.to_string(),
        name: name.to_string(),
        file: filename.to_string(),
        kind: TypeRefKind::Enum(j5_convert::EnumRef { prefix, values }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::{EnumDescriptorProto, EnumValueDescriptorProto, MessageOptions};

    fn value(name: &str, number: i32) -> EnumValueDescriptorProto {
        EnumValueDescriptorProto {
            name: Some(name.into()),
            number: Some(number),
            ..Default::default()
        }
    }

    #[test]
    fn summary_lists_nested_types_but_not_map_entries() {
        let file = FileDescriptorProto {
            name: Some("bar/v1/bar.proto".into()),
            package: Some("bar.v1".into()),
            dependency: vec!["google/protobuf/timestamp.proto".into()],
            message_type: vec![DescriptorProto {
                name: Some("Bar".into()),
                nested_type: vec![
                    DescriptorProto {
                        name: Some("Inner".into()),
                        ..Default::default()
                    },
                    DescriptorProto {
                        name: Some("TagsEntry".into()),
                        options: Some(MessageOptions {
                            map_entry: Some(true),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ],
                enum_type: vec![EnumDescriptorProto {
                    name: Some("Kind".into()),
                    value: vec![value("KIND_UNSPECIFIED", 0), value("KIND_A", 1)],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let summary = proto_file_summary(&file);
        let names: Vec<&str> = summary.exports.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["bar.v1.Bar", "bar.v1.Bar.Inner", "bar.v1.Bar.Kind"]);
        assert_eq!(summary.produces, vec!["bar/v1/bar.proto"]);

        let kind = summary.exports["bar.v1.Bar.Kind"].as_enum().unwrap();
        assert_eq!(kind.prefix, "KIND_");
        assert_eq!(kind.value("A"), Some(("KIND_A", 1)));
    }
}
