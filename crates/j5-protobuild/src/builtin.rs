//! Descriptors for the well-known files converted J5 sources refer to.
//!
//! The catalog is a plain value handed to each [`PackageSet`](crate::PackageSet),
//! so separate compilations never share state. Files are built by hand and
//! carry only what linking needs: type shapes and extension declarations.

use j5_convert::options::{Extension, ALL_EXTENSIONS};
use prost_types::descriptor_proto::ExtensionRange;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use std::collections::BTreeMap;

pub const DESCRIPTOR_FILE: &str = "google/protobuf/descriptor.proto";
const TIMESTAMP_FILE: &str = "google/protobuf/timestamp.proto";
const TIMESTAMP: &str = ".google.protobuf.Timestamp";

/// Extension field numbers, per extension name.
const EXTENSION_NUMBERS: &[(&str, i32)] = &[
    ("j5.ext.v1.field", 90443001),
    ("j5.ext.v1.message", 90443002),
    ("j5.ext.v1.enum", 90443003),
    ("j5.ext.v1.service", 90443004),
    ("j5.ext.v1.method", 90443005),
    ("buf.validate.field", 1159),
    ("j5.list.v1.field", 90443101),
    ("google.api.http", 72295728),
    ("j5.messaging.v1.service", 90443201),
];

/// The message type carried by each extension.
const EXTENSION_TYPES: &[(&str, &str)] = &[
    ("j5.ext.v1.field", ".j5.ext.v1.FieldOptions"),
    ("j5.ext.v1.message", ".j5.ext.v1.MessageOptions"),
    ("j5.ext.v1.enum", ".j5.ext.v1.EnumOptions"),
    ("j5.ext.v1.service", ".j5.ext.v1.ServiceOptions"),
    ("j5.ext.v1.method", ".j5.ext.v1.MethodOptions"),
    ("buf.validate.field", ".buf.validate.FieldRules"),
    ("j5.list.v1.field", ".j5.list.v1.FieldConstraint"),
    ("google.api.http", ".google.api.HttpRule"),
    ("j5.messaging.v1.service", ".j5.messaging.v1.ServiceConfig"),
];

#[derive(Debug, Clone)]
pub struct BuiltinCatalog {
    files: BTreeMap<String, FileDescriptorProto>,
}

impl Default for BuiltinCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinCatalog {
    /// The standard set of well-known files.
    pub fn new() -> Self {
        let mut catalog = Self::empty();
        for file in standard_files() {
            catalog.insert(file);
        }
        catalog
    }

    pub fn empty() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, file: FileDescriptorProto) {
        self.files.insert(file.name().to_string(), file);
    }

    pub fn get(&self, filename: &str) -> Option<&FileDescriptorProto> {
        self.files.get(filename)
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn files_in_package<'a>(
        &'a self,
        package: &'a str,
    ) -> impl Iterator<Item = &'a FileDescriptorProto> + 'a {
        self.files.values().filter(move |f| f.package() == package)
    }
}

// ============================================================================
// Descriptor construction
// ============================================================================

fn file(name: &str, package: &str, deps: &[&str]) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some(package.to_string()),
        dependency: deps.iter().map(|d| d.to_string()).collect(),
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

/// An options message open to extension.
fn options_message(name: &str) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        extension_range: vec![ExtensionRange {
            start: Some(1000),
            end: Some(536_870_912),
            options: None,
        }],
        ..Default::default()
    }
}

fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    let mut field = FieldDescriptorProto {
        name: Some(name.to_string()),
        json_name: Some(j5_source::case::to_lower_camel(name)),
        number: Some(number),
        ..Default::default()
    };
    field.set_type(ty);
    field.set_label(Label::Optional);
    field
}

fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    let mut field = field(name, number, Type::Message);
    field.type_name = Some(type_name.to_string());
    field
}

fn repeated(mut field: FieldDescriptorProto) -> FieldDescriptorProto {
    field.set_label(Label::Repeated);
    field
}

fn extension_field(ext: &Extension) -> Option<FieldDescriptorProto> {
    let (_, short) = ext.name.rsplit_once('.')?;
    let number = EXTENSION_NUMBERS
        .iter()
        .find(|(n, _)| *n == ext.name)
        .map(|(_, number)| *number)?;
    let type_name = EXTENSION_TYPES
        .iter()
        .find(|(n, _)| *n == ext.name)
        .map(|(_, t)| *t)?;
    let mut field = message_field(short, number, type_name);
    field.extendee = Some(ext.extendee.to_string());
    Some(field)
}

/// Declare every known extension that lives in `file`.
fn with_extensions(mut file: FileDescriptorProto) -> FileDescriptorProto {
    let name = file.name().to_string();
    file.extension = ALL_EXTENSIONS
        .iter()
        .filter(|ext| ext.file == name)
        .filter_map(extension_field)
        .collect();
    file
}

fn standard_files() -> Vec<FileDescriptorProto> {
    let mut descriptor = file(DESCRIPTOR_FILE, "google.protobuf", &[]);
    descriptor.syntax = Some("proto2".to_string());
    descriptor.message_type = [
        "FileOptions",
        "MessageOptions",
        "FieldOptions",
        "OneofOptions",
        "EnumOptions",
        "EnumValueOptions",
        "ServiceOptions",
        "MethodOptions",
    ]
    .into_iter()
    .map(options_message)
    .collect();

    let mut timestamp = file(TIMESTAMP_FILE, "google.protobuf", &[]);
    timestamp.message_type = vec![message(
        "Timestamp",
        vec![field("seconds", 1, Type::Int64), field("nanos", 2, Type::Int32)],
    )];

    let mut empty = file("google/protobuf/empty.proto", "google.protobuf", &[]);
    empty.message_type = vec![message("Empty", vec![])];

    let mut http = file("google/api/http.proto", "google.api", &[]);
    http.message_type = vec![message(
        "HttpRule",
        vec![
            field("selector", 1, Type::String),
            field("get", 2, Type::String),
            field("put", 3, Type::String),
            field("post", 4, Type::String),
            field("delete", 5, Type::String),
            field("patch", 6, Type::String),
            field("body", 7, Type::String),
        ],
    )];

    let http_annotations = with_extensions(file(
        "google/api/annotations.proto",
        "google.api",
        &["google/api/http.proto", DESCRIPTOR_FILE],
    ));

    let mut validate = with_extensions(file(
        "buf/validate/validate.proto",
        "buf.validate",
        &[DESCRIPTOR_FILE],
    ));
    validate.message_type = vec![message(
        "FieldRules",
        vec![field("required", 25, Type::Bool)],
    )];

    let mut j5_ext = with_extensions(file(
        "j5/ext/v1/annotations.proto",
        "j5.ext.v1",
        &[DESCRIPTOR_FILE],
    ));
    j5_ext.message_type = [
        "FieldOptions",
        "MessageOptions",
        "EnumOptions",
        "ServiceOptions",
        "MethodOptions",
    ]
    .into_iter()
    .map(|name| message(name, vec![]))
    .collect();

    let mut list_ext = with_extensions(file(
        "j5/list/v1/annotations.proto",
        "j5.list.v1",
        &[DESCRIPTOR_FILE],
    ));
    list_ext.message_type = vec![message("FieldConstraint", vec![])];

    let mut page = file("j5/list/v1/page.proto", "j5.list.v1", &[]);
    page.message_type = vec![
        message(
            "PageRequest",
            vec![field("token", 1, Type::String), field("page_size", 2, Type::Int64)],
        ),
        message("PageResponse", vec![field("next_token", 1, Type::String)]),
    ];

    let mut query = file("j5/list/v1/query.proto", "j5.list.v1", &[]);
    query.message_type = vec![
        message(
            "QueryRequest",
            vec![
                repeated(message_field("searches", 1, ".j5.list.v1.Search")),
                repeated(message_field("sorts", 2, ".j5.list.v1.Sort")),
                repeated(message_field("filters", 3, ".j5.list.v1.Filter")),
            ],
        ),
        message(
            "Search",
            vec![field("field", 1, Type::String), field("value", 2, Type::String)],
        ),
        message(
            "Sort",
            vec![field("field", 1, Type::String), field("descending", 2, Type::Bool)],
        ),
        message(
            "Filter",
            vec![field("field", 1, Type::String), field("value", 2, Type::String)],
        ),
    ];

    let mut state = file("j5/state/v1/metadata.proto", "j5.state.v1", &[TIMESTAMP_FILE]);
    state.message_type = vec![
        message(
            "StateMetadata",
            vec![
                message_field("created_at", 1, TIMESTAMP),
                message_field("updated_at", 2, TIMESTAMP),
                field("last_sequence", 3, Type::Uint64),
            ],
        ),
        message(
            "EventMetadata",
            vec![
                field("event_id", 1, Type::String),
                field("sequence", 2, Type::Uint64),
                message_field("timestamp", 3, TIMESTAMP),
            ],
        ),
    ];

    let mut messaging_ext = with_extensions(file(
        "j5/messaging/v1/annotations.proto",
        "j5.messaging.v1",
        &[DESCRIPTOR_FILE],
    ));
    messaging_ext.message_type = vec![message(
        "ServiceConfig",
        vec![field("topic_name", 1, Type::String)],
    )];

    let mut messaging_meta = file(
        "j5/messaging/v1/metadata.proto",
        "j5.messaging.v1",
        &[TIMESTAMP_FILE],
    );
    messaging_meta.message_type = vec![
        message(
            "EventPublishMetadata",
            vec![
                field("event_id", 1, Type::String),
                field("sequence", 2, Type::Uint64),
                message_field("timestamp", 3, TIMESTAMP),
            ],
        ),
        message(
            "UpsertMetadata",
            vec![
                field("entity_id", 1, Type::String),
                field("event_id", 2, Type::String),
                message_field("event_timestamp", 3, TIMESTAMP),
            ],
        ),
    ];

    let mut decimal = file("j5/types/decimal/v1/decimal.proto", "j5.types.decimal.v1", &[]);
    decimal.message_type = vec![message("Decimal", vec![field("value", 1, Type::String)])];

    let mut date = file("j5/types/date/v1/date.proto", "j5.types.date.v1", &[]);
    date.message_type = vec![message(
        "Date",
        vec![
            field("year", 1, Type::Int32),
            field("month", 2, Type::Int32),
            field("day", 3, Type::Int32),
        ],
    )];

    let mut any = file("j5/types/any/v1/any.proto", "j5.types.any.v1", &[]);
    any.message_type = vec![message(
        "Any",
        vec![
            field("type_name", 1, Type::String),
            field("proto", 2, Type::Bytes),
            field("j5_json", 3, Type::Bytes),
        ],
    )];

    vec![
        descriptor,
        timestamp,
        empty,
        http,
        http_annotations,
        validate,
        j5_ext,
        list_ext,
        page,
        query,
        state,
        messaging_ext,
        messaging_meta,
        decimal,
        date,
        any,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use j5_convert::well_known_file;

    #[test]
    fn every_extension_is_declared_in_its_file() {
        let catalog = BuiltinCatalog::new();
        for ext in ALL_EXTENSIONS {
            let file = catalog.get(ext.file).unwrap_or_else(|| panic!("{} missing", ext.file));
            let short = ext.name.rsplit('.').next().unwrap();
            let declared = file
                .extension
                .iter()
                .find(|f| f.name() == short)
                .unwrap_or_else(|| panic!("{} not declared", ext.name));
            assert_eq!(declared.extendee(), ext.extendee);
            assert!(file.dependency.iter().any(|d| d == DESCRIPTOR_FILE));
        }
    }

    #[test]
    fn well_known_messages_live_where_the_converter_expects() {
        let catalog = BuiltinCatalog::new();
        for (package, name) in [
            ("google.protobuf", "Timestamp"),
            ("google.protobuf", "Empty"),
            ("j5.types.decimal.v1", "Decimal"),
            ("j5.types.date.v1", "Date"),
            ("j5.types.any.v1", "Any"),
            ("j5.state.v1", "StateMetadata"),
            ("j5.state.v1", "EventMetadata"),
            ("j5.list.v1", "PageRequest"),
            ("j5.list.v1", "PageResponse"),
            ("j5.list.v1", "QueryRequest"),
            ("j5.messaging.v1", "EventPublishMetadata"),
            ("j5.messaging.v1", "UpsertMetadata"),
        ] {
            let filename = well_known_file(package, name).unwrap();
            let file = catalog.get(filename).unwrap();
            assert_eq!(file.package(), package);
            assert!(
                file.message_type.iter().any(|m| m.name() == name),
                "{package}.{name} missing from {filename}"
            );
        }
    }

    #[test]
    fn files_by_package() {
        let catalog = BuiltinCatalog::new();
        let names: Vec<&str> = catalog
            .files_in_package("j5.list.v1")
            .map(|f| f.name())
            .collect();
        assert_eq!(
            names,
            vec![
                "j5/list/v1/annotations.proto",
                "j5/list/v1/page.proto",
                "j5/list/v1/query.proto",
            ]
        );
        assert_eq!(catalog.filenames().count(), 16);
        assert!(BuiltinCatalog::empty().filenames().next().is_none());
    }
}
