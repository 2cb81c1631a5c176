use j5_convert::{
    convert_j5_file, source_file_summary, ConvertError, ResolveError, StaticResolver, TypeRef,
    TypeRefKind,
};
use j5_source::ast::parse_source_json;
use j5_source::errpos::PosErrors;
use j5_source::SourceFile;
use prost::Message as _;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FileDescriptorProto};
use proptest::prelude::*;

fn source(json: &str) -> SourceFile {
    parse_source_json(json).expect("valid source json")
}

fn convert(json: &str) -> Result<Vec<FileDescriptorProto>, PosErrors> {
    convert_j5_file(&StaticResolver::new(), &source(json))
}

fn message<'a>(file: &'a FileDescriptorProto, name: &str) -> &'a DescriptorProto {
    file.message_type
        .iter()
        .find(|m| m.name() == name)
        .unwrap_or_else(|| panic!("message {name} not found in {}", file.name()))
}

fn convert_errors(errors: &PosErrors) -> Vec<&ConvertError> {
    errors
        .iter()
        .filter_map(|e| e.err.downcast_ref::<ConvertError>())
        .collect()
}

const ENTITY: &str = r#"{
    "path": "foo/v1/foo.j5s",
    "package": "foo.v1",
    "elements": [{
        "element": "entity",
        "name": "Foo",
        "base_url_path": "/foo/v1/foo",
        "keys": [
            {"name": "fooId", "required": true, "entity_key": {"primary": true},
             "schema": {"type": "key", "format": {"kind": "uuid"}}}
        ],
        "data": [{"name": "name", "schema": {"type": "string"}}],
        "status": [{"name": "ACTIVE"}],
        "events": [
            {"name": "Created", "properties": [{"name": "name", "schema": {"type": "string"}}]}
        ]
    }]
}"#;

// ============================================================================
// Entity expansion end to end
// ============================================================================

#[test]
fn entity_converts_to_main_service_and_topic_files() {
    let files = convert(ENTITY).expect("convert");
    let names: Vec<&str> = files.iter().map(|f| f.name()).collect();
    assert_eq!(
        names,
        vec![
            "foo/v1/foo.j5s.proto",
            "foo/v1/service/foo.p.j5s.proto",
            "foo/v1/topic/foo.p.j5s.proto"
        ]
    );

    let main = &files[0];
    assert_eq!(main.package(), "foo.v1");
    for name in ["FooKeys", "FooData", "FooState", "FooEventType", "FooEvent"] {
        message(main, name);
    }

    let status = main
        .enum_type
        .iter()
        .find(|e| e.name() == "FooStatus")
        .expect("FooStatus");
    let values: Vec<(&str, i32)> = status.value.iter().map(|v| (v.name(), v.number())).collect();
    assert_eq!(
        values,
        vec![("FOO_STATUS_UNSPECIFIED", 0), ("FOO_STATUS_ACTIVE", 1)]
    );

    let event_type = message(main, "FooEventType");
    assert_eq!(event_type.oneof_decl[0].name(), "type");
    assert_eq!(event_type.nested_type[0].name(), "Created");
    assert_eq!(event_type.field[0].type_name(), ".foo.v1.FooEventType.Created");
    assert_eq!(event_type.field[0].oneof_index, Some(0));

    let service_file = &files[1];
    assert_eq!(service_file.package(), "foo.v1.service");
    let query = service_file
        .service
        .iter()
        .find(|s| s.name() == "FooQuery")
        .expect("FooQuery");
    let methods: Vec<&str> = query.method.iter().map(|m| m.name()).collect();
    assert_eq!(methods, vec!["FooGet", "FooList", "FooEvents"]);
    assert_eq!(query.method[0].input_type(), ".foo.v1.service.FooGetRequest");
    assert!(service_file
        .dependency
        .contains(&"foo/v1/foo.j5s.proto".to_string()));

    let topic_file = &files[2];
    let publish = &topic_file.service[0];
    assert_eq!(publish.name(), "FooPublishTopic");
    assert_eq!(publish.method[0].output_type(), ".google.protobuf.Empty");
}

#[test]
fn state_fields_use_literal_numbers_and_builtin_metadata() {
    let files = convert(ENTITY).expect("convert");
    let state = message(&files[0], "FooState");
    let fields: Vec<(&str, i32)> = state.field.iter().map(|f| (f.name(), f.number())).collect();
    assert_eq!(
        fields,
        vec![("metadata", 1), ("keys", 2), ("data", 3), ("status", 4)]
    );
    assert_eq!(state.field[0].type_name(), ".j5.state.v1.StateMetadata");
    assert_eq!(state.field[3].r#type(), Type::Enum);
    assert!(files[0]
        .dependency
        .contains(&"j5/state/v1/metadata.proto".to_string()));
}

// ============================================================================
// Field shapes
// ============================================================================

#[test]
fn map_field_synthesizes_entry_message() {
    let files = convert(
        r#"{
        "path": "foo/v1/foo.j5s",
        "package": "foo.v1",
        "elements": [{
            "element": "object",
            "name": "Foo",
            "properties": [
                {"name": "metadata", "schema": {"type": "map", "items": {"type": "integer", "format": "int64"}}}
            ]
        }]
    }"#,
    )
    .expect("convert");
    let foo = message(&files[0], "Foo");
    let entry = &foo.nested_type[0];
    assert_eq!(entry.name(), "MetadataEntry");
    assert_eq!(entry.options.as_ref().and_then(|o| o.map_entry), Some(true));
    assert_eq!(entry.field[0].name(), "key");
    assert_eq!(entry.field[0].number(), 1);
    assert_eq!(entry.field[0].r#type(), Type::String);
    assert_eq!(entry.field[1].name(), "value");
    assert_eq!(entry.field[1].number(), 2);
    assert_eq!(entry.field[1].r#type(), Type::Int64);

    let field = &foo.field[0];
    assert_eq!(field.label(), Label::Repeated);
    assert_eq!(field.type_name(), ".foo.v1.Foo.MetadataEntry");
}

#[test]
fn optional_scalar_gets_synthetic_oneof() {
    let files = convert(
        r#"{
        "path": "foo/v1/foo.j5s",
        "package": "foo.v1",
        "elements": [{
            "element": "object",
            "name": "Foo",
            "properties": [
                {"name": "id", "required": true, "schema": {"type": "string"}},
                {"name": "nickName", "optional": true, "schema": {"type": "string"}}
            ]
        }]
    }"#,
    )
    .expect("convert");
    let foo = message(&files[0], "Foo");
    assert_eq!(foo.oneof_decl.len(), 1);
    assert_eq!(foo.oneof_decl[0].name(), "_nick_name");
    let nick = &foo.field[1];
    assert_eq!(nick.name(), "nick_name");
    assert_eq!(nick.json_name(), "nickName");
    assert_eq!(nick.proto3_optional, Some(true));
    assert_eq!(nick.oneof_index, Some(0));
    assert_eq!(foo.field[0].proto3_optional, None);
}

#[test]
fn required_and_optional_is_rejected() {
    let errors = convert(
        r#"{
        "path": "foo/v1/foo.j5s",
        "package": "foo.v1",
        "elements": [{
            "element": "object",
            "name": "Foo",
            "properties": [
                {"name": "bad", "required": true, "optional": true,
                 "schema": {"type": "string"}, "span": {"start": {"line": 4, "column": 2}, "end": {"line": 4, "column": 20}}}
            ]
        }]
    }"#,
    )
    .expect_err("should fail");
    assert!(matches!(
        convert_errors(&errors)[..],
        [ConvertError::RequiredAndOptional { .. }]
    ));
    let pos = errors.0[0].position.as_ref().expect("positioned");
    assert_eq!(pos.filename, "foo/v1/foo.j5s");
    assert_eq!(pos.start.line, 4);
}

#[test]
fn collection_misuse_is_reported_per_property() {
    let errors = convert(
        r#"{
        "path": "foo/v1/foo.j5s",
        "package": "foo.v1",
        "elements": [{
            "element": "object",
            "name": "Foo",
            "properties": [
                {"name": "tags", "optional": true, "schema": {"type": "array", "items": {"type": "string"}}},
                {"name": "grid", "schema": {"type": "array", "items": {"type": "array", "items": {"type": "string"}}}}
            ]
        }]
    }"#,
    )
    .expect_err("should fail");
    let errs = convert_errors(&errors);
    assert_eq!(errs.len(), 2);
    assert!(matches!(errs[0], ConvertError::OptionalCollection { kind: "array", .. }));
    assert!(matches!(errs[1], ConvertError::NestedCollection { .. }));
}

// ============================================================================
// Resolution
// ============================================================================

fn bar_resolver() -> StaticResolver {
    StaticResolver::new().with(TypeRef {
        package: "bar.v1".into(),
        name: "Bar".into(),
        file: "bar/v1/bar.j5s.proto".into(),
        kind: TypeRefKind::Object { entity: None },
    })
}

#[test]
fn external_reference_adds_sorted_import() {
    let src = source(
        r#"{
        "path": "foo/v1/foo.j5s",
        "package": "foo.v1",
        "imports": [{"package": "bar.v1"}],
        "elements": [{
            "element": "object",
            "name": "Foo",
            "properties": [
                {"name": "bar", "schema": {"type": "object", "schema": {"ref": {"package": "bar", "schema": "Bar"}}}},
                {"name": "at", "schema": {"type": "timestamp"}}
            ]
        }]
    }"#,
    );
    let files = convert_j5_file(&bar_resolver(), &src).expect("convert");
    let deps = &files[0].dependency;
    assert!(deps.contains(&"bar/v1/bar.j5s.proto".to_string()));
    assert!(deps.contains(&"google/protobuf/timestamp.proto".to_string()));
    let mut sorted = deps.clone();
    sorted.sort();
    assert_eq!(deps, &sorted);
    assert_eq!(message(&files[0], "Foo").field[0].type_name(), ".bar.v1.Bar");
}

#[test]
fn unresolved_reference_is_positioned_type_not_found() {
    let src = source(
        r#"{
        "path": "foo/v1/foo.j5s",
        "package": "foo.v1",
        "elements": [{
            "element": "object",
            "name": "Foo",
            "properties": [
                {"name": "bar", "schema": {"type": "object", "schema": {"ref": {"package": "bar.v1", "schema": "Missing"}}}},
                {"name": "baz", "schema": {"type": "enum", "schema": {"ref": {"package": "baz.v1", "schema": "Baz"}}}}
            ]
        }]
    }"#,
    );
    let errors = convert_j5_file(&bar_resolver(), &src).expect_err("should fail");
    let errs = convert_errors(&errors);
    assert_eq!(errs.len(), 2, "errors are collected, not short-circuited");
    assert!(matches!(
        errs[0],
        ConvertError::Resolve(ResolveError::TypeNotFound { package, name })
            if package == "bar.v1" && name == "Missing"
    ));
    assert!(matches!(
        errs[1],
        ConvertError::Resolve(ResolveError::PackageNotFound { package }) if package == "baz.v1"
    ));
}

#[test]
fn summary_lists_exports_dependencies_and_outputs() {
    let summary = source_file_summary(&source(ENTITY)).expect("summary");
    assert_eq!(summary.package, "foo.v1");
    assert!(summary.exports.contains_key("foo.v1.FooState"));
    assert!(summary.exports.contains_key("foo.v1.FooEventType.Created"));
    let status = summary.export("foo.v1", "FooStatus").expect("status");
    assert_eq!(
        status.as_enum().and_then(|e| e.value("ACTIVE")),
        Some(("FOO_STATUS_ACTIVE", 1))
    );
    assert!(summary.type_dependencies.is_empty());
    assert_eq!(summary.produces.len(), 3);
}

#[test]
fn summary_keeps_each_reference_site_in_position_order() {
    let summary = source_file_summary(&source(
        r#"{
        "path": "foo/v1/foo.j5s",
        "package": "foo.v1",
        "imports": [{"package": "bar.v1"}],
        "elements": [{
            "element": "object",
            "name": "Foo",
            "properties": [
                {"name": "second", "span": {"start": {"line": 9, "column": 4}, "end": {"line": 9, "column": 20}},
                 "schema": {"type": "object", "schema": {"ref": {"package": "bar", "schema": "Bar"}}}},
                {"name": "first", "span": {"start": {"line": 3, "column": 4}, "end": {"line": 3, "column": 20}},
                 "schema": {"type": "object", "schema": {"ref": {"package": "bar", "schema": "Bar"}}}}
            ]
        }]
    }"#,
    ))
    .expect("summary");

    let lines: Vec<u32> = summary
        .type_dependencies
        .iter()
        .map(|d| d.span.start.line)
        .collect();
    assert_eq!(lines, vec![3, 9]);
    assert!(summary
        .type_dependencies
        .iter()
        .all(|d| d.package == "bar.v1" && d.schema == "Bar"));
    assert_eq!(
        summary.package_dependencies().into_iter().collect::<Vec<_>>(),
        vec!["bar.v1"]
    );
}

// ============================================================================
// Determinism
// ============================================================================

fn object_source(props: &[String]) -> SourceFile {
    let properties: Vec<String> = props
        .iter()
        .map(|p| format!(r#"{{"name": "{p}", "description": "about {p}", "schema": {{"type": "string"}}}}"#))
        .collect();
    source(&format!(
        r#"{{"path": "foo/v1/foo.j5s", "package": "foo.v1", "elements": [
            {{"element": "object", "name": "Foo", "properties": [{}]}}
        ]}}"#,
        properties.join(",")
    ))
}

proptest! {
    #[test]
    fn conversion_is_byte_stable(props in prop::collection::btree_set("[a-z][a-zA-Z]{0,8}", 1..6)) {
        let props: Vec<String> = props.into_iter().collect();
        let src = object_source(&props);
        let first = convert_j5_file(&StaticResolver::new(), &src).expect("convert");
        let second = convert_j5_file(&StaticResolver::new(), &src).expect("convert");
        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            prop_assert_eq!(a.encode_to_vec(), b.encode_to_vec());
        }
    }
}
