//! J5 source AST (`.j5s`)
//!
//! This is the typed shape a J5 schema parser produces. The textual grammar
//! lives outside this crate; anything that can produce these values (including
//! a plain JSON document, see [`parse_source_json`]) can feed the compiler.
//!
//! Notes:
//! - Every declaration carries a [`Span`] so diagnostics can point back at the
//!   original text. Spans are 0-based; rendering adds 1.
//! - Composite field kinds (`object`, `oneof`, `enum`, `polymorph`) either name
//!   another schema ([`SchemaRef::Ref`]) or declare one inline
//!   ([`SchemaRef::Inline`]). The walker hoists inline declarations into nested
//!   schemas, so later stages only ever see references.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Name = String;

// ============================================================================
// Positions
// ============================================================================

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width span on one line.
    pub fn at(line: u32, column: u32) -> Self {
        let p = Position::new(line, column);
        Self { start: p, end: p }
    }
}

// ============================================================================
// Files
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Repository-relative path, e.g. `foo/v1/bar.j5s`.
    #[serde(default)]
    pub path: String,
    /// Versioned package, e.g. `foo.v1`.
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub elements: Vec<RootElement>,
}

/// An import is either a file (`path`, usually a `.proto`) or a package,
/// optionally aliased for use in references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum RootElement {
    Object(ObjectDef),
    Oneof(OneofDef),
    Enum(EnumDef),
    Polymorph(PolymorphDef),
    Entity(EntityDef),
    Service(ServiceDef),
    Topic(TopicDef),
}

/// Schemas that may be declared inside another schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum NestedSchema {
    Object(ObjectDef),
    Oneof(OneofDef),
    Enum(EnumDef),
    Polymorph(PolymorphDef),
}

// ============================================================================
// Schemas
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub schemas: Vec<NestedSchema>,
    /// Polymorphs (fully qualified) this object declares membership of.
    #[serde(default)]
    pub polymorph_member: Vec<String>,
    #[serde(default)]
    pub span: Span,
}

/// A oneof is an object whose properties are mutually exclusive branches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneofDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub schemas: Vec<NestedSchema>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    /// Value prefix including the trailing underscore. Derived from the name
    /// (`FooBar` → `FOO_BAR_`) when absent.
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub options: Vec<EnumOptionDef>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOptionDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolymorphDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    /// Fully qualified member object names (`foo.v1.Bar`).
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub span: Span,
}

// ============================================================================
// Properties and field kinds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Explicitly optional: the field tracks presence.
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub entity_key: Option<EntityKeyDef>,
    /// Explicit field number; sequential numbering applies otherwise.
    #[serde(default)]
    pub number: Option<i32>,
    pub schema: FieldSchema,
    #[serde(default)]
    pub span: Span,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, schema: FieldSchema) -> Self {
        Self {
            name: name.into(),
            description: None,
            required: false,
            optional: false,
            entity_key: None,
            number: None,
            schema,
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityKeyDef {
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub shard: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldSchema {
    String(StringField),
    Integer(IntegerField),
    Float(FloatField),
    Decimal(DecimalField),
    Date(DateField),
    Timestamp(TimestampField),
    Bool(BoolField),
    Bytes(BytesField),
    Key(KeyField),
    Enum(EnumField),
    Object(ObjectField),
    Oneof(OneofField),
    Polymorph(PolymorphField),
    Array(ArrayField),
    Map(MapField),
    Any(AnyField),
}

impl FieldSchema {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Date(_) => "date",
            Self::Timestamp(_) => "timestamp",
            Self::Bool(_) => "bool",
            Self::Bytes(_) => "bytes",
            Self::Key(_) => "key",
            Self::Enum(_) => "enum",
            Self::Object(_) => "object",
            Self::Oneof(_) => "oneof",
            Self::Polymorph(_) => "polymorph",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Any(_) => "any",
        }
    }
}

/// Either a reference to a named schema or an inline declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaRef<T> {
    Ref(RefName),
    Inline(Box<T>),
}

/// A by-name schema reference. `package` is either a full package name or an
/// import alias; `None` means the current package.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RefName {
    #[serde(default)]
    pub package: Option<String>,
    pub schema: String,
}

impl RefName {
    pub fn local(schema: impl Into<String>) -> Self {
        Self {
            package: None,
            schema: schema.into(),
        }
    }

    pub fn in_package(package: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            package: Some(package.into()),
            schema: schema.into(),
        }
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(pkg) => write!(f, "{pkg}.{}", self.schema),
            None => f.write_str(&self.schema),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListRules {
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub default_filters: Vec<String>,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub searchable: bool,
}

impl ListRules {
    pub fn is_empty(&self) -> bool {
        !self.filterable && self.default_filters.is_empty() && !self.sortable && !self.searchable
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringField {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub min_len: Option<u64>,
    #[serde(default)]
    pub max_len: Option<u64>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegerFormat {
    #[default]
    Int32,
    Int64,
    Uint32,
    Uint64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatFormat {
    Float32,
    #[default]
    Float64,
}

/// Range rules shared by the numeric kinds. An `exclusive_*` flag is only
/// meaningful alongside its bound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRules<T> {
    #[serde(default)]
    pub minimum: Option<T>,
    #[serde(default)]
    pub maximum: Option<T>,
    #[serde(default)]
    pub exclusive_minimum: Option<bool>,
    #[serde(default)]
    pub exclusive_maximum: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegerField {
    #[serde(default)]
    pub format: IntegerFormat,
    #[serde(default)]
    pub rules: NumericRules<i64>,
    #[serde(default)]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatField {
    #[serde(default)]
    pub format: FloatFormat,
    #[serde(default)]
    pub rules: NumericRules<f64>,
    #[serde(default)]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecimalField {
    #[serde(default)]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateField {
    #[serde(default)]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimestampField {
    #[serde(default)]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoolField {
    #[serde(default)]
    pub const_value: Option<bool>,
    #[serde(default)]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytesField {
    #[serde(default)]
    pub min_len: Option<u64>,
    #[serde(default)]
    pub max_len: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyFormat {
    Uuid,
    Id62,
    Custom {
        pattern: String,
    },
    #[default]
    Informal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyField {
    #[serde(default)]
    pub format: KeyFormat,
    #[serde(default)]
    pub list_rules: Option<ListRules>,
}

/// Enum membership rules, by (prefixed or unprefixed) value name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumRules {
    #[serde(default, rename = "in")]
    pub in_values: Vec<String>,
    #[serde(default)]
    pub not_in: Vec<String>,
    #[serde(default)]
    pub defined_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumField {
    pub schema: SchemaRef<EnumDef>,
    #[serde(default)]
    pub rules: EnumRules,
    #[serde(default)]
    pub list_rules: Option<ListRules>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectField {
    pub schema: SchemaRef<ObjectDef>,
    /// Flattened objects are presented inline by downstream clients.
    #[serde(default)]
    pub flatten: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneofField {
    pub schema: SchemaRef<OneofDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolymorphField {
    pub schema: SchemaRef<PolymorphDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayRules {
    #[serde(default)]
    pub min_items: Option<u64>,
    #[serde(default)]
    pub max_items: Option<u64>,
    #[serde(default)]
    pub unique_items: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayField {
    pub items: Box<FieldSchema>,
    #[serde(default)]
    pub rules: ArrayRules,
    /// Singular name of one item, for generated clients.
    #[serde(default)]
    pub single_form: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRules {
    #[serde(default)]
    pub min_pairs: Option<u64>,
    #[serde(default)]
    pub max_pairs: Option<u64>,
}

/// Maps are always keyed by string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapField {
    pub items: Box<FieldSchema>,
    #[serde(default)]
    pub rules: MapRules,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnyField {
    #[serde(default)]
    pub only_defined: bool,
    #[serde(default)]
    pub types: Vec<String>,
}

// ============================================================================
// Entities
// ============================================================================

/// State-machine shorthand. Expanded by the walker; never converted directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub base_url_path: String,
    #[serde(default)]
    pub keys: Vec<PropertyDef>,
    #[serde(default)]
    pub data: Vec<PropertyDef>,
    #[serde(default)]
    pub status: Vec<StatusDef>,
    #[serde(default)]
    pub events: Vec<EventDef>,
    #[serde(default)]
    pub commands: Vec<CommandGroupDef>,
    #[serde(default)]
    pub summaries: Vec<SummaryDef>,
    #[serde(default)]
    pub query: Option<EntityQueryDef>,
    /// Extra schemas declared within the entity block; emitted at root level.
    #[serde(default)]
    pub schemas: Vec<NestedSchema>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandGroupDef {
    /// Service name; defaults to `<Entity>Command`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityQueryDef {
    /// Status names applied as the default list filter.
    #[serde(default)]
    pub default_status_filter: Vec<String>,
    #[serde(default)]
    pub events_in_get: bool,
    #[serde(default)]
    pub span: Span,
}

// ============================================================================
// Services and topics
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub http_method: HttpMethod,
    #[serde(default)]
    pub http_path: String,
    #[serde(default)]
    pub request: Vec<PropertyDef>,
    #[serde(default)]
    pub response: Vec<PropertyDef>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: TopicKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TopicKind {
    Publish { messages: Vec<TopicMessageDef> },
    Upsert { message: TopicMessageDef },
    ReqRes {
        request: TopicMessageDef,
        reply: TopicMessageDef,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicMessageDef {
    pub name: Name,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub span: Span,
}

// ============================================================================
// JSON front end
// ============================================================================

#[derive(Debug, Error)]
#[error("invalid J5 source document at line {line}, column {column}: {message}")]
pub struct SourceDecodeError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Decode a JSON-encoded [`SourceFile`].
///
/// `path` and `package` in the document are optional; the caller usually
/// knows both from the file's location and fills them in afterwards.
pub fn parse_source_json(text: &str) -> Result<SourceFile, SourceDecodeError> {
    serde_json::from_str(text).map_err(|e| SourceDecodeError {
        line: e.line(),
        column: e.column(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tagged_elements_and_fields() {
        let text = r#"{
            "package": "foo.v1",
            "elements": [
                {
                    "element": "object",
                    "name": "Foo",
                    "properties": [
                        {"name": "fooId", "required": true, "schema": {"type": "key", "format": {"kind": "uuid"}}},
                        {"name": "tags", "schema": {"type": "array", "items": {"type": "string"}}},
                        {"name": "bar", "schema": {"type": "object", "schema": {"ref": {"schema": "Bar"}}}}
                    ]
                }
            ]
        }"#;
        let file = parse_source_json(text).expect("decode");
        assert_eq!(file.package, "foo.v1");
        let RootElement::Object(obj) = &file.elements[0] else {
            panic!("expected object");
        };
        assert_eq!(obj.properties.len(), 3);
        assert!(matches!(
            &obj.properties[0].schema,
            FieldSchema::Key(KeyField {
                format: KeyFormat::Uuid,
                ..
            })
        ));
        assert!(matches!(&obj.properties[1].schema, FieldSchema::Array(_)));
        assert_eq!(obj.properties[2].schema.kind_name(), "object");
    }

    #[test]
    fn decode_errors_carry_position() {
        let err = parse_source_json("{\n  \"elements\": [1]\n}").expect_err("should fail");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn ref_name_display() {
        assert_eq!(RefName::local("Foo").to_string(), "Foo");
        assert_eq!(RefName::in_package("bar.v1", "Baz").to_string(), "bar.v1.Baz");
    }
}
