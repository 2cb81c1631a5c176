//! The `(j5.ext.v1.field)` payload.
//!
//! One extension struct per field kind, each filled by an explicit `From`
//! conversion from the declared field. Adding a kind to [`FieldNode`] fails
//! to compile until it is mapped here.

use crate::options::{TextMessage, TextValue};
use j5_source::ast::{
    AnyField, FloatField, FloatFormat, IntegerField, IntegerFormat, KeyField, KeyFormat,
    StringField,
};
use j5_source::sourcewalk::FieldNode;

#[derive(Debug, Clone, PartialEq)]
pub enum J5FieldExt {
    String(StringExt),
    Integer(IntegerExt),
    Float(FloatExt),
    Decimal,
    Date,
    Timestamp,
    Bool,
    Bytes,
    Key(KeyExt),
    Enum,
    Object(ObjectExt),
    Oneof,
    Polymorph,
    Array(ArrayExt),
    Map,
    Any(AnyExt),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringExt {
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegerExt {
    pub format: IntegerFormat,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloatExt {
    pub format: FloatFormat,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyExt {
    pub format: KeyFormat,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectExt {
    pub flatten: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayExt {
    pub single_form: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnyExt {
    pub only_defined: bool,
    pub types: Vec<String>,
}

impl From<&StringField> for StringExt {
    fn from(f: &StringField) -> Self {
        Self {
            format: f.format.clone(),
        }
    }
}

impl From<&IntegerField> for IntegerExt {
    fn from(f: &IntegerField) -> Self {
        Self { format: f.format }
    }
}

impl From<&FloatField> for FloatExt {
    fn from(f: &FloatField) -> Self {
        Self { format: f.format }
    }
}

impl From<&KeyField> for KeyExt {
    fn from(f: &KeyField) -> Self {
        Self {
            format: f.format.clone(),
        }
    }
}

impl From<&AnyField> for AnyExt {
    fn from(f: &AnyField) -> Self {
        Self {
            only_defined: f.only_defined,
            types: f.types.clone(),
        }
    }
}

impl From<&FieldNode> for J5FieldExt {
    fn from(field: &FieldNode) -> Self {
        match field {
            FieldNode::String(f) => Self::String(f.into()),
            FieldNode::Integer(f) => Self::Integer(f.into()),
            FieldNode::Float(f) => Self::Float(f.into()),
            FieldNode::Decimal(_) => Self::Decimal,
            FieldNode::Date(_) => Self::Date,
            FieldNode::Timestamp(_) => Self::Timestamp,
            FieldNode::Bool(_) => Self::Bool,
            FieldNode::Bytes(_) => Self::Bytes,
            FieldNode::Key(f) => Self::Key(f.into()),
            FieldNode::Enum { .. } => Self::Enum,
            FieldNode::Object { flatten, .. } => Self::Object(ObjectExt { flatten: *flatten }),
            FieldNode::Oneof { .. } => Self::Oneof,
            FieldNode::Polymorph { .. } => Self::Polymorph,
            FieldNode::Array { single_form, .. } => Self::Array(ArrayExt {
                single_form: single_form.clone(),
            }),
            FieldNode::Map { .. } => Self::Map,
            FieldNode::Any(f) => Self::Any(f.into()),
        }
    }
}

impl J5FieldExt {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Bool => "bool",
            Self::Bytes => "bytes",
            Self::Key(_) => "key",
            Self::Enum => "enum",
            Self::Object(_) => "object",
            Self::Oneof => "oneof",
            Self::Polymorph => "polymorph",
            Self::Array(_) => "array",
            Self::Map => "map",
            Self::Any(_) => "any",
        }
    }

    /// Option body: the kind as the selected oneof branch.
    pub fn to_text(&self) -> TextMessage {
        let mut inner = TextMessage::new();
        match self {
            Self::String(e) => inner.push_opt("format", e.format.clone()),
            Self::Integer(e) => inner.push("format", TextValue::Ident(integer_format(e.format).into())),
            Self::Float(e) => inner.push("format", TextValue::Ident(float_format(e.format).into())),
            Self::Key(e) => inner.push("format", TextValue::Message(key_format(&e.format))),
            Self::Object(e) => inner.push_flag("flatten", e.flatten),
            Self::Array(e) => inner.push_opt("single_form", e.single_form.clone()),
            Self::Any(e) => {
                inner.push_flag("only_defined", e.only_defined);
                if !e.types.is_empty() {
                    inner.push(
                        "types",
                        TextValue::List(e.types.iter().map(|t| t.as_str().into()).collect()),
                    );
                }
            }
            Self::Decimal
            | Self::Date
            | Self::Timestamp
            | Self::Bool
            | Self::Bytes
            | Self::Enum
            | Self::Oneof
            | Self::Polymorph
            | Self::Map => {}
        }
        TextMessage::new().with_message(self.kind_name(), inner)
    }
}

fn integer_format(format: IntegerFormat) -> &'static str {
    match format {
        IntegerFormat::Int32 => "INT32",
        IntegerFormat::Int64 => "INT64",
        IntegerFormat::Uint32 => "UINT32",
        IntegerFormat::Uint64 => "UINT64",
    }
}

fn float_format(format: FloatFormat) -> &'static str {
    match format {
        FloatFormat::Float32 => "FLOAT32",
        FloatFormat::Float64 => "FLOAT64",
    }
}

fn key_format(format: &KeyFormat) -> TextMessage {
    match format {
        KeyFormat::Uuid => TextMessage::new().with_message("uuid", TextMessage::new()),
        KeyFormat::Id62 => TextMessage::new().with_message("id62", TextMessage::new()),
        KeyFormat::Custom { pattern } => TextMessage::new().with_message(
            "custom",
            TextMessage::new().with("pattern", pattern.as_str().into()),
        ),
        KeyFormat::Informal => TextMessage::new().with_message("informal", TextMessage::new()),
    }
}
