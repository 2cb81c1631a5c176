//! Extension options in their uninterpreted form.
//!
//! `prost` has no extension support, so custom options are carried the way a
//! proto parser emits them before interpretation: an `UninterpretedOption`
//! whose name is the extension and whose aggregate value is the option body
//! in protobuf text format.

use prost_types::uninterpreted_option::NamePart;
use prost_types::UninterpretedOption;
use std::fmt::{self, Write as _};

/// A custom option extension and the file declaring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension {
    /// Fully qualified extension field name, without the leading dot.
    pub name: &'static str,
    pub file: &'static str,
    /// The options message it extends.
    pub extendee: &'static str,
}

const J5_EXT_FILE: &str = "j5/ext/v1/annotations.proto";

pub const J5_FIELD: Extension = Extension {
    name: "j5.ext.v1.field",
    file: J5_EXT_FILE,
    extendee: ".google.protobuf.FieldOptions",
};

pub const J5_MESSAGE: Extension = Extension {
    name: "j5.ext.v1.message",
    file: J5_EXT_FILE,
    extendee: ".google.protobuf.MessageOptions",
};

pub const J5_ENUM: Extension = Extension {
    name: "j5.ext.v1.enum",
    file: J5_EXT_FILE,
    extendee: ".google.protobuf.EnumOptions",
};

pub const J5_SERVICE: Extension = Extension {
    name: "j5.ext.v1.service",
    file: J5_EXT_FILE,
    extendee: ".google.protobuf.ServiceOptions",
};

pub const J5_METHOD: Extension = Extension {
    name: "j5.ext.v1.method",
    file: J5_EXT_FILE,
    extendee: ".google.protobuf.MethodOptions",
};

pub const VALIDATE_FIELD: Extension = Extension {
    name: "buf.validate.field",
    file: "buf/validate/validate.proto",
    extendee: ".google.protobuf.FieldOptions",
};

pub const LIST_FIELD: Extension = Extension {
    name: "j5.list.v1.field",
    file: "j5/list/v1/annotations.proto",
    extendee: ".google.protobuf.FieldOptions",
};

pub const HTTP: Extension = Extension {
    name: "google.api.http",
    file: "google/api/annotations.proto",
    extendee: ".google.protobuf.MethodOptions",
};

pub const MESSAGING_SERVICE: Extension = Extension {
    name: "j5.messaging.v1.service",
    file: "j5/messaging/v1/annotations.proto",
    extendee: ".google.protobuf.ServiceOptions",
};

pub const ALL_EXTENSIONS: &[Extension] = &[
    J5_FIELD,
    J5_MESSAGE,
    J5_ENUM,
    J5_SERVICE,
    J5_METHOD,
    VALIDATE_FIELD,
    LIST_FIELD,
    HTTP,
    MESSAGING_SERVICE,
];

impl Extension {
    pub fn option(&self, body: &TextMessage) -> UninterpretedOption {
        UninterpretedOption {
            name: vec![NamePart {
                name_part: self.name.to_string(),
                is_extension: true,
            }],
            aggregate_value: Some(body.to_string()),
            ..Default::default()
        }
    }
}

/// The extension names an option list refers to.
pub fn extension_names(options: &[UninterpretedOption]) -> impl Iterator<Item = &str> {
    options.iter().filter_map(|opt| {
        opt.name
            .first()
            .filter(|part| part.is_extension)
            .map(|part| part.name_part.trim_start_matches('.'))
    })
}

// ============================================================================
// Text format
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TextValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    /// An enum value name, written bare.
    Ident(String),
    Message(TextMessage),
    List(Vec<TextValue>),
}

/// A text-format message body: ordered `name: value` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextMessage {
    fields: Vec<(String, TextValue)>,
}

impl TextMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn push(&mut self, name: impl Into<String>, value: TextValue) {
        self.fields.push((name.into(), value));
    }

    pub fn with(mut self, name: impl Into<String>, value: TextValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn with_message(self, name: impl Into<String>, body: TextMessage) -> Self {
        self.with(name, TextValue::Message(body))
    }

    pub fn extend(&mut self, other: TextMessage) {
        self.fields.extend(other.fields);
    }

    pub fn push_opt<T: Into<TextValue>>(&mut self, name: &str, value: Option<T>) {
        if let Some(value) = value {
            self.push(name, value.into());
        }
    }

    /// Sets a bool field only when true, as text format omits defaults.
    pub fn push_flag(&mut self, name: &str, value: bool) {
        if value {
            self.push(name, TextValue::Bool(true));
        }
    }
}

impl From<bool> for TextValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for TextValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for TextValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u64> for TextValue {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<f64> for TextValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for TextValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for TextValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<TextMessage> for TextValue {
    fn from(v: TextMessage) -> Self {
        Self::Message(v)
    }
}

impl fmt::Display for TextMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_char(' ')?;
            }
            match value {
                TextValue::Message(m) if m.is_empty() => write!(f, "{name} {{}}")?,
                TextValue::Message(m) => write!(f, "{name} {{ {m} }}")?,
                other => write!(f, "{name}: {other}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for TextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{v:.1}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => write_quoted(f, s),
            Self::Ident(s) => f.write_str(s),
            Self::Message(m) if m.is_empty() => f.write_str("{}"),
            Self::Message(m) => write!(f, "{{ {m} }}"),
            Self::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_char(']')
            }
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_text_format() {
        let body = TextMessage::new().with_message(
            "string",
            TextMessage::new()
                .with("min_len", 1u64.into())
                .with("pattern", "^a\"b$".into()),
        );
        assert_eq!(body.to_string(), r#"string { min_len: 1 pattern: "^a\"b$" }"#);
    }

    #[test]
    fn renders_lists_and_empty_messages() {
        let body = TextMessage::new()
            .with("in", TextValue::List(vec![1.into(), 2.into()]))
            .with_message("object", TextMessage::new())
            .with("gte", 1.0f64.into());
        assert_eq!(body.to_string(), "in: [1, 2] object {} gte: 1.0");
    }

    #[test]
    fn option_carries_extension_name() {
        let opt = J5_FIELD.option(&TextMessage::new().with_message("bool", TextMessage::new()));
        assert_eq!(opt.name[0].name_part, "j5.ext.v1.field");
        assert!(opt.name[0].is_extension);
        assert_eq!(opt.aggregate_value.as_deref(), Some("bool {}"));
        assert_eq!(extension_names(&[opt]).collect::<Vec<_>>(), vec!["j5.ext.v1.field"]);
    }
}
