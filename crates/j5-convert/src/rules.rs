//! Validation (`buf.validate.field`) and list (`j5.list.v1.field`) rules.

use crate::error::ConvertError;
use crate::options::{TextMessage, TextValue};
use crate::summary::EnumRef;
use j5_source::ast::{
    ArrayRules, EnumRules, FloatFormat, IntegerFormat, KeyFormat, ListRules, MapRules,
    NumericRules,
};
use j5_source::sourcewalk::FieldNode;

/// Base62 id: 22 characters of `[0-9A-Za-z]`.
pub const ID62_PATTERN: &str = "^[0-9A-Za-z]{22}$";

/// Validation constraints for a single (non-collection) value, as the
/// kind-specific message of `FieldConstraints`.
fn item_rules(
    name: &str,
    field: &FieldNode,
    enum_ref: Option<(&str, &EnumRef)>,
) -> Result<Option<TextMessage>, ConvertError> {
    let (kind, body) = match field {
        FieldNode::String(f) => {
            let mut body = TextMessage::new();
            body.push_opt("min_len", f.min_len);
            body.push_opt("max_len", f.max_len);
            body.push_opt("pattern", f.pattern.clone());
            ("string", body)
        }
        FieldNode::Key(f) => {
            let mut body = TextMessage::new();
            match &f.format {
                KeyFormat::Uuid => body.push_flag("uuid", true),
                KeyFormat::Id62 => body.push("pattern", ID62_PATTERN.into()),
                KeyFormat::Custom { pattern } => body.push("pattern", pattern.as_str().into()),
                KeyFormat::Informal => {}
            }
            ("string", body)
        }
        FieldNode::Integer(f) => {
            let kind = match f.format {
                IntegerFormat::Int32 => "int32",
                IntegerFormat::Int64 => "int64",
                IntegerFormat::Uint32 => "uint32",
                IntegerFormat::Uint64 => "uint64",
            };
            (kind, numeric(name, &f.rules, TextValue::Int)?)
        }
        FieldNode::Float(f) => {
            let kind = match f.format {
                FloatFormat::Float32 => "float",
                FloatFormat::Float64 => "double",
            };
            (kind, numeric(name, &f.rules, TextValue::Float)?)
        }
        FieldNode::Bool(f) => {
            let mut body = TextMessage::new();
            body.push_opt("const", f.const_value);
            ("bool", body)
        }
        FieldNode::Bytes(f) => {
            let mut body = TextMessage::new();
            body.push_opt("min_len", f.min_len);
            body.push_opt("max_len", f.max_len);
            ("bytes", body)
        }
        FieldNode::Enum { rules, .. } => match enum_ref {
            Some((enum_name, values)) => ("enum", enum_rules(enum_name, values, rules)?),
            None => return Ok(None),
        },
        _ => return Ok(None),
    };
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(TextMessage::new().with_message(kind, body)))
}

fn numeric<T: Copy>(
    name: &str,
    rules: &NumericRules<T>,
    value: impl Fn(T) -> TextValue,
) -> Result<TextMessage, ConvertError> {
    let mut body = TextMessage::new();
    match (rules.minimum, rules.exclusive_minimum) {
        (Some(min), Some(true)) => body.push("gt", value(min)),
        (Some(min), _) => body.push("gte", value(min)),
        (None, Some(_)) => {
            return Err(ConvertError::ExclusiveWithoutBound {
                name: name.to_string(),
                bound: "minimum",
            })
        }
        (None, None) => {}
    }
    match (rules.maximum, rules.exclusive_maximum) {
        (Some(max), Some(true)) => body.push("lt", value(max)),
        (Some(max), _) => body.push("lte", value(max)),
        (None, Some(_)) => {
            return Err(ConvertError::ExclusiveWithoutBound {
                name: name.to_string(),
                bound: "maximum",
            })
        }
        (None, None) => {}
    }
    Ok(body)
}

fn enum_rules(enum_name: &str, values: &EnumRef, rules: &EnumRules) -> Result<TextMessage, ConvertError> {
    let mut body = TextMessage::new();
    body.push_flag("defined_only", rules.defined_only);
    for (key, names) in [("in", &rules.in_values), ("not_in", &rules.not_in)] {
        if names.is_empty() {
            continue;
        }
        let numbers = names
            .iter()
            .map(|n| enum_number(enum_name, values, n).map(TextValue::from))
            .collect::<Result<Vec<_>, _>>()?;
        body.push(key, TextValue::List(numbers));
    }
    Ok(body)
}

fn enum_number(enum_name: &str, values: &EnumRef, name: &str) -> Result<i32, ConvertError> {
    values
        .value(name)
        .map(|(_, n)| n)
        .ok_or_else(|| ConvertError::UnknownEnumValue {
            enum_name: enum_name.to_string(),
            value: name.to_string(),
        })
}

fn enum_full_name(enum_name: &str, values: &EnumRef, name: &str) -> Result<String, ConvertError> {
    values
        .value(name)
        .map(|(full, _)| full.to_string())
        .ok_or_else(|| ConvertError::UnknownEnumValue {
            enum_name: enum_name.to_string(),
            value: name.to_string(),
        })
}

/// The full `FieldConstraints` body for a property, or `None` when it has no
/// constraints.
pub(crate) fn validate_rules(
    name: &str,
    field: &FieldNode,
    required: bool,
    enum_ref: Option<(&str, &EnumRef)>,
) -> Result<Option<TextMessage>, ConvertError> {
    let mut body = TextMessage::new();
    if required && presence_required(field) {
        body.push_flag("required", true);
    }
    match field {
        FieldNode::Array { items, rules, .. } => {
            let mut repeated = collection_rules_array(rules);
            if let Some(item) = item_rules(name, items, enum_ref)? {
                repeated.push("items", TextValue::Message(item));
            }
            if !repeated.is_empty() {
                body.push("repeated", TextValue::Message(repeated));
            }
        }
        FieldNode::Map { items, rules } => {
            let mut map = collection_rules_map(rules);
            if let Some(item) = item_rules(name, items, enum_ref)? {
                map.push("values", TextValue::Message(item));
            }
            if !map.is_empty() {
                body.push("map", TextValue::Message(map));
            }
        }
        other => {
            if let Some(item) = item_rules(name, other, enum_ref)? {
                body.extend(item);
            }
        }
    }
    Ok((!body.is_empty()).then_some(body))
}

/// Kinds where `required` means "must be set": messages and non-empty
/// strings. Numbers and bools have meaningful zero values.
fn presence_required(field: &FieldNode) -> bool {
    !matches!(
        field,
        FieldNode::Integer(_) | FieldNode::Float(_) | FieldNode::Bool(_) | FieldNode::Enum { .. }
    )
}

fn collection_rules_array(rules: &ArrayRules) -> TextMessage {
    let mut body = TextMessage::new();
    body.push_opt("min_items", rules.min_items);
    body.push_opt("max_items", rules.max_items);
    body.push_flag("unique", rules.unique_items);
    body
}

fn collection_rules_map(rules: &MapRules) -> TextMessage {
    let mut body = TextMessage::new();
    body.push_opt("min_pairs", rules.min_pairs);
    body.push_opt("max_pairs", rules.max_pairs);
    body
}

// ============================================================================
// List rules
// ============================================================================

/// `(j5.list.v1.field)` body for a property with list rules.
pub(crate) fn list_rules(
    field: &FieldNode,
    enum_ref: Option<(&str, &EnumRef)>,
) -> Result<Option<TextMessage>, ConvertError> {
    let (kind, rules) = match field {
        FieldNode::String(f) => ("string", &f.list_rules),
        FieldNode::Integer(f) => ("integer", &f.list_rules),
        FieldNode::Float(f) => ("float", &f.list_rules),
        FieldNode::Decimal(f) => ("decimal", &f.list_rules),
        FieldNode::Date(f) => ("date", &f.list_rules),
        FieldNode::Timestamp(f) => ("timestamp", &f.list_rules),
        FieldNode::Bool(f) => ("bool", &f.list_rules),
        FieldNode::Key(f) => ("key", &f.list_rules),
        FieldNode::Enum { list_rules, .. } => ("enum", list_rules),
        _ => return Ok(None),
    };
    let Some(rules) = rules.as_ref().filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    let default_filters = match (field, enum_ref) {
        (FieldNode::Enum { .. }, Some((enum_name, values))) => rules
            .default_filters
            .iter()
            .map(|n| enum_full_name(enum_name, values, n))
            .collect::<Result<Vec<_>, _>>()?,
        _ => rules.default_filters.clone(),
    };

    Ok(Some(
        TextMessage::new().with_message(kind, list_body(rules, default_filters)),
    ))
}

fn list_body(rules: &ListRules, default_filters: Vec<String>) -> TextMessage {
    let mut body = TextMessage::new();
    if rules.filterable || !default_filters.is_empty() {
        let mut filtering = TextMessage::new().with("filterable", TextValue::Bool(true));
        if !default_filters.is_empty() {
            filtering.push(
                "default_filters",
                TextValue::List(default_filters.into_iter().map(TextValue::Str).collect()),
            );
        }
        body.push("filtering", TextValue::Message(filtering));
    }
    if rules.sortable {
        body.push(
            "sorting",
            TextValue::Message(TextMessage::new().with("sortable", TextValue::Bool(true))),
        );
    }
    if rules.searchable {
        body.push(
            "searching",
            TextValue::Message(TextMessage::new().with("searchable", TextValue::Bool(true))),
        );
    }
    body
}
