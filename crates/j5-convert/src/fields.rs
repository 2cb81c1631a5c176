//! Property → field dispatch.

use crate::convert::Converter;
use crate::error::ConvertError;
use crate::ext::J5FieldExt;
use crate::file::MessageBuilder;
use crate::names::map_entry_name;
use crate::options::{J5_FIELD, LIST_FIELD, VALIDATE_FIELD};
use crate::resolver::{ANY, DATE, DECIMAL, TIMESTAMP};
use crate::rules::{list_rules, validate_rules};
use crate::summary::{EnumRef, TypeRefKind};
use j5_source::ast::{FloatFormat, IntegerFormat, RefName};
use j5_source::case::to_snake;
use j5_source::sourcewalk::{FieldNode, PropertyNode};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{FieldDescriptorProto, FieldOptions, MessageOptions};

/// The `value` field of a polymorph wrapper.
pub(crate) fn any_field(name: &str, number: i32) -> FieldDescriptorProto {
    let mut field = FieldDescriptorProto {
        name: Some(name.to_string()),
        json_name: Some(name.to_string()),
        number: Some(number),
        type_name: Some(format!(".{}.{}", ANY.0, ANY.1)),
        ..Default::default()
    };
    field.set_type(Type::Message);
    field.set_label(Label::Optional);
    field
}

fn collection_items(name: &str, outer: &'static str, items: &FieldNode) -> Result<(), ConvertError> {
    match items {
        FieldNode::Array { .. } | FieldNode::Map { .. } => Err(ConvertError::NestedCollection {
            name: name.to_string(),
            outer,
            inner: items.kind_name(),
        }),
        _ => Ok(()),
    }
}

fn has_presence(field: &FieldDescriptorProto) -> bool {
    field.r#type() == Type::Message
}

impl Converter<'_> {
    /// Add one property to the innermost message under construction.
    ///
    /// `oneof` places the field in that oneof of the message.
    pub(crate) fn build_property(
        &mut self,
        prop: &PropertyNode,
        oneof: Option<i32>,
    ) -> Result<(), ConvertError> {
        if prop.required && prop.optional {
            return Err(ConvertError::RequiredAndOptional {
                name: prop.name.clone(),
            });
        }

        let name = to_snake(&prop.name);
        let mut field = FieldDescriptorProto {
            name: Some(name.clone()),
            json_name: Some(prop.name.clone()),
            number: Some(prop.number),
            ..Default::default()
        };

        let mut map_entry = None;
        let enum_info = match &prop.field {
            FieldNode::Array { items, .. } => {
                if prop.optional {
                    return Err(ConvertError::OptionalCollection {
                        name: prop.name.clone(),
                        kind: "array",
                    });
                }
                collection_items(&prop.name, "array", items)?;
                let info = self.set_type(&mut field, items, &prop.name)?;
                field.set_label(Label::Repeated);
                info
            }
            FieldNode::Map { items, .. } => {
                if prop.optional {
                    return Err(ConvertError::OptionalCollection {
                        name: prop.name.clone(),
                        kind: "map",
                    });
                }
                collection_items(&prop.name, "map", items)?;
                let entry_name = map_entry_name(&name);

                let mut key = FieldDescriptorProto {
                    name: Some("key".to_string()),
                    json_name: Some("key".to_string()),
                    number: Some(1),
                    ..Default::default()
                };
                key.set_type(Type::String);
                key.set_label(Label::Optional);

                let mut value = FieldDescriptorProto {
                    name: Some("value".to_string()),
                    json_name: Some("value".to_string()),
                    number: Some(2),
                    ..Default::default()
                };
                value.set_label(Label::Optional);
                let info = self.set_type(&mut value, items, &prop.name)?;

                let mut entry = MessageBuilder::new(entry_name.clone(), None, prop.span);
                entry.add_field(key, None, prop.span);
                entry.add_field(value, None, prop.span);
                entry.desc.options = Some(MessageOptions {
                    map_entry: Some(true),
                    ..Default::default()
                });
                map_entry = Some(entry);

                field.set_type(Type::Message);
                field.set_label(Label::Repeated);
                field.type_name = Some(format!(".{}.{entry_name}", self.current_scope()));
                info
            }
            other => {
                let info = self.set_type(&mut field, other, &prop.name)?;
                field.set_label(Label::Optional);
                info
            }
        };

        let enum_view = enum_info.as_ref().map(|(n, e)| (n.as_str(), e));
        let mut options = FieldOptions::default();
        options
            .uninterpreted_option
            .push(J5_FIELD.option(&J5FieldExt::from(&prop.field).to_text()));
        self.import_extension(J5_FIELD);
        if let Some(body) = validate_rules(&prop.name, &prop.field, prop.required, enum_view)? {
            options.uninterpreted_option.push(VALIDATE_FIELD.option(&body));
            self.import_extension(VALIDATE_FIELD);
        }
        if let Some(body) = list_rules(&prop.field, enum_view)? {
            options.uninterpreted_option.push(LIST_FIELD.option(&body));
            self.import_extension(LIST_FIELD);
        }
        field.options = Some(options);
        if oneof.is_some() {
            field.oneof_index = oneof;
        }

        let synthetic = oneof.is_none() && prop.optional && !has_presence(&field);
        let Some(message) = self.stack.last_mut() else {
            return Ok(());
        };
        if let Some(entry) = map_entry {
            message.add_message(entry);
        }
        let idx = message.add_field(field, prop.description.as_deref(), prop.span);
        if synthetic {
            message.add_synthetic_oneof(idx);
        }
        Ok(())
    }

    /// Set the wire type of a single value. Returns the enum's name and
    /// values when the value is an enum, for rule translation.
    fn set_type(
        &mut self,
        field: &mut FieldDescriptorProto,
        node: &FieldNode,
        prop_name: &str,
    ) -> Result<Option<(String, EnumRef)>, ConvertError> {
        let wire = match node {
            FieldNode::String(_) | FieldNode::Key(_) => Type::String,
            FieldNode::Integer(f) => match f.format {
                IntegerFormat::Int32 => Type::Int32,
                IntegerFormat::Int64 => Type::Int64,
                IntegerFormat::Uint32 => Type::Uint32,
                IntegerFormat::Uint64 => Type::Uint64,
            },
            FieldNode::Float(f) => match f.format {
                FloatFormat::Float32 => Type::Float,
                FloatFormat::Float64 => Type::Double,
            },
            FieldNode::Bool(_) => Type::Bool,
            FieldNode::Bytes(_) => Type::Bytes,
            FieldNode::Decimal(_) => return self.builtin_message(field, DECIMAL),
            FieldNode::Date(_) => return self.builtin_message(field, DATE),
            FieldNode::Timestamp(_) => return self.builtin_message(field, TIMESTAMP),
            FieldNode::Any(_) => return self.builtin_message(field, ANY),
            FieldNode::Enum { target, .. } => {
                let found = self.resolve(target)?;
                let TypeRefKind::Enum(values) = &found.kind else {
                    return Err(wrong_kind(prop_name, target, "enum", found.kind_name()));
                };
                field.set_type(Type::Enum);
                field.type_name = Some(found.proto_type_name());
                return Ok(Some((found.full_name(), values.clone())));
            }
            FieldNode::Object { target, .. } => {
                return self.message_ref(field, target, prop_name, "object");
            }
            FieldNode::Oneof { target } => {
                return self.message_ref(field, target, prop_name, "oneof");
            }
            FieldNode::Polymorph { target } => {
                return self.message_ref(field, target, prop_name, "polymorph");
            }
            FieldNode::Array { .. } | FieldNode::Map { .. } => {
                return Err(ConvertError::NestedCollection {
                    name: prop_name.to_string(),
                    outer: "property",
                    inner: node.kind_name(),
                })
            }
        };
        field.set_type(wire);
        Ok(None)
    }

    fn builtin_message(
        &mut self,
        field: &mut FieldDescriptorProto,
        (package, name): (&str, &str),
    ) -> Result<Option<(String, EnumRef)>, ConvertError> {
        let found = self.resolve(&RefName::in_package(package, name))?;
        field.set_type(Type::Message);
        field.type_name = Some(found.proto_type_name());
        Ok(None)
    }

    fn message_ref(
        &mut self,
        field: &mut FieldDescriptorProto,
        target: &RefName,
        prop_name: &str,
        expected: &'static str,
    ) -> Result<Option<(String, EnumRef)>, ConvertError> {
        let found = self.resolve(target)?;
        if found.kind_name() != expected {
            return Err(wrong_kind(prop_name, target, expected, found.kind_name()));
        }
        field.set_type(Type::Message);
        field.type_name = Some(found.proto_type_name());
        Ok(None)
    }
}

fn wrong_kind(prop_name: &str, target: &RefName, expected: &'static str, found: &'static str) -> ConvertError {
    ConvertError::WrongKind {
        name: prop_name.to_string(),
        target: target.to_string(),
        expected,
        found,
    }
}
