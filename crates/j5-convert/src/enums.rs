use crate::file::EnumBuilder;
use crate::options::{TextMessage, TextValue, J5_ENUM};
use j5_source::ast::Span;
use j5_source::sourcewalk::EnumNode;

pub const UNSPECIFIED: &str = "UNSPECIFIED";

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
    pub description: Option<String>,
    pub span: Span,
}

/// Final value list of an enum.
///
/// Value 0 is always `<PREFIX>UNSPECIFIED`. A first option that already is
/// the unspecified value (with or without prefix) takes slot 0; otherwise
/// slot 0 is synthesized and declared options start at 1.
pub fn enum_values(node: &EnumNode) -> Vec<EnumValue> {
    let unspecified = format!("{}{UNSPECIFIED}", node.prefix);
    let mut values = Vec::with_capacity(node.options.len() + 1);
    let mut options = node.options.iter().peekable();

    match options.peek() {
        Some(first) if prefixed(&node.prefix, &first.name) == unspecified => {
            values.push(EnumValue {
                name: unspecified,
                number: 0,
                description: first.description.clone(),
                span: first.span,
            });
            options.next();
        }
        _ => values.push(EnumValue {
            name: unspecified,
            number: 0,
            description: None,
            span: node.meta.span,
        }),
    }

    for (number, option) in (1..).zip(options) {
        values.push(EnumValue {
            name: prefixed(&node.prefix, &option.name),
            number,
            description: option.description.clone(),
            span: option.span,
        });
    }
    values
}

fn prefixed(prefix: &str, name: &str) -> String {
    if name.starts_with(prefix) {
        name.to_string()
    } else {
        format!("{prefix}{name}")
    }
}

pub(crate) fn build_enum(node: &EnumNode) -> EnumBuilder {
    let mut builder = EnumBuilder::new(&node.meta.name, node.meta.description.as_deref(), node.meta.span);
    for value in enum_values(node) {
        builder.add_value(value.name, value.number, value.description.as_deref(), value.span);
    }
    if let Some(entity) = &node.entity {
        let body = TextMessage::new().with_message(
            "entity",
            TextMessage::new()
                .with("entity", entity.entity.as_str().into())
                .with("part", TextValue::Ident(entity.part.as_str().to_string())),
        );
        builder
            .desc
            .options
            .get_or_insert_with(Default::default)
            .uninterpreted_option
            .push(J5_ENUM.option(&body));
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use j5_source::sourcewalk::{EnumOptionNode, NodeMeta};
    use proptest::prelude::*;

    fn node(prefix: &str, options: &[&str]) -> EnumNode {
        EnumNode {
            meta: NodeMeta {
                name: "Foo".into(),
                ..Default::default()
            },
            prefix: prefix.into(),
            options: options
                .iter()
                .map(|n| EnumOptionNode {
                    name: n.to_string(),
                    ..Default::default()
                })
                .collect(),
            entity: None,
        }
    }

    fn names(values: &[EnumValue]) -> Vec<(&str, i32)> {
        values.iter().map(|v| (v.name.as_str(), v.number)).collect()
    }

    #[test]
    fn synthesizes_zero_value() {
        let values = enum_values(&node("FOO_STATUS_", &["ACTIVE", "FOO_STATUS_DONE"]));
        assert_eq!(
            names(&values),
            vec![
                ("FOO_STATUS_UNSPECIFIED", 0),
                ("FOO_STATUS_ACTIVE", 1),
                ("FOO_STATUS_DONE", 2)
            ]
        );
    }

    #[test]
    fn reuses_declared_unspecified() {
        for first in ["UNSPECIFIED", "FOO_UNSPECIFIED"] {
            let values = enum_values(&node("FOO_", &[first, "BAR"]));
            assert_eq!(names(&values), vec![("FOO_UNSPECIFIED", 0), ("FOO_BAR", 1)]);
        }
    }

    proptest! {
        #[test]
        fn zero_is_always_unspecified(opts in prop::collection::vec("[A-Z]{1,8}", 0..6)) {
            let refs: Vec<&str> = opts.iter().map(String::as_str).collect();
            let values = enum_values(&node("X_", &refs));
            prop_assert_eq!(values[0].number, 0);
            prop_assert_eq!(values[0].name.as_str(), "X_UNSPECIFIED");
            let zeros = values.iter().filter(|v| v.number == 0).count();
            prop_assert_eq!(zeros, 1);
        }
    }
}
