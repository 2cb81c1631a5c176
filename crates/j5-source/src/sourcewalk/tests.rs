use super::*;
use crate::ast::{
    EntityDef, EntityKeyDef, EntityQueryDef, EnumDef, EnumOptionDef, EventDef, FieldSchema,
    KeyField, KeyFormat, ObjectDef, ObjectField, PropertyDef, RootElement, SchemaRef, SourceFile,
    Span, StatusDef, StringField, SummaryDef,
};

fn string_prop(name: &str) -> PropertyDef {
    PropertyDef::new(name, FieldSchema::String(StringField::default()))
}

fn key_prop(name: &str, primary: bool, shard: bool) -> PropertyDef {
    let mut p = PropertyDef::new(
        name,
        FieldSchema::Key(KeyField {
            format: KeyFormat::Uuid,
            list_rules: None,
        }),
    );
    p.entity_key = Some(EntityKeyDef { primary, shard });
    p
}

fn foo_entity() -> EntityDef {
    EntityDef {
        name: "Foo".into(),
        base_url_path: "/foo/v1/foo".into(),
        keys: vec![key_prop("fooId", true, false), key_prop("tenantId", false, true)],
        data: vec![string_prop("name")],
        status: vec![StatusDef {
            name: "ACTIVE".into(),
            ..Default::default()
        }],
        events: vec![EventDef {
            name: "Created".into(),
            properties: vec![string_prop("name")],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn file_with(elements: Vec<RootElement>) -> SourceFile {
    SourceFile {
        path: "foo/v1/foo.j5s".into(),
        package: "foo.v1".into(),
        imports: vec![],
        elements,
    }
}

#[derive(Default)]
struct Collect {
    seen: Vec<String>,
    errors: Vec<WalkError>,
}

impl SchemaVisitor for Collect {
    fn visit_object(&mut self, node: &ObjectNode) -> Result<(), WalkError> {
        self.seen.push(format!("object:{}", node.meta.name_in_package()));
        for nested in &node.nested {
            nested.accept(self)?;
        }
        Ok(())
    }

    fn visit_oneof(&mut self, node: &OneofNode) -> Result<(), WalkError> {
        self.seen.push(format!("oneof:{}", node.meta.name_in_package()));
        for nested in &node.nested {
            nested.accept(self)?;
        }
        Ok(())
    }

    fn visit_enum(&mut self, node: &EnumNode) -> Result<(), WalkError> {
        self.seen.push(format!("enum:{}", node.meta.name_in_package()));
        Ok(())
    }

    fn visit_service(&mut self, node: &ServiceNode) -> Result<(), WalkError> {
        let methods: Vec<&str> = node.methods.iter().map(|m| m.name.as_str()).collect();
        self.seen
            .push(format!("service:{}[{}]", node.meta.name, methods.join(",")));
        Ok(())
    }

    fn visit_topic(&mut self, node: &TopicNode) -> Result<(), WalkError> {
        self.seen.push(format!("topic:{}", node.meta.name));
        Ok(())
    }

    fn structural_error(&mut self, err: WalkError) -> Result<(), WalkError> {
        self.errors.push(err);
        Ok(())
    }
}

fn object<'a>(nodes: &'a [RootNode], name: &str) -> &'a ObjectNode {
    nodes
        .iter()
        .find_map(|n| match n {
            RootNode::Schema(SchemaNode::Object(o)) if o.meta.name == name => Some(o),
            _ => None,
        })
        .unwrap_or_else(|| panic!("object {name} not found"))
}

#[test]
fn entity_expands_in_fixed_order() {
    let file = file_with(vec![RootElement::Entity(foo_entity())]);
    let mut visitor = Collect::default();
    walk_file(&file, &mut visitor).expect("walk");
    assert!(visitor.errors.is_empty());
    assert_eq!(
        visitor.seen,
        vec![
            "object:FooKeys",
            "object:FooData",
            "enum:FooStatus",
            "object:FooState",
            "oneof:FooEventType",
            "object:FooEventType.Created",
            "object:FooEvent",
            "service:FooQuery[FooGet,FooList,FooEvents]",
            "topic:FooPublish",
        ]
    );
}

#[test]
fn entity_generated_fields_have_literal_numbers() {
    let file = file_with(vec![RootElement::Entity(foo_entity())]);
    let (nodes, errors) = file_nodes(&file);
    assert!(errors.is_empty());

    let state = object(&nodes, "FooState");
    let numbers: Vec<(&str, i32)> = state
        .properties
        .iter()
        .map(|p| (p.name.as_str(), p.number))
        .collect();
    assert_eq!(
        numbers,
        vec![("metadata", 1), ("keys", 2), ("data", 3), ("status", 4)]
    );
    assert_eq!(
        state.properties[1].field,
        FieldNode::Object {
            target: crate::ast::RefName::local("FooKeys"),
            flatten: true
        }
    );

    let event = object(&nodes, "FooEvent");
    let numbers: Vec<i32> = event.properties.iter().map(|p| p.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn status_enum_uses_entity_prefix() {
    let file = file_with(vec![RootElement::Entity(foo_entity())]);
    let (nodes, _) = file_nodes(&file);
    let status = nodes
        .iter()
        .find_map(|n| match n {
            RootNode::Schema(SchemaNode::Enum(e)) => Some(e),
            _ => None,
        })
        .expect("status enum");
    assert_eq!(status.meta.name, "FooStatus");
    assert_eq!(status.prefix, "FOO_STATUS_");
    assert_eq!(status.options[0].name, "ACTIVE");
}

fn status(name: &str, line: u32) -> StatusDef {
    StatusDef {
        name: name.into(),
        span: Span::at(line, 4),
        ..Default::default()
    }
}

#[test]
fn duplicate_status_names_are_rejected() {
    let mut entity = foo_entity();
    entity.status = vec![status("ACTIVE", 7), status("FOO_STATUS_ACTIVE", 8)];
    let file = file_with(vec![
        RootElement::Entity(entity),
        RootElement::Object(ObjectDef {
            name: "Bar".into(),
            ..Default::default()
        }),
    ]);
    let mut visitor = Collect::default();
    walk_file(&file, &mut visitor).expect("walk continues");
    assert_eq!(visitor.errors.len(), 1);
    let err = &visitor.errors[0];
    assert!(!err.is_fatal());
    assert!(err.to_string().contains("duplicate option FOO_STATUS_ACTIVE"), "err={err}");
    assert_eq!(err.location().span.start.line, 8);
    assert_eq!(visitor.seen, vec!["object:Bar"]);
}

#[test]
fn empty_status_name_is_rejected() {
    let mut entity = foo_entity();
    entity.status.push(status("", 9));
    let file = file_with(vec![RootElement::Entity(entity)]);
    let (nodes, errors) = file_nodes(&file);
    assert!(nodes.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("enum option name is required"));
    assert_eq!(errors[0].location().span.start.line, 9);
}

fn color(options: &[(&str, u32)]) -> EnumDef {
    EnumDef {
        name: "Color".into(),
        options: options
            .iter()
            .map(|(name, line)| EnumOptionDef {
                name: (*name).into(),
                span: Span::at(*line, 2),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

#[test]
fn unspecified_is_only_allowed_as_the_first_option() {
    for later in ["UNSPECIFIED", "COLOR_UNSPECIFIED"] {
        let file = file_with(vec![RootElement::Enum(color(&[("RED", 3), (later, 4)]))]);
        let (nodes, errors) = file_nodes(&file);
        assert!(nodes.is_empty());
        assert_eq!(errors.len(), 1, "{later}");
        assert!(errors[0].to_string().contains("may only be the first option"));
        assert_eq!(errors[0].location().span.start.line, 4);
    }

    let file = file_with(vec![RootElement::Enum(color(&[
        ("COLOR_UNSPECIFIED", 3),
        ("RED", 4),
    ]))]);
    let (nodes, errors) = file_nodes(&file);
    assert!(errors.is_empty());
    assert_eq!(nodes.len(), 1);
}

#[test]
fn query_requests_number_virtual_keys_first() {
    let file = file_with(vec![RootElement::Entity(foo_entity())]);
    let (nodes, _) = file_nodes(&file);
    let query = nodes
        .iter()
        .find_map(|n| match n {
            RootNode::Service(s) => Some(s),
            _ => None,
        })
        .expect("query service");

    let get = &query.methods[0];
    assert_eq!(get.http_path, "/q/{fooId}");
    assert_eq!(get.request.meta.name, "FooGetRequest");
    assert_eq!(get.request.properties.len(), 1);
    assert!(get.request.properties[0].required);

    let list = &query.methods[1];
    let fields: Vec<(&str, i32)> = list
        .request
        .properties
        .iter()
        .map(|p| (p.name.as_str(), p.number))
        .collect();
    assert_eq!(fields, vec![("tenantId", 1), ("page", 2), ("query", 3)]);

    let events = &query.methods[2];
    assert_eq!(events.http_path, "/q/{fooId}/events");
    assert_eq!(events.query, Some(QueryMethodKind::ListEvents));
}

#[test]
fn publish_topic_has_distinct_field_numbers() {
    let file = file_with(vec![RootElement::Entity(foo_entity())]);
    let (nodes, _) = file_nodes(&file);
    let topic = nodes
        .iter()
        .find_map(|n| match n {
            RootNode::Topic(t) => Some(t),
            _ => None,
        })
        .expect("publish topic");
    let message = &topic.messages[0].message;
    assert_eq!(message.meta.name, "FooEventMessage");
    let numbers: Vec<(&str, i32)> = message
        .properties
        .iter()
        .map(|p| (p.name.as_str(), p.number))
        .collect();
    assert_eq!(
        numbers,
        vec![("metadata", 1), ("keys", 2), ("event", 3), ("data", 4), ("status", 5)]
    );
}

#[test]
fn summaries_become_upsert_topics() {
    let mut entity = foo_entity();
    entity.summaries = vec![SummaryDef {
        name: "FooSummary".into(),
        properties: vec![string_prop("name")],
        ..Default::default()
    }];
    let file = file_with(vec![RootElement::Entity(entity)]);
    let (nodes, errors) = file_nodes(&file);
    assert!(errors.is_empty());
    let topic = nodes
        .iter()
        .find_map(|n| match n {
            RootNode::Topic(t) if t.kind == TopicKindNode::Upsert => Some(t),
            _ => None,
        })
        .expect("summary topic");
    assert_eq!(topic.meta.name, "FooSummary");
    let names: Vec<(&str, i32)> = topic.messages[0]
        .message
        .properties
        .iter()
        .map(|p| (p.name.as_str(), p.number))
        .collect();
    assert_eq!(names, vec![("upsert", 1), ("keys", 2), ("name", 3)]);
}

#[test]
fn command_groups_default_their_name() {
    let mut entity = foo_entity();
    entity.commands = vec![
        crate::ast::CommandGroupDef::default(),
        crate::ast::CommandGroupDef {
            name: Some("FooAdmin".into()),
            ..Default::default()
        },
    ];
    let file = file_with(vec![RootElement::Entity(entity)]);
    let mut visitor = Collect::default();
    walk_file(&file, &mut visitor).expect("walk");
    assert!(visitor.seen.contains(&"service:FooCommand[]".to_string()));
    assert!(visitor.seen.contains(&"service:FooAdmin[]".to_string()));
}

#[test]
fn unknown_default_status_filter_is_fatal() {
    let mut entity = foo_entity();
    entity.query = Some(EntityQueryDef {
        default_status_filter: vec!["ARCHIVED".into()],
        ..Default::default()
    });
    let file = file_with(vec![RootElement::Entity(entity)]);
    let mut visitor = Collect::default();
    let err = walk_file(&file, &mut visitor).expect_err("should fail");
    assert!(err.is_fatal());
    assert!(err.to_string().contains("ARCHIVED"), "err={err}");
}

#[test]
fn default_status_filter_accepts_prefixed_names() {
    let mut entity = foo_entity();
    entity.query = Some(EntityQueryDef {
        default_status_filter: vec!["FOO_STATUS_ACTIVE".into()],
        ..Default::default()
    });
    let file = file_with(vec![RootElement::Entity(entity)]);
    let (nodes, errors) = file_nodes(&file);
    assert!(errors.is_empty());
    let state = object(&nodes, "FooState");
    let FieldNode::Enum { list_rules, .. } = &state.properties[3].field else {
        panic!("status should be an enum");
    };
    assert_eq!(
        list_rules.as_ref().map(|r| r.default_filters.clone()),
        Some(vec!["ACTIVE".to_string()])
    );
}

#[test]
fn entity_without_events_is_structural_and_siblings_continue() {
    let mut entity = foo_entity();
    entity.events.clear();
    let file = file_with(vec![
        RootElement::Entity(entity),
        RootElement::Object(ObjectDef {
            name: "Bar".into(),
            ..Default::default()
        }),
    ]);
    let mut visitor = Collect::default();
    walk_file(&file, &mut visitor).expect("walk continues");
    assert_eq!(visitor.errors.len(), 1);
    assert!(visitor.errors[0].to_string().contains("at least one event"));
    assert_eq!(visitor.seen, vec!["object:Bar"]);
}

#[test]
fn duplicate_summaries_are_rejected() {
    let mut entity = foo_entity();
    let summary = SummaryDef {
        name: "FooSummary".into(),
        ..Default::default()
    };
    entity.summaries = vec![summary.clone(), summary];
    let file = file_with(vec![RootElement::Entity(entity)]);
    let (_, errors) = file_nodes(&file);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("duplicate summary"));
}

#[test]
fn default_policy_aborts_on_structural_error() {
    struct Strict;
    impl SchemaVisitor for Strict {}

    let file = file_with(vec![RootElement::Object(ObjectDef {
        name: "".into(),
        span: Span::at(3, 2),
        ..Default::default()
    })]);
    let err = walk_file(&file, &mut Strict).expect_err("missing name");
    assert_eq!(err.location().span.start.line, 3);
    assert_eq!(err.location().file, "foo/v1/foo.j5s");
}

#[test]
fn properties_number_sequentially() {
    let mut explicit = string_prop("third");
    explicit.number = Some(10);
    let file = file_with(vec![RootElement::Object(ObjectDef {
        name: "Foo".into(),
        properties: vec![string_prop("first"), string_prop("second"), explicit],
        ..Default::default()
    })]);
    let (nodes, _) = file_nodes(&file);
    let numbers: Vec<i32> = object(&nodes, "Foo")
        .properties
        .iter()
        .map(|p| p.number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 10]);
}

#[test]
fn duplicate_field_numbers_are_rejected() {
    let mut clash = string_prop("b");
    clash.number = Some(1);
    let file = file_with(vec![RootElement::Object(ObjectDef {
        name: "Foo".into(),
        properties: vec![string_prop("a"), clash],
        ..Default::default()
    })]);
    let (_, errors) = file_nodes(&file);
    assert!(errors[0].to_string().contains("duplicate field number 1"));
}

#[test]
fn inline_objects_are_hoisted_to_nested() {
    let inline = ObjectDef {
        properties: vec![string_prop("street")],
        ..Default::default()
    };
    let file = file_with(vec![RootElement::Object(ObjectDef {
        name: "Person".into(),
        properties: vec![PropertyDef::new(
            "homeAddress",
            FieldSchema::Object(ObjectField {
                schema: SchemaRef::Inline(Box::new(inline)),
                flatten: false,
            }),
        )],
        ..Default::default()
    })]);
    let (nodes, errors) = file_nodes(&file);
    assert!(errors.is_empty());
    let person = object(&nodes, "Person");
    assert_eq!(person.nested.len(), 1);
    assert_eq!(person.nested[0].name_in_package(), "Person.HomeAddress");
    assert_eq!(
        person.properties[0].field.target(),
        Some(&crate::ast::RefName::local("Person.HomeAddress"))
    );
}
