//! Entity expansion.
//!
//! One `entity` declaration becomes, in this order:
//!
//! 1. `<E>Keys` object (the key properties)
//! 2. `<E>Data` object
//! 3. `<E>Status` enum, prefix `<E_SNAKE>_STATUS_`
//! 4. `<E>State` object: metadata=1, keys=2, data=3, status=4
//! 5. `<E>EventType` oneof, one branch per event, each branch a nested object
//! 6. `<E>Event` object: metadata=1, keys=2, event=3
//! 7. `<E>Query` service: `<E>Get`, `<E>List`, `<E>Events`
//! 8. one command service per command group (`<E>Command` unless named)
//! 9. `<E>Publish` topic: metadata=1, keys=2, event=3, data=4, status=5
//! 10. one upsert topic per summary
//! 11. any extra schemas declared in the entity block
//!
//! Generated objects reference each other by name only. The literal field
//! numbers on generated properties are part of the wire contract.

use super::error::WalkError;
use super::nodes::{
    EntityPart, EntityRef, NodeMeta, OneofNode, QueryMethodKind, SchemaNode, ServiceEntity,
    ServiceNode, TopicKindNode, TopicMessageNode, TopicNode,
};
use super::walk::{NodeBuilder, RootNode};
use crate::ast::{
    ArrayField, ArrayRules, EntityDef, EnumDef, EnumField, EnumOptionDef, EnumRules, FieldSchema,
    HttpMethod, ListRules, ObjectField, OneofField, PropertyDef, RefName, SchemaRef, Span,
};
use crate::case::{to_lower_camel, to_snake, to_upper_camel, to_upper_snake};
use std::collections::HashSet;
use tracing::debug;

pub const STATE_METADATA: (&str, &str) = ("j5.state.v1", "StateMetadata");
pub const EVENT_METADATA: (&str, &str) = ("j5.state.v1", "EventMetadata");
pub const PAGE_REQUEST: (&str, &str) = ("j5.list.v1", "PageRequest");
pub const PAGE_RESPONSE: (&str, &str) = ("j5.list.v1", "PageResponse");
pub const QUERY_REQUEST: (&str, &str) = ("j5.list.v1", "QueryRequest");
pub const EVENT_PUBLISH_METADATA: (&str, &str) = ("j5.messaging.v1", "EventPublishMetadata");
pub const UPSERT_METADATA: (&str, &str) = ("j5.messaging.v1", "UpsertMetadata");

struct Names {
    entity: String,
    snake: String,
    lower: String,
}

impl Names {
    fn schema(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.entity)
    }

    fn local(&self, suffix: &str) -> RefName {
        RefName::local(self.schema(suffix))
    }

    fn part(&self, part: EntityPart) -> Option<EntityRef> {
        Some(EntityRef {
            entity: self.snake.clone(),
            part,
        })
    }
}

fn well_known(name: (&str, &str)) -> RefName {
    RefName::in_package(name.0, name.1)
}

fn prop(name: &str, number: Option<i32>, required: bool, schema: FieldSchema) -> PropertyDef {
    let mut p = PropertyDef::new(name, schema);
    p.number = number;
    p.required = required;
    p
}

fn object_field(target: RefName, flatten: bool) -> FieldSchema {
    FieldSchema::Object(ObjectField {
        schema: SchemaRef::Ref(target),
        flatten,
    })
}

fn array_of(items: FieldSchema) -> FieldSchema {
    FieldSchema::Array(ArrayField {
        items: Box::new(items),
        rules: ArrayRules::default(),
        single_form: None,
    })
}

pub(crate) fn expand_entity(b: &NodeBuilder<'_>, def: &EntityDef) -> Result<Vec<RootNode>, WalkError> {
    if def.name.trim().is_empty() {
        return Err(b.error(def.span, "entity name is required"));
    }
    let entity = to_upper_camel(&def.name);
    let names = Names {
        snake: to_snake(&entity),
        lower: to_lower_camel(&entity),
        entity,
    };

    if def.events.is_empty() {
        return Err(b.error(
            def.span,
            format!("entity {} must declare at least one event", names.entity),
        ));
    }

    let mut summary_names = HashSet::new();
    for summary in &def.summaries {
        if !summary_names.insert(summary.name.as_str()) {
            return Err(b.error(
                summary.span,
                format!("entity {}: duplicate summary {}", names.entity, summary.name),
            ));
        }
    }

    let primary_keys: Vec<PropertyDef> = def
        .keys
        .iter()
        .filter(|k| k.entity_key.is_some_and(|ek| ek.primary))
        .map(virtual_key)
        .collect();
    if primary_keys.is_empty() {
        return Err(b.error(
            def.span,
            format!("entity {} has no primary key", names.entity),
        ));
    }
    let shard_keys: Vec<PropertyDef> = def
        .keys
        .iter()
        .filter(|k| k.entity_key.is_some_and(|ek| ek.shard && !ek.primary))
        .map(virtual_key)
        .collect();

    let status_prefix = format!("{}_STATUS_", to_upper_snake(&names.entity));
    let default_filters = default_status_filters(b, def, &names, &status_prefix)?;

    let mut out = Vec::new();

    // 1. Keys
    let mut keys = b.object(&named_object(&names.schema("Keys"), &def.keys, def.span), vec![])?;
    keys.entity = names.part(EntityPart::Keys);
    out.push(RootNode::Schema(SchemaNode::Object(keys)));

    // 2. Data
    let mut data = b.object(&named_object(&names.schema("Data"), &def.data, def.span), vec![])?;
    data.entity = names.part(EntityPart::Data);
    out.push(RootNode::Schema(SchemaNode::Object(data)));

    // 3. Status
    let status_def = EnumDef {
        name: names.schema("Status"),
        description: None,
        prefix: Some(status_prefix),
        options: def
            .status
            .iter()
            .map(|s| EnumOptionDef {
                name: s.name.clone(),
                description: s.description.clone(),
                span: s.span,
            })
            .collect(),
        span: def.span,
    };
    let mut status = b.enumeration(&status_def, vec![])?;
    status.entity = names.part(EntityPart::Status);
    out.push(RootNode::Schema(SchemaNode::Enum(status)));

    // 4. State
    let state_props = vec![
        prop("metadata", Some(1), true, object_field(well_known(STATE_METADATA), false)),
        prop("keys", Some(2), true, object_field(names.local("Keys"), true)),
        prop("data", Some(3), true, object_field(names.local("Data"), false)),
        prop(
            "status",
            Some(4),
            true,
            FieldSchema::Enum(EnumField {
                schema: SchemaRef::Ref(names.local("Status")),
                rules: EnumRules {
                    defined_only: true,
                    ..Default::default()
                },
                list_rules: Some(ListRules {
                    filterable: true,
                    default_filters,
                    ..Default::default()
                }),
            }),
        ),
    ];
    let mut state = b.message_object(&names.schema("State"), &[], &state_props, def.span)?;
    state.meta.description = def.description.clone();
    state.entity = names.part(EntityPart::State);
    out.push(RootNode::Schema(SchemaNode::Object(state)));

    // 5. EventType
    out.push(RootNode::Schema(SchemaNode::Oneof(event_type(b, def, &names)?)));

    // 6. Event
    let event_props = vec![
        prop("metadata", Some(1), true, object_field(well_known(EVENT_METADATA), false)),
        prop("keys", Some(2), true, object_field(names.local("Keys"), true)),
        prop(
            "event",
            Some(3),
            true,
            FieldSchema::Oneof(OneofField {
                schema: SchemaRef::Ref(names.local("EventType")),
            }),
        ),
    ];
    let mut event = b.message_object(&names.schema("Event"), &[], &event_props, def.span)?;
    event.entity = names.part(EntityPart::Event);
    out.push(RootNode::Schema(SchemaNode::Object(event)));

    // 7. Query service
    out.push(RootNode::Service(query_service(
        b,
        def,
        &names,
        &primary_keys,
        &shard_keys,
    )?));

    // 8. Command services
    for group in &def.commands {
        let name = group
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| names.schema("Command"));
        let methods = group
            .methods
            .iter()
            .map(|m| b.method(m))
            .collect::<Result<Vec<_>, _>>()?;
        out.push(RootNode::Service(ServiceNode {
            meta: NodeMeta {
                name,
                nest: vec![],
                description: group.description.clone(),
                file: b.file.to_string(),
                span: group.span,
            },
            base_path: group
                .base_path
                .clone()
                .unwrap_or_else(|| def.base_url_path.clone()),
            methods,
            entity: Some(ServiceEntity::Command {
                entity: names.snake.clone(),
            }),
        }));
    }

    // 9. Publish topic
    let publish_props = vec![
        prop(
            "metadata",
            Some(1),
            true,
            object_field(well_known(EVENT_PUBLISH_METADATA), false),
        ),
        prop("keys", Some(2), true, object_field(names.local("Keys"), false)),
        prop(
            "event",
            Some(3),
            true,
            FieldSchema::Oneof(OneofField {
                schema: SchemaRef::Ref(names.local("EventType")),
            }),
        ),
        prop("data", Some(4), true, object_field(names.local("Data"), false)),
        prop(
            "status",
            Some(5),
            true,
            FieldSchema::Enum(EnumField {
                schema: SchemaRef::Ref(names.local("Status")),
                rules: EnumRules::default(),
                list_rules: None,
            }),
        ),
    ];
    let publish_event = names.schema("Event");
    out.push(RootNode::Topic(TopicNode {
        meta: NodeMeta {
            name: names.schema("Publish"),
            nest: vec![],
            description: None,
            file: b.file.to_string(),
            span: def.span,
        },
        kind: TopicKindNode::Publish,
        messages: vec![TopicMessageNode {
            message: b.message_object(
                &format!("{publish_event}Message"),
                &[],
                &publish_props,
                def.span,
            )?,
            name: publish_event,
            description: None,
            span: def.span,
        }],
    }));

    // 10. Summary topics
    for summary in &def.summaries {
        let mut props = vec![
            prop("upsert", Some(1), true, object_field(well_known(UPSERT_METADATA), false)),
            prop("keys", Some(2), true, object_field(names.local("Keys"), false)),
        ];
        props.extend(summary.properties.iter().cloned());
        let message = b.message_object(&format!("{}Message", summary.name), &[], &props, summary.span)?;
        out.push(RootNode::Topic(TopicNode {
            meta: NodeMeta {
                name: summary.name.clone(),
                nest: vec![],
                description: summary.description.clone(),
                file: b.file.to_string(),
                span: summary.span,
            },
            kind: TopicKindNode::Upsert,
            messages: vec![TopicMessageNode {
                name: summary.name.clone(),
                description: summary.description.clone(),
                message,
                span: summary.span,
            }],
        }));
    }

    // 11. Extra schemas
    for schema in &def.schemas {
        out.push(RootNode::Schema(b.nested_schema(schema, vec![])?));
    }

    debug!(entity = %names.entity, nodes = out.len(), "expanded entity");
    Ok(out)
}

fn named_object(name: &str, properties: &[PropertyDef], span: Span) -> crate::ast::ObjectDef {
    crate::ast::ObjectDef {
        name: name.to_string(),
        properties: properties.to_vec(),
        span,
        ..Default::default()
    }
}

/// A key copied into a request message: required, numbered by position.
fn virtual_key(key: &PropertyDef) -> PropertyDef {
    let mut p = key.clone();
    p.number = None;
    p.required = true;
    p.optional = false;
    p
}

fn default_status_filters(
    b: &NodeBuilder<'_>,
    def: &EntityDef,
    names: &Names,
    prefix: &str,
) -> Result<Vec<String>, WalkError> {
    let Some(query) = &def.query else {
        return Ok(vec![]);
    };
    let declared: HashSet<&str> = def.status.iter().map(|s| s.name.as_str()).collect();
    let mut out = Vec::with_capacity(query.default_status_filter.len());
    for name in &query.default_status_filter {
        let bare = name.strip_prefix(prefix).unwrap_or(name);
        if !declared.contains(bare) {
            return Err(WalkError::UnknownStatusFilter {
                entity: names.entity.clone(),
                status: name.clone(),
                location: super::error::SourceLocation::new(b.file, query.span),
            });
        }
        out.push(bare.to_string());
    }
    Ok(out)
}

fn event_type(b: &NodeBuilder<'_>, def: &EntityDef, names: &Names) -> Result<OneofNode, WalkError> {
    let meta = NodeMeta {
        name: names.schema("EventType"),
        nest: vec![],
        description: None,
        file: b.file.to_string(),
        span: def.span,
    };
    let mut nested = Vec::with_capacity(def.events.len());
    let mut branches = Vec::with_capacity(def.events.len());
    for (idx, event) in def.events.iter().enumerate() {
        let event_name = to_upper_camel(&event.name);
        let object = b.object(
            &crate::ast::ObjectDef {
                name: event_name.clone(),
                description: event.description.clone(),
                properties: event.properties.clone(),
                span: event.span,
                ..Default::default()
            },
            meta.child_nest(),
        )?;
        let target = RefName::local(object.meta.name_in_package());
        nested.push(SchemaNode::Object(object));
        let mut branch = prop(
            &to_lower_camel(&event_name),
            Some(idx as i32 + 1),
            false,
            object_field(target, false),
        );
        branch.description = event.description.clone();
        branch.span = event.span;
        branches.push(branch);
    }
    let properties = b.properties(&meta, &[], &branches, &mut nested)?;
    Ok(OneofNode {
        meta,
        properties,
        nested,
        entity: names.part(EntityPart::EventType),
    })
}

fn query_service(
    b: &NodeBuilder<'_>,
    def: &EntityDef,
    names: &Names,
    primary_keys: &[PropertyDef],
    shard_keys: &[PropertyDef],
) -> Result<ServiceNode, WalkError> {
    let key_path: String = primary_keys
        .iter()
        .map(|k| format!("/{{{}}}", k.name))
        .collect();
    let events_in_get = def.query.as_ref().is_some_and(|q| q.events_in_get);

    let page_and_query = vec![
        prop("page", None, false, object_field(well_known(PAGE_REQUEST), false)),
        prop("query", None, false, object_field(well_known(QUERY_REQUEST), false)),
    ];

    // Get
    let get_name = names.schema("Get");
    let mut get_response = vec![prop(
        &names.lower,
        Some(1),
        true,
        object_field(names.local("State"), false),
    )];
    if events_in_get {
        get_response.push(prop(
            "events",
            Some(2),
            false,
            array_of(object_field(names.local("Event"), false)),
        ));
    }
    let get = super::nodes::MethodNode {
        request: b.message_object(&format!("{get_name}Request"), primary_keys, &[], def.span)?,
        response: b.message_object(&format!("{get_name}Response"), &[], &get_response, def.span)?,
        name: get_name,
        description: None,
        http_method: HttpMethod::Get,
        http_path: format!("/q{key_path}"),
        query: Some(QueryMethodKind::Get),
        span: def.span,
    };

    // List
    let list_name = names.schema("List");
    let list_response = vec![
        prop(
            &format!("{}s", names.lower),
            Some(1),
            false,
            array_of(object_field(names.local("State"), false)),
        ),
        prop("page", Some(2), false, object_field(well_known(PAGE_RESPONSE), false)),
    ];
    let list = super::nodes::MethodNode {
        request: b.message_object(
            &format!("{list_name}Request"),
            shard_keys,
            &page_and_query,
            def.span,
        )?,
        response: b.message_object(&format!("{list_name}Response"), &[], &list_response, def.span)?,
        name: list_name,
        description: None,
        http_method: HttpMethod::Get,
        http_path: "/q".to_string(),
        query: Some(QueryMethodKind::List),
        span: def.span,
    };

    // Events
    let events_name = names.schema("Events");
    let events_response = vec![
        prop(
            "events",
            Some(1),
            false,
            array_of(object_field(names.local("Event"), false)),
        ),
        prop("page", Some(2), false, object_field(well_known(PAGE_RESPONSE), false)),
    ];
    let events = super::nodes::MethodNode {
        request: b.message_object(
            &format!("{events_name}Request"),
            primary_keys,
            &page_and_query,
            def.span,
        )?,
        response: b.message_object(
            &format!("{events_name}Response"),
            &[],
            &events_response,
            def.span,
        )?,
        name: events_name,
        description: None,
        http_method: HttpMethod::Get,
        http_path: format!("/q{key_path}/events"),
        query: Some(QueryMethodKind::ListEvents),
        span: def.span,
    };

    Ok(ServiceNode {
        meta: NodeMeta {
            name: names.schema("Query"),
            nest: vec![],
            description: None,
            file: b.file.to_string(),
            span: def.span,
        },
        base_path: def.base_url_path.clone(),
        methods: vec![get, list, events],
        entity: Some(ServiceEntity::Query {
            entity: names.snake.clone(),
        }),
    })
}
