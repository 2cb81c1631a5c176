//! The uniform node model produced by the walker.
//!
//! Nodes own their data. Cross-node links (a state referencing its keys, a
//! property referencing a nested object) are by name only.

use crate::ast::{
    AnyField, ArrayRules, BoolField, BytesField, DateField, DecimalField, EntityKeyDef, EnumRules,
    FloatField, HttpMethod, IntegerField, KeyField, ListRules, MapRules, RefName, Span,
    StringField, TimestampField,
};

/// Name, nesting and position shared by every schema node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMeta {
    pub name: String,
    /// Ancestor schema names, outermost first. Empty for root schemas.
    pub nest: Vec<String>,
    pub description: Option<String>,
    pub file: String,
    pub span: Span,
}

impl NodeMeta {
    /// Dot-joined nesting path including this node, e.g. `Outer.Inner`.
    pub fn name_in_package(&self) -> String {
        let mut parts = self.nest.clone();
        parts.push(self.name.clone());
        parts.join(".")
    }

    /// The nest a child of this node lives in.
    pub fn child_nest(&self) -> Vec<String> {
        let mut nest = self.nest.clone();
        nest.push(self.name.clone());
        nest
    }
}

/// Which part of an entity an expanded node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityPart {
    Keys,
    Data,
    Status,
    State,
    EventType,
    Event,
}

impl EntityPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keys => "KEYS",
            Self::Data => "DATA",
            Self::Status => "STATUS",
            Self::State => "STATE",
            Self::EventType => "EVENT_TYPE",
            Self::Event => "EVENT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    /// Entity name in lower snake case, as used on the wire.
    pub entity: String,
    pub part: EntityPart,
}

// ============================================================================
// Schemas
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Object(ObjectNode),
    Oneof(OneofNode),
    Enum(EnumNode),
    Polymorph(PolymorphNode),
}

impl SchemaNode {
    pub fn meta(&self) -> &NodeMeta {
        match self {
            Self::Object(n) => &n.meta,
            Self::Oneof(n) => &n.meta,
            Self::Enum(n) => &n.meta,
            Self::Polymorph(n) => &n.meta,
        }
    }

    pub fn name_in_package(&self) -> String {
        self.meta().name_in_package()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectNode {
    pub meta: NodeMeta,
    pub properties: Vec<PropertyNode>,
    pub nested: Vec<SchemaNode>,
    pub entity: Option<EntityRef>,
    pub polymorph_member: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OneofNode {
    pub meta: NodeMeta,
    pub properties: Vec<PropertyNode>,
    pub nested: Vec<SchemaNode>,
    pub entity: Option<EntityRef>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumNode {
    pub meta: NodeMeta,
    /// Value prefix including the trailing underscore.
    pub prefix: String,
    pub options: Vec<EnumOptionNode>,
    pub entity: Option<EntityRef>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumOptionNode {
    /// As declared; may or may not carry the prefix.
    pub name: String,
    pub description: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolymorphNode {
    pub meta: NodeMeta,
    pub members: Vec<String>,
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyNode {
    pub name: String,
    pub description: Option<String>,
    pub number: i32,
    pub required: bool,
    pub optional: bool,
    pub entity_key: Option<EntityKeyDef>,
    pub field: FieldNode,
    pub span: Span,
}

/// A field kind after inline schemas have been hoisted out.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldNode {
    String(StringField),
    Integer(IntegerField),
    Float(FloatField),
    Decimal(DecimalField),
    Date(DateField),
    Timestamp(TimestampField),
    Bool(BoolField),
    Bytes(BytesField),
    Key(KeyField),
    Enum {
        target: RefName,
        rules: EnumRules,
        list_rules: Option<ListRules>,
    },
    Object {
        target: RefName,
        flatten: bool,
    },
    Oneof {
        target: RefName,
    },
    Polymorph {
        target: RefName,
    },
    Array {
        items: Box<FieldNode>,
        rules: ArrayRules,
        single_form: Option<String>,
    },
    Map {
        items: Box<FieldNode>,
        rules: MapRules,
    },
    Any(AnyField),
}

impl FieldNode {
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
            Self::Enum { .. } => "enum",
            Self::Object { .. } => "object",
            Self::Oneof { .. } => "oneof",
            Self::Polymorph { .. } => "polymorph",
            Self::Array { .. } => "array",
            Self::Map { .. } => "map",
            Self::Any(_) => "any",
        }
    }

    /// The schema this field names, if any (looking through arrays and maps).
    pub fn target(&self) -> Option<&RefName> {
        match self {
            Self::Enum { target, .. }
            | Self::Object { target, .. }
            | Self::Oneof { target }
            | Self::Polymorph { target } => Some(target),
            Self::Array { items, .. } | Self::Map { items, .. } => items.target(),
            _ => None,
        }
    }

    pub fn object(target: RefName) -> Self {
        Self::Object {
            target,
            flatten: false,
        }
    }
}

// ============================================================================
// Services and topics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMethodKind {
    Get,
    List,
    ListEvents,
}

/// Entity linkage for generated services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEntity {
    Query { entity: String },
    Command { entity: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceNode {
    pub meta: NodeMeta,
    pub base_path: String,
    pub methods: Vec<MethodNode>,
    pub entity: Option<ServiceEntity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodNode {
    pub name: String,
    pub description: Option<String>,
    pub http_method: HttpMethod,
    pub http_path: String,
    pub request: ObjectNode,
    pub response: ObjectNode,
    pub query: Option<QueryMethodKind>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKindNode {
    Publish,
    Upsert,
    ReqRes,
}

impl TopicKindNode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Upsert => "upsert",
            Self::ReqRes => "reqres",
        }
    }
}

/// A topic converts to a service named `<Name>Topic`, one method per message.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicNode {
    pub meta: NodeMeta,
    pub kind: TopicKindNode,
    pub messages: Vec<TopicMessageNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicMessageNode {
    pub name: String,
    pub description: Option<String>,
    /// The payload, named `<Name>Message`.
    pub message: ObjectNode,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_in_package_joins_nest() {
        let meta = NodeMeta {
            name: "Inner".into(),
            nest: vec!["Outer".into(), "Middle".into()],
            ..Default::default()
        };
        assert_eq!(meta.name_in_package(), "Outer.Middle.Inner");
        assert_eq!(meta.child_nest(), vec!["Outer", "Middle", "Inner"]);
    }

    #[test]
    fn target_looks_through_collections() {
        let field = FieldNode::Array {
            items: Box::new(FieldNode::object(RefName::local("Foo"))),
            rules: ArrayRules::default(),
            single_form: None,
        };
        assert_eq!(field.target(), Some(&RefName::local("Foo")));
        assert_eq!(FieldNode::Any(AnyField::default()).target(), None);
    }
}
