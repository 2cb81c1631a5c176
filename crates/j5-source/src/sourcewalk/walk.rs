//! Declarations → nodes.

use super::entity::expand_entity;
use super::error::WalkError;
use super::nodes::{
    EnumNode, EnumOptionNode, FieldNode, MethodNode, NodeMeta, ObjectNode, OneofNode,
    PolymorphNode, PropertyNode, SchemaNode, ServiceNode, TopicKindNode, TopicMessageNode,
    TopicNode,
};
use super::visitor::SchemaVisitor;
use crate::ast::{
    EnumDef, FieldSchema, MethodDef, NestedSchema, ObjectDef, OneofDef, PolymorphDef, PropertyDef,
    RefName, RootElement, SchemaRef, ServiceDef, SourceFile, Span, TopicDef, TopicKind,
    TopicMessageDef,
};
use crate::case::{to_upper_camel, to_upper_snake};
use std::collections::HashSet;

const UNSPECIFIED: &str = "UNSPECIFIED";

/// A node at file level.
#[derive(Debug, Clone, PartialEq)]
pub enum RootNode {
    Schema(SchemaNode),
    Service(ServiceNode),
    Topic(TopicNode),
}

impl RootNode {
    fn dispatch(&self, visitor: &mut dyn SchemaVisitor) -> Result<(), WalkError> {
        match self {
            Self::Schema(s) => s.accept(visitor),
            Self::Service(s) => visitor.visit_service(s),
            Self::Topic(t) => visitor.visit_topic(t),
        }
    }
}

/// Walk every root element of `file` in document order.
///
/// Entities are expanded in place. A non-fatal error in one element is
/// handed to [`SchemaVisitor::structural_error`] and the element is skipped;
/// fatal errors end the walk.
pub fn walk_file(file: &SourceFile, visitor: &mut dyn SchemaVisitor) -> Result<(), WalkError> {
    let builder = NodeBuilder::new(&file.path);
    for element in &file.elements {
        match builder.root_element(element) {
            Ok(nodes) => {
                for node in &nodes {
                    node.dispatch(visitor)?;
                }
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => visitor.structural_error(err)?,
        }
    }
    Ok(())
}

/// Build all root nodes without visiting them. Errors are returned in
/// element order alongside whatever could be built.
pub fn file_nodes(file: &SourceFile) -> (Vec<RootNode>, Vec<WalkError>) {
    let builder = NodeBuilder::new(&file.path);
    let mut nodes = Vec::new();
    let mut errors = Vec::new();
    for element in &file.elements {
        match builder.root_element(element) {
            Ok(built) => nodes.extend(built),
            Err(err) => errors.push(err),
        }
    }
    (nodes, errors)
}

pub(crate) struct NodeBuilder<'a> {
    pub(crate) file: &'a str,
}

impl<'a> NodeBuilder<'a> {
    pub(crate) fn new(file: &'a str) -> Self {
        Self { file }
    }

    pub(crate) fn error(&self, span: Span, message: impl Into<String>) -> WalkError {
        WalkError::structural(self.file, span, message)
    }

    fn meta(&self, name: &str, nest: Vec<String>, description: &Option<String>, span: Span) -> NodeMeta {
        NodeMeta {
            name: name.to_string(),
            nest,
            description: description.clone(),
            file: self.file.to_string(),
            span,
        }
    }

    fn require_name(&self, name: &str, what: &str, span: Span) -> Result<(), WalkError> {
        if name.trim().is_empty() {
            return Err(self.error(span, format!("{what} name is required")));
        }
        Ok(())
    }

    fn root_element(&self, element: &RootElement) -> Result<Vec<RootNode>, WalkError> {
        let node = match element {
            RootElement::Object(def) => RootNode::Schema(SchemaNode::Object(self.object(def, vec![])?)),
            RootElement::Oneof(def) => RootNode::Schema(SchemaNode::Oneof(self.oneof(def, vec![])?)),
            RootElement::Enum(def) => RootNode::Schema(SchemaNode::Enum(self.enumeration(def, vec![])?)),
            RootElement::Polymorph(def) => {
                RootNode::Schema(SchemaNode::Polymorph(self.polymorph(def, vec![])?))
            }
            RootElement::Entity(def) => return expand_entity(self, def),
            RootElement::Service(def) => RootNode::Service(self.service(def)?),
            RootElement::Topic(def) => RootNode::Topic(self.topic(def)?),
        };
        Ok(vec![node])
    }

    // ------------------------------------------------------------------
    // Schemas
    // ------------------------------------------------------------------

    pub(crate) fn nested_schema(
        &self,
        schema: &NestedSchema,
        nest: Vec<String>,
    ) -> Result<SchemaNode, WalkError> {
        Ok(match schema {
            NestedSchema::Object(def) => SchemaNode::Object(self.object(def, nest)?),
            NestedSchema::Oneof(def) => SchemaNode::Oneof(self.oneof(def, nest)?),
            NestedSchema::Enum(def) => SchemaNode::Enum(self.enumeration(def, nest)?),
            NestedSchema::Polymorph(def) => SchemaNode::Polymorph(self.polymorph(def, nest)?),
        })
    }

    pub(crate) fn object(&self, def: &ObjectDef, nest: Vec<String>) -> Result<ObjectNode, WalkError> {
        self.require_name(&def.name, "object", def.span)?;
        let meta = self.meta(&def.name, nest, &def.description, def.span);
        let mut nested = self.nested_schemas(&def.schemas, &meta)?;
        let properties = self.properties(&meta, &[], &def.properties, &mut nested)?;
        Ok(ObjectNode {
            meta,
            properties,
            nested,
            entity: None,
            polymorph_member: def.polymorph_member.clone(),
        })
    }

    pub(crate) fn oneof(&self, def: &OneofDef, nest: Vec<String>) -> Result<OneofNode, WalkError> {
        self.require_name(&def.name, "oneof", def.span)?;
        let meta = self.meta(&def.name, nest, &def.description, def.span);
        let mut nested = self.nested_schemas(&def.schemas, &meta)?;
        let properties = self.properties(&meta, &[], &def.properties, &mut nested)?;
        for prop in &properties {
            if prop.required {
                return Err(self.error(
                    prop.span,
                    format!("oneof {}: branch {} cannot be required", meta.name, prop.name),
                ));
            }
        }
        Ok(OneofNode {
            meta,
            properties,
            nested,
            entity: None,
        })
    }

    pub(crate) fn enumeration(&self, def: &EnumDef, nest: Vec<String>) -> Result<EnumNode, WalkError> {
        self.require_name(&def.name, "enum", def.span)?;
        let prefix = match &def.prefix {
            Some(p) if p.ends_with('_') => p.clone(),
            Some(p) => format!("{p}_"),
            None => format!("{}_", to_upper_snake(&def.name)),
        };
        let mut seen = HashSet::new();
        let mut options = Vec::with_capacity(def.options.len());
        for (i, opt) in def.options.iter().enumerate() {
            self.require_name(&opt.name, "enum option", opt.span)?;
            let bare = opt.name.strip_prefix(prefix.as_str()).unwrap_or(&opt.name);
            // Value 0 is the only unspecified value.
            if i > 0 && bare == UNSPECIFIED {
                return Err(self.error(
                    opt.span,
                    format!("enum {}: {} may only be the first option", def.name, opt.name),
                ));
            }
            if !seen.insert(bare.to_string()) {
                return Err(self.error(
                    opt.span,
                    format!("enum {}: duplicate option {}", def.name, opt.name),
                ));
            }
            options.push(EnumOptionNode {
                name: opt.name.clone(),
                description: opt.description.clone(),
                span: opt.span,
            });
        }
        Ok(EnumNode {
            meta: self.meta(&def.name, nest, &def.description, def.span),
            prefix,
            options,
            entity: None,
        })
    }

    pub(crate) fn polymorph(
        &self,
        def: &PolymorphDef,
        nest: Vec<String>,
    ) -> Result<PolymorphNode, WalkError> {
        self.require_name(&def.name, "polymorph", def.span)?;
        Ok(PolymorphNode {
            meta: self.meta(&def.name, nest, &def.description, def.span),
            members: def.members.clone(),
        })
    }

    fn nested_schemas(
        &self,
        schemas: &[NestedSchema],
        owner: &NodeMeta,
    ) -> Result<Vec<SchemaNode>, WalkError> {
        schemas
            .iter()
            .map(|s| self.nested_schema(s, owner.child_nest()))
            .collect()
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Number and convert properties.
    ///
    /// `virtual_props` are synthesized (e.g. copied entity keys) and always
    /// take the first numbers; `explicit` follow in declaration order. A
    /// property with its own `number` keeps it.
    pub(crate) fn properties(
        &self,
        owner: &NodeMeta,
        virtual_props: &[PropertyDef],
        explicit: &[PropertyDef],
        nested: &mut Vec<SchemaNode>,
    ) -> Result<Vec<PropertyNode>, WalkError> {
        let mut names = HashSet::new();
        let mut numbers = HashSet::new();
        let mut out = Vec::with_capacity(virtual_props.len() + explicit.len());

        for (idx, prop) in virtual_props.iter().chain(explicit.iter()).enumerate() {
            self.require_name(&prop.name, "property", prop.span)?;
            if !names.insert(prop.name.clone()) {
                return Err(self.error(
                    prop.span,
                    format!("{}: duplicate property {}", owner.name, prop.name),
                ));
            }
            let number = prop.number.unwrap_or(idx as i32 + 1);
            if number < 1 {
                return Err(self.error(
                    prop.span,
                    format!("{}: property {} has invalid number {number}", owner.name, prop.name),
                ));
            }
            if !numbers.insert(number) {
                return Err(self.error(
                    prop.span,
                    format!("{}: duplicate field number {number} on {}", owner.name, prop.name),
                ));
            }
            let field = self.field(&prop.schema, &prop.name, owner, nested)?;
            out.push(PropertyNode {
                name: prop.name.clone(),
                description: prop.description.clone(),
                number,
                required: prop.required,
                optional: prop.optional,
                entity_key: prop.entity_key,
                field,
                span: prop.span,
            });
        }
        Ok(out)
    }

    /// Convert a field kind, hoisting inline schemas into `nested`.
    fn field(
        &self,
        schema: &FieldSchema,
        prop_name: &str,
        owner: &NodeMeta,
        nested: &mut Vec<SchemaNode>,
    ) -> Result<FieldNode, WalkError> {
        Ok(match schema {
            FieldSchema::String(f) => FieldNode::String(f.clone()),
            FieldSchema::Integer(f) => FieldNode::Integer(f.clone()),
            FieldSchema::Float(f) => FieldNode::Float(f.clone()),
            FieldSchema::Decimal(f) => FieldNode::Decimal(f.clone()),
            FieldSchema::Date(f) => FieldNode::Date(f.clone()),
            FieldSchema::Timestamp(f) => FieldNode::Timestamp(f.clone()),
            FieldSchema::Bool(f) => FieldNode::Bool(f.clone()),
            FieldSchema::Bytes(f) => FieldNode::Bytes(f.clone()),
            FieldSchema::Key(f) => FieldNode::Key(f.clone()),
            FieldSchema::Any(f) => FieldNode::Any(f.clone()),
            FieldSchema::Enum(f) => FieldNode::Enum {
                target: self.hoist(&f.schema, prop_name, owner, nested, |b, def, nest| {
                    Ok(SchemaNode::Enum(b.enumeration(def, nest)?))
                })?,
                rules: f.rules.clone(),
                list_rules: f.list_rules.clone(),
            },
            FieldSchema::Object(f) => FieldNode::Object {
                target: self.hoist(&f.schema, prop_name, owner, nested, |b, def, nest| {
                    Ok(SchemaNode::Object(b.object(def, nest)?))
                })?,
                flatten: f.flatten,
            },
            FieldSchema::Oneof(f) => FieldNode::Oneof {
                target: self.hoist(&f.schema, prop_name, owner, nested, |b, def, nest| {
                    Ok(SchemaNode::Oneof(b.oneof(def, nest)?))
                })?,
            },
            FieldSchema::Polymorph(f) => FieldNode::Polymorph {
                target: self.hoist(&f.schema, prop_name, owner, nested, |b, def, nest| {
                    Ok(SchemaNode::Polymorph(b.polymorph(def, nest)?))
                })?,
            },
            FieldSchema::Array(f) => FieldNode::Array {
                items: Box::new(self.field(&f.items, prop_name, owner, nested)?),
                rules: f.rules.clone(),
                single_form: f.single_form.clone(),
            },
            FieldSchema::Map(f) => FieldNode::Map {
                items: Box::new(self.field(&f.items, prop_name, owner, nested)?),
                rules: f.rules.clone(),
            },
        })
    }

    fn hoist<T, F>(
        &self,
        schema: &SchemaRef<T>,
        prop_name: &str,
        owner: &NodeMeta,
        nested: &mut Vec<SchemaNode>,
        build: F,
    ) -> Result<RefName, WalkError>
    where
        T: Clone + NamedDef,
        F: FnOnce(&Self, &T, Vec<String>) -> Result<SchemaNode, WalkError>,
    {
        match schema {
            SchemaRef::Ref(name) => Ok(name.clone()),
            SchemaRef::Inline(def) => {
                let mut def = (**def).clone();
                if def.def_name().is_empty() {
                    def.set_def_name(to_upper_camel(prop_name));
                }
                let node = build(self, &def, owner.child_nest())?;
                let target = RefName::local(node.name_in_package());
                nested.push(node);
                Ok(target)
            }
        }
    }

    // ------------------------------------------------------------------
    // Services and topics
    // ------------------------------------------------------------------

    pub(crate) fn service(&self, def: &ServiceDef) -> Result<ServiceNode, WalkError> {
        let name = def
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| self.error(def.span, "service name is required"))?;
        let methods = def
            .methods
            .iter()
            .map(|m| self.method(m))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ServiceNode {
            meta: self.meta(&name, vec![], &def.description, def.span),
            base_path: def.base_path.clone(),
            methods,
            entity: None,
        })
    }

    pub(crate) fn method(&self, def: &MethodDef) -> Result<MethodNode, WalkError> {
        self.require_name(&def.name, "method", def.span)?;
        let request = self.message_object(&format!("{}Request", def.name), &[], &def.request, def.span)?;
        let response =
            self.message_object(&format!("{}Response", def.name), &[], &def.response, def.span)?;
        Ok(MethodNode {
            name: def.name.clone(),
            description: def.description.clone(),
            http_method: def.http_method,
            http_path: def.http_path.clone(),
            request,
            response,
            query: None,
            span: def.span,
        })
    }

    /// A root-level object synthesized for a method or topic payload.
    pub(crate) fn message_object(
        &self,
        name: &str,
        virtual_props: &[PropertyDef],
        explicit: &[PropertyDef],
        span: Span,
    ) -> Result<ObjectNode, WalkError> {
        let meta = self.meta(name, vec![], &None, span);
        let mut nested = Vec::new();
        let properties = self.properties(&meta, virtual_props, explicit, &mut nested)?;
        Ok(ObjectNode {
            meta,
            properties,
            nested,
            entity: None,
            polymorph_member: vec![],
        })
    }

    pub(crate) fn topic(&self, def: &TopicDef) -> Result<TopicNode, WalkError> {
        self.require_name(&def.name, "topic", def.span)?;
        let (kind, messages): (TopicKindNode, Vec<&TopicMessageDef>) = match &def.kind {
            TopicKind::Publish { messages } => (TopicKindNode::Publish, messages.iter().collect()),
            TopicKind::Upsert { message } => (TopicKindNode::Upsert, vec![message]),
            TopicKind::ReqRes { request, reply } => (TopicKindNode::ReqRes, vec![request, reply]),
        };
        if messages.is_empty() {
            return Err(self.error(def.span, format!("topic {} has no messages", def.name)));
        }
        let messages = messages
            .into_iter()
            .map(|m| self.topic_message(m))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TopicNode {
            meta: self.meta(&def.name, vec![], &def.description, def.span),
            kind,
            messages,
        })
    }

    pub(crate) fn topic_message(&self, def: &TopicMessageDef) -> Result<TopicMessageNode, WalkError> {
        self.require_name(&def.name, "topic message", def.span)?;
        let message = self.message_object(&format!("{}Message", def.name), &[], &def.properties, def.span)?;
        Ok(TopicMessageNode {
            name: def.name.clone(),
            description: def.description.clone(),
            message,
            span: def.span,
        })
    }
}

/// Inline declarations may omit their name; it then derives from the
/// property.
pub(crate) trait NamedDef {
    fn def_name(&self) -> &str;
    fn set_def_name(&mut self, name: String);
}

macro_rules! named_def {
    ($($ty:ty),*) => {
        $(impl NamedDef for $ty {
            fn def_name(&self) -> &str {
                &self.name
            }
            fn set_def_name(&mut self, name: String) {
                self.name = name;
            }
        })*
    };
}

named_def!(ObjectDef, OneofDef, EnumDef, PolymorphDef);
