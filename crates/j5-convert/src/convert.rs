//! Source file → descriptor files.

use crate::enums::build_enum;
use crate::error::ConvertError;
use crate::file::{FileContext, MessageBuilder, ServiceBuilder};
use crate::names::{proto_filename, sub_filename, sub_package, SUB_SERVICE, SUB_TOPIC};
use crate::options::{
    Extension, TextMessage, TextValue, HTTP, J5_ENUM, J5_MESSAGE, J5_METHOD, J5_SERVICE,
    MESSAGING_SERVICE,
};
use crate::resolver::{well_known_file, well_known_type, ImportScope, TypeResolver, ANY, EMPTY};
use crate::summary::{local_exports, TypeRef, TypeRefKind};
use j5_source::ast::{RefName, SourceFile, Span};
use j5_source::case::to_snake;
use j5_source::errpos::{PosError, PosErrors};
use j5_source::sourcewalk::{
    file_nodes, walk_file, EnumNode, MethodNode, ObjectNode, OneofNode, PolymorphNode,
    QueryMethodKind, RootNode, SchemaNode, SchemaVisitor, ServiceEntity, ServiceNode,
    TopicNode, WalkError,
};
use prost_types::{FileDescriptorProto, MethodDescriptorProto};
use std::collections::BTreeMap;
use tracing::debug;

/// Convert one J5 source file into its descriptor files: the main file, then
/// the service and topic files when the source declares any.
///
/// Errors are collected across the whole file and returned together.
pub fn convert_j5_file(
    resolver: &dyn TypeResolver,
    source: &SourceFile,
) -> Result<Vec<FileDescriptorProto>, PosErrors> {
    let mut converter = Converter::new(resolver, source);
    if let Err(err) = walk_file(source, &mut converter) {
        converter.errors.push(err.into_pos_error());
    }
    converter.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Main,
    Service,
    Topic,
}

pub(crate) struct Converter<'a> {
    resolver: &'a dyn TypeResolver,
    pub(crate) source: &'a SourceFile,
    scope: ImportScope,
    /// Types declared by this file, keyed by name within their package.
    local: BTreeMap<String, TypeRef>,
    main: FileContext,
    service: Option<FileContext>,
    topic: Option<FileContext>,
    pub(crate) target: Target,
    /// Messages under construction, outermost first.
    pub(crate) stack: Vec<MessageBuilder>,
    pub(crate) errors: PosErrors,
}

impl<'a> Converter<'a> {
    fn new(resolver: &'a dyn TypeResolver, source: &'a SourceFile) -> Self {
        let main_name = proto_filename(&source.path);
        let (nodes, _) = file_nodes(source);
        let mut local = BTreeMap::new();
        let mut main_schemas = Vec::new();
        for node in nodes {
            match node {
                RootNode::Schema(schema) => main_schemas.push(schema),
                RootNode::Service(service) => {
                    let objects = service
                        .methods
                        .into_iter()
                        .flat_map(|m| [m.request, m.response])
                        .map(SchemaNode::Object)
                        .collect::<Vec<_>>();
                    local_exports(
                        &sub_package(&source.package, SUB_SERVICE),
                        &sub_filename(&source.path, SUB_SERVICE),
                        &objects,
                        &mut local,
                    );
                }
                RootNode::Topic(topic) => {
                    let objects = topic
                        .messages
                        .into_iter()
                        .map(|m| SchemaNode::Object(m.message))
                        .collect::<Vec<_>>();
                    local_exports(
                        &sub_package(&source.package, SUB_TOPIC),
                        &sub_filename(&source.path, SUB_TOPIC),
                        &objects,
                        &mut local,
                    );
                }
            }
        }
        // Main-package schemas win over sub-package payloads of the same name.
        local_exports(&source.package, &main_name, &main_schemas, &mut local);

        Self {
            resolver,
            source,
            scope: ImportScope::new(source),
            local,
            main: FileContext::new(main_name, source.package.clone()),
            service: None,
            topic: None,
            target: Target::Main,
            stack: Vec::new(),
            errors: PosErrors::new(),
        }
    }

    fn finish(mut self) -> Result<Vec<FileDescriptorProto>, PosErrors> {
        if self.errors.has_errors() {
            return Err(self.errors);
        }
        // Explicit file imports no produced file uses stay on the main file,
        // so lint can flag them.
        for path in self.source.imports.iter().filter_map(|i| i.path.as_deref()) {
            let used = self.main.has_import(path)
                || self.service.as_ref().is_some_and(|f| f.has_import(path))
                || self.topic.as_ref().is_some_and(|f| f.has_import(path));
            if !used {
                self.main.ensure_import(path);
            }
        }
        let mut files = vec![self.main.finish()];
        files.extend(self.service.map(FileContext::finish));
        files.extend(self.topic.map(FileContext::finish));
        debug!(
            source = %self.source.path,
            files = files.len(),
            "converted j5 source"
        );
        Ok(files)
    }

    pub(crate) fn file(&mut self) -> &mut FileContext {
        match self.target {
            Target::Main => &mut self.main,
            Target::Service => self.service.get_or_insert_with(|| {
                FileContext::new(
                    sub_filename(&self.source.path, SUB_SERVICE),
                    sub_package(&self.source.package, SUB_SERVICE),
                )
            }),
            Target::Topic => self.topic.get_or_insert_with(|| {
                FileContext::new(
                    sub_filename(&self.source.path, SUB_TOPIC),
                    sub_package(&self.source.package, SUB_TOPIC),
                )
            }),
        }
    }

    pub(crate) fn error(&mut self, span: Span, err: impl Into<ConvertError>) {
        let err: ConvertError = err.into();
        self.errors
            .push(PosError::at(self.source.path.clone(), span, err));
    }

    /// Fully qualified name (no leading dot) of the innermost message under
    /// construction.
    pub(crate) fn current_scope(&mut self) -> String {
        let mut parts = vec![self.file().package().to_string()];
        parts.extend(self.stack.iter().map(|m| m.name().to_string()));
        parts.join(".")
    }

    pub(crate) fn import_extension(&mut self, ext: Extension) {
        self.file().ensure_import(ext.file);
    }

    // ------------------------------------------------------------------
    // Type resolution
    // ------------------------------------------------------------------

    /// Resolve a by-name reference and import its declaring file.
    pub(crate) fn resolve(&mut self, target: &RefName) -> Result<TypeRef, ConvertError> {
        let found = self.lookup(target)?;
        self.file().ensure_import(&found.file);
        Ok(found)
    }

    fn lookup(&self, target: &RefName) -> Result<TypeRef, ConvertError> {
        let package = match &target.package {
            Some(qualifier) => self.scope.expand_package(qualifier),
            None => {
                if let Some(found) = self.local.get(&target.schema) {
                    return Ok(found.clone());
                }
                self.source.package.clone()
            }
        };
        if package == self.source.package {
            if let Some(found) = self.local.get(&target.schema) {
                return Ok(found.clone());
            }
        }
        if let Some(found) = well_known_type(&package, &target.schema) {
            return Ok(found);
        }
        Ok(self.resolver.resolve_type(&package, &target.schema)?)
    }

    fn emit_message(&mut self, message: MessageBuilder) {
        match self.stack.last_mut() {
            Some(parent) => parent.add_message(message),
            None => self.file().add_message(message),
        }
    }

    fn message_option(message: &mut MessageBuilder, body: TextMessage) {
        message
            .desc
            .options
            .get_or_insert_with(Default::default)
            .uninterpreted_option
            .push(J5_MESSAGE.option(&body));
    }

    /// Convert an object node into a message at the current position,
    /// recursing into nested schemas through the visitor.
    fn object(&mut self, node: &ObjectNode) -> Result<(), WalkError> {
        let mut message = MessageBuilder::new(
            &node.meta.name,
            node.meta.description.as_deref(),
            node.meta.span,
        );
        let mut body = TextMessage::new();
        if let Some(entity) = &node.entity {
            body.push(
                "entity",
                TextValue::Message(
                    TextMessage::new()
                        .with("entity", entity.entity.as_str().into())
                        .with("part", TextValue::Ident(entity.part.as_str().to_string())),
                ),
            );
        }
        for polymorph in &node.polymorph_member {
            if let Err(err) = self.check_polymorph_member(node, polymorph) {
                self.error(node.meta.span, err);
            }
        }
        if !node.polymorph_member.is_empty() {
            body.push(
                "polymorph_member",
                TextValue::List(
                    node.polymorph_member
                        .iter()
                        .map(|m| m.as_str().into())
                        .collect(),
                ),
            );
        }
        Self::message_option(&mut message, TextMessage::new().with_message("object", body));
        self.import_extension(J5_MESSAGE);

        self.stack.push(message);
        for prop in &node.properties {
            if let Err(err) = self.build_property(prop, None) {
                self.error(prop.span, err);
            }
        }
        for nested in &node.nested {
            nested.accept(self)?;
        }
        if let Some(message) = self.stack.pop() {
            self.emit_message(message);
        }
        Ok(())
    }

    fn check_polymorph_member(&self, node: &ObjectNode, polymorph: &str) -> Result<(), ConvertError> {
        let target = match polymorph.rsplit_once('.') {
            Some((package, schema)) => RefName::in_package(package, schema),
            None => RefName::local(polymorph),
        };
        let found = self.lookup(&target)?;
        let TypeRefKind::Polymorph { members } = &found.kind else {
            return Err(ConvertError::WrongKind {
                name: node.meta.name.clone(),
                target: polymorph.to_string(),
                expected: "polymorph",
                found: found.kind_name(),
            });
        };
        let own = format!("{}.{}", self.source.package, node.meta.name_in_package());
        if !members.contains(&own) {
            return Err(ConvertError::NotPolymorphMember {
                object: own,
                polymorph: found.full_name(),
            });
        }
        Ok(())
    }

    fn method(&mut self, service: &ServiceNode, method: &MethodNode) -> MethodDescriptorProto {
        let package = self.file().package().to_string();
        let mut desc = MethodDescriptorProto {
            name: Some(method.name.clone()),
            input_type: Some(format!(".{package}.{}", method.request.meta.name)),
            output_type: Some(format!(".{package}.{}", method.response.meta.name)),
            ..Default::default()
        };

        let path = format!("{}{}", service.base_path.trim_end_matches('/'), method.http_path);
        let mut http = TextMessage::new().with(method.http_method.as_str(), path.into());
        if method.http_method != j5_source::ast::HttpMethod::Get {
            http.push("body", "*".into());
        }
        let options = desc.options.get_or_insert_with(Default::default);
        options.uninterpreted_option.push(HTTP.option(&http));
        if let Some(kind) = method.query {
            let flag = match kind {
                QueryMethodKind::Get => "get",
                QueryMethodKind::List => "list",
                QueryMethodKind::ListEvents => "list_events",
            };
            let body = TextMessage::new().with_message(
                "state_query",
                TextMessage::new().with(flag, TextValue::Bool(true)),
            );
            options.uninterpreted_option.push(J5_METHOD.option(&body));
            self.import_extension(J5_METHOD);
        }
        self.import_extension(HTTP);
        desc
    }

    /// Runs `build` with generated definitions going to `target`.
    fn with_target<T>(
        &mut self,
        target: Target,
        build: impl FnOnce(&mut Self) -> Result<T, WalkError>,
    ) -> Result<T, WalkError> {
        let previous = std::mem::replace(&mut self.target, target);
        let result = build(self);
        self.target = previous;
        result
    }

    fn service(&mut self, node: &ServiceNode) -> Result<(), WalkError> {
        let mut service = ServiceBuilder::new(
            &node.meta.name,
            node.meta.description.as_deref(),
            node.meta.span,
        );
        if let Some(entity) = &node.entity {
            let (kind, name) = match entity {
                ServiceEntity::Query { entity } => ("state_query", entity),
                ServiceEntity::Command { entity } => ("state_command", entity),
            };
            let body = TextMessage::new().with_message(
                kind,
                TextMessage::new().with("entity", name.as_str().into()),
            );
            service
                .desc
                .options
                .get_or_insert_with(Default::default)
                .uninterpreted_option
                .push(J5_SERVICE.option(&body));
            self.import_extension(J5_SERVICE);
        }

        for method in &node.methods {
            self.object(&method.request)?;
            self.object(&method.response)?;
            let desc = self.method(node, method);
            service.add_method(desc, method.description.as_deref(), method.span);
        }
        self.file().add_service(service);
        Ok(())
    }

    fn topic(&mut self, node: &TopicNode) -> Result<(), WalkError> {
        let mut service = ServiceBuilder::new(
            format!("{}Topic", node.meta.name),
            node.meta.description.as_deref(),
            node.meta.span,
        );
        let body = TextMessage::new()
            .with("topic_name", to_snake(&node.meta.name).into())
            .with_message(node.kind.as_str(), TextMessage::new());
        service
            .desc
            .options
            .get_or_insert_with(Default::default)
            .uninterpreted_option
            .push(MESSAGING_SERVICE.option(&body));
        self.import_extension(MESSAGING_SERVICE);
        if let Some(empty) = well_known_file(EMPTY.0, EMPTY.1) {
            self.file().ensure_import(empty);
        }

        let package = self.file().package().to_string();
        for message in &node.messages {
            self.object(&message.message)?;
            service.add_method(
                MethodDescriptorProto {
                    name: Some(message.name.clone()),
                    input_type: Some(format!(".{package}.{}", message.message.meta.name)),
                    output_type: Some(format!(".{}.{}", EMPTY.0, EMPTY.1)),
                    ..Default::default()
                },
                message.description.as_deref(),
                message.span,
            );
        }
        self.file().add_service(service);
        Ok(())
    }
}

impl SchemaVisitor for Converter<'_> {
    fn visit_object(&mut self, node: &ObjectNode) -> Result<(), WalkError> {
        self.object(node)
    }

    fn visit_oneof(&mut self, node: &OneofNode) -> Result<(), WalkError> {
        let mut message = MessageBuilder::new(
            &node.meta.name,
            node.meta.description.as_deref(),
            node.meta.span,
        );
        let oneof_index = message.add_oneof("type", None, node.meta.span);
        let mut body = TextMessage::new();
        if let Some(entity) = &node.entity {
            body.push(
                "entity",
                TextValue::Message(
                    TextMessage::new()
                        .with("entity", entity.entity.as_str().into())
                        .with("part", TextValue::Ident(entity.part.as_str().to_string())),
                ),
            );
        }
        Self::message_option(&mut message, TextMessage::new().with_message("oneof", body));
        self.import_extension(J5_MESSAGE);

        self.stack.push(message);
        for prop in &node.properties {
            if let Err(err) = self.build_property(prop, Some(oneof_index)) {
                self.error(prop.span, err);
            }
        }
        for nested in &node.nested {
            nested.accept(self)?;
        }
        if let Some(message) = self.stack.pop() {
            self.emit_message(message);
        }
        Ok(())
    }

    fn visit_enum(&mut self, node: &EnumNode) -> Result<(), WalkError> {
        let builder = build_enum(node);
        if node.entity.is_some() {
            self.import_extension(J5_ENUM);
        }
        match self.stack.last_mut() {
            Some(parent) => parent.add_enum(builder),
            None => self.file().add_enum(builder),
        }
        Ok(())
    }

    fn visit_polymorph(&mut self, node: &PolymorphNode) -> Result<(), WalkError> {
        let mut message = MessageBuilder::new(
            &node.meta.name,
            node.meta.description.as_deref(),
            node.meta.span,
        );
        message.add_field(crate::fields::any_field("value", 1), None, node.meta.span);
        if let Some(any) = well_known_file(ANY.0, ANY.1) {
            self.file().ensure_import(any);
        }
        let members = TextValue::List(node.members.iter().map(|m| m.as_str().into()).collect());
        Self::message_option(
            &mut message,
            TextMessage::new().with_message("polymorph", TextMessage::new().with("members", members)),
        );
        self.import_extension(J5_MESSAGE);
        self.emit_message(message);
        Ok(())
    }

    fn visit_service(&mut self, node: &ServiceNode) -> Result<(), WalkError> {
        self.with_target(Target::Service, |c| c.service(node))
    }

    fn visit_topic(&mut self, node: &TopicNode) -> Result<(), WalkError> {
        self.with_target(Target::Topic, |c| c.topic(node))
    }

    fn structural_error(&mut self, err: WalkError) -> Result<(), WalkError> {
        self.errors.push(err.into_pos_error());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;

    fn source() -> SourceFile {
        SourceFile {
            path: "foo/v1/foo.j5s".into(),
            package: "foo.v1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn target_is_restored_when_a_sub_file_fails() {
        let resolver = StaticResolver::default();
        let source = source();
        let mut converter = Converter::new(&resolver, &source);

        let result: Result<(), WalkError> = converter.with_target(Target::Service, |c| {
            assert_eq!(c.target, Target::Service);
            Err(WalkError::structural("foo/v1/foo.j5s", Span::at(4, 0), "bad method"))
        });
        assert!(result.is_err());
        assert_eq!(converter.target, Target::Main);

        converter
            .with_target(Target::Topic, |c| {
                c.with_target(Target::Service, |_| Ok(()))?;
                assert_eq!(c.target, Target::Topic);
                Ok(())
            })
            .unwrap();
        assert_eq!(converter.target, Target::Main);
        assert_eq!(converter.file().name(), "foo/v1/foo.j5s.proto");
    }
}
