//! Append-only descriptor builders.
//!
//! Each builder keeps comments keyed by descriptor path relative to itself;
//! adding a child merges the child's comments under the child's path so the
//! final `SourceCodeInfo` paths are absolute.

use j5_source::ast::Span;
use prost_types::source_code_info::Location;
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MethodDescriptorProto, OneofDescriptorProto, ServiceDescriptorProto,
    SourceCodeInfo,
};
use std::collections::BTreeSet;

// Descriptor field numbers used in source paths.
const FILE_MESSAGE: i32 = 4;
const FILE_ENUM: i32 = 5;
const FILE_SERVICE: i32 = 6;
const MESSAGE_FIELD: i32 = 2;
const MESSAGE_NESTED: i32 = 3;
const MESSAGE_ENUM: i32 = 4;
const MESSAGE_ONEOF: i32 = 8;
const ENUM_VALUE: i32 = 2;
const SERVICE_METHOD: i32 = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentSet {
    entries: Vec<(Vec<i32>, Span, String)>,
}

impl CommentSet {
    pub fn add(&mut self, path: Vec<i32>, span: Span, text: Option<&str>) {
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            self.entries.push((path, span, text.to_string()));
        }
    }

    /// Take over `other`, prefixing each of its paths.
    pub fn merge_at(&mut self, prefix: &[i32], other: CommentSet) {
        for (path, span, text) in other.entries {
            let mut full = prefix.to_vec();
            full.extend(path);
            self.entries.push((full, span, text));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_source_code_info(mut self) -> SourceCodeInfo {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        SourceCodeInfo {
            location: self
                .entries
                .into_iter()
                .map(|(path, span, text)| Location {
                    path,
                    span: span_vec(span),
                    leading_comments: Some(format!(" {}\n", text.trim().replace('\n', "\n "))),
                    trailing_comments: None,
                    leading_detached_comments: vec![],
                })
                .collect(),
        }
    }
}

fn span_vec(span: Span) -> Vec<i32> {
    let n = |v: u32| i32::try_from(v).unwrap_or(i32::MAX);
    if span.start.line == span.end.line {
        vec![n(span.start.line), n(span.start.column), n(span.end.column)]
    } else {
        vec![
            n(span.start.line),
            n(span.start.column),
            n(span.end.line),
            n(span.end.column),
        ]
    }
}

// ============================================================================
// Files
// ============================================================================

#[derive(Debug)]
pub struct FileContext {
    fdp: FileDescriptorProto,
    comments: CommentSet,
    imports: BTreeSet<String>,
}

impl FileContext {
    pub fn new(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            fdp: FileDescriptorProto {
                name: Some(name.into()),
                package: Some(package.into()),
                syntax: Some("proto3".to_string()),
                ..Default::default()
            },
            comments: CommentSet::default(),
            imports: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.fdp.name()
    }

    pub fn package(&self) -> &str {
        self.fdp.package()
    }

    pub fn ensure_import(&mut self, file: &str) {
        if file != self.fdp.name() {
            self.imports.insert(file.to_string());
        }
    }

    /// Whether `file` is imported here, or is this file.
    pub fn has_import(&self, file: &str) -> bool {
        file == self.fdp.name() || self.imports.contains(file)
    }

    pub fn add_message(&mut self, message: MessageBuilder) {
        let idx = index(self.fdp.message_type.len());
        let (desc, comments) = message.build();
        self.fdp.message_type.push(desc);
        self.comments.merge_at(&[FILE_MESSAGE, idx], comments);
    }

    pub fn add_enum(&mut self, enumeration: EnumBuilder) {
        let idx = index(self.fdp.enum_type.len());
        self.fdp.enum_type.push(enumeration.desc);
        self.comments.merge_at(&[FILE_ENUM, idx], enumeration.comments);
    }

    pub fn add_service(&mut self, service: ServiceBuilder) {
        let idx = index(self.fdp.service.len());
        self.fdp.service.push(service.desc);
        self.comments.merge_at(&[FILE_SERVICE, idx], service.comments);
    }

    pub fn is_empty(&self) -> bool {
        self.fdp.message_type.is_empty() && self.fdp.enum_type.is_empty() && self.fdp.service.is_empty()
    }

    /// Read out the descriptor. Imports are sorted for stable output.
    pub fn finish(self) -> FileDescriptorProto {
        let mut fdp = self.fdp;
        fdp.dependency = self.imports.into_iter().collect();
        if !self.comments.is_empty() {
            fdp.source_code_info = Some(self.comments.into_source_code_info());
        }
        fdp
    }
}

fn index(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    pub desc: DescriptorProto,
    comments: CommentSet,
    /// Field indexes awaiting a synthetic oneof.
    synthetic: Vec<usize>,
}

impl MessageBuilder {
    pub fn new(name: impl Into<String>, description: Option<&str>, span: Span) -> Self {
        let mut comments = CommentSet::default();
        comments.add(vec![], span, description);
        Self {
            desc: DescriptorProto {
                name: Some(name.into()),
                ..Default::default()
            },
            comments,
            synthetic: vec![],
        }
    }

    pub fn name(&self) -> &str {
        self.desc.name()
    }

    pub fn add_field(
        &mut self,
        field: FieldDescriptorProto,
        description: Option<&str>,
        span: Span,
    ) -> usize {
        let idx = self.desc.field.len();
        self.comments.add(vec![MESSAGE_FIELD, index(idx)], span, description);
        self.desc.field.push(field);
        idx
    }

    pub fn add_oneof(&mut self, name: impl Into<String>, description: Option<&str>, span: Span) -> i32 {
        let idx = index(self.desc.oneof_decl.len());
        self.comments.add(vec![MESSAGE_ONEOF, idx], span, description);
        self.desc.oneof_decl.push(OneofDescriptorProto {
            name: Some(name.into()),
            options: None,
        });
        idx
    }

    /// Give the field at `field_idx` its own `_<name>` oneof, as proto3
    /// `optional` lowers. Synthetic oneofs follow all real ones.
    pub fn add_synthetic_oneof(&mut self, field_idx: usize) {
        if let Some(field) = self.desc.field.get_mut(field_idx) {
            field.proto3_optional = Some(true);
            self.synthetic.push(field_idx);
        }
    }

    pub fn add_message(&mut self, nested: MessageBuilder) {
        let idx = index(self.desc.nested_type.len());
        let (desc, comments) = nested.build();
        self.desc.nested_type.push(desc);
        self.comments.merge_at(&[MESSAGE_NESTED, idx], comments);
    }

    pub fn add_enum(&mut self, nested: EnumBuilder) {
        let idx = index(self.desc.enum_type.len());
        self.desc.enum_type.push(nested.desc);
        self.comments.merge_at(&[MESSAGE_ENUM, idx], nested.comments);
    }

    pub fn build(mut self) -> (DescriptorProto, CommentSet) {
        for field_idx in std::mem::take(&mut self.synthetic) {
            let oneof_idx = index(self.desc.oneof_decl.len());
            let Some(field) = self.desc.field.get_mut(field_idx) else {
                continue;
            };
            field.oneof_index = Some(oneof_idx);
            let name = format!("_{}", field.name());
            self.desc.oneof_decl.push(OneofDescriptorProto {
                name: Some(name),
                options: None,
            });
        }
        (self.desc, self.comments)
    }
}

// ============================================================================
// Enums and services
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct EnumBuilder {
    pub desc: EnumDescriptorProto,
    comments: CommentSet,
}

impl EnumBuilder {
    pub fn new(name: impl Into<String>, description: Option<&str>, span: Span) -> Self {
        let mut comments = CommentSet::default();
        comments.add(vec![], span, description);
        Self {
            desc: EnumDescriptorProto {
                name: Some(name.into()),
                ..Default::default()
            },
            comments,
        }
    }

    pub fn add_value(&mut self, name: impl Into<String>, number: i32, description: Option<&str>, span: Span) {
        let idx = index(self.desc.value.len());
        self.comments.add(vec![ENUM_VALUE, idx], span, description);
        self.desc.value.push(EnumValueDescriptorProto {
            name: Some(name.into()),
            number: Some(number),
            options: None,
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServiceBuilder {
    pub desc: ServiceDescriptorProto,
    comments: CommentSet,
}

impl ServiceBuilder {
    pub fn new(name: impl Into<String>, description: Option<&str>, span: Span) -> Self {
        let mut comments = CommentSet::default();
        comments.add(vec![], span, description);
        Self {
            desc: ServiceDescriptorProto {
                name: Some(name.into()),
                ..Default::default()
            },
            comments,
        }
    }

    pub fn add_method(&mut self, method: MethodDescriptorProto, description: Option<&str>, span: Span) {
        let idx = index(self.desc.method.len());
        self.comments.add(vec![SERVICE_METHOD, idx], span, description);
        self.desc.method.push(method);
    }
}
