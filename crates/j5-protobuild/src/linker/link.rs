//! Resolving one file against the symbol table.

use super::symbols::{qualify, Symbol, SymbolKind, Symbols};
use super::LinkError;
use j5_convert::options::extension_names;
use prost_types::field_descriptor_proto::Type;
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    ServiceDescriptorProto, UninterpretedOption,
};
use std::collections::BTreeSet;
use tracing::debug;

const FILE_OPTIONS: &str = "google.protobuf.FileOptions";
const MESSAGE_OPTIONS: &str = "google.protobuf.MessageOptions";
const FIELD_OPTIONS: &str = "google.protobuf.FieldOptions";
const ONEOF_OPTIONS: &str = "google.protobuf.OneofOptions";
const ENUM_OPTIONS: &str = "google.protobuf.EnumOptions";
const ENUM_VALUE_OPTIONS: &str = "google.protobuf.EnumValueOptions";
const SERVICE_OPTIONS: &str = "google.protobuf.ServiceOptions";
const METHOD_OPTIONS: &str = "google.protobuf.MethodOptions";

/// A file whose type references are all absolute and checked.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedFile {
    pub descriptor: FileDescriptorProto,
    /// Direct imports no type reference or option extension needed.
    pub unused_imports: Vec<String>,
}

impl LinkedFile {
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }
}

/// Link `file` against `symbols`.
///
/// `file` and each of its dependencies must already be imported into
/// `symbols`. Relative type names are resolved outward from the scope they
/// appear in, and filled in as fully qualified names with their types set.
/// Extension option names are resolved the same way, and the files declaring
/// the extensions count as used imports.
pub fn link_file(file: &FileDescriptorProto, symbols: &Symbols) -> Result<LinkedFile, LinkError> {
    for dep in &file.dependency {
        if !symbols.contains_file(dep) {
            return Err(LinkError::DependencyNotLinked(dep.clone()));
        }
    }

    let mut linker = Linker {
        filename: file.name(),
        symbols,
        visible: file
            .dependency
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(file.name()))
            .collect(),
        used: BTreeSet::new(),
    };

    let mut out = file.clone();
    let package = file.package().to_string();
    if let Some(options) = &out.options {
        linker.options(&package, &options.uninterpreted_option, FILE_OPTIONS)?;
    }
    for message in &mut out.message_type {
        linker.message(&package, message)?;
    }
    for enumeration in &out.enum_type {
        linker.enumeration(&package, enumeration)?;
    }
    for extension in &mut out.extension {
        linker.extension(&package, extension)?;
    }
    for service in &mut out.service {
        linker.service(&package, service)?;
    }

    let unused_imports: Vec<String> = file
        .dependency
        .iter()
        .filter(|dep| !linker.used.contains(dep.as_str()))
        .cloned()
        .collect();
    debug!(
        file = file.name(),
        used = linker.used.len(),
        unused = unused_imports.len(),
        "linked file"
    );
    Ok(LinkedFile {
        descriptor: out,
        unused_imports,
    })
}

struct Linker<'a> {
    filename: &'a str,
    symbols: &'a Symbols,
    visible: BTreeSet<&'a str>,
    used: BTreeSet<String>,
}

impl Linker<'_> {
    /// Find `name` as seen from `scope`, innermost scope first.
    fn lookup(
        &self,
        scope: &str,
        name: &str,
        accept: impl Fn(&Symbol) -> bool,
    ) -> Option<(String, Symbol)> {
        if let Some(absolute) = name.strip_prefix('.') {
            return self
                .symbols
                .lookup(absolute)
                .filter(|s| accept(s))
                .map(|s| (absolute.to_string(), s.clone()));
        }
        let mut scope = scope;
        loop {
            let candidate = qualify(scope, name);
            if let Some(sym) = self.symbols.lookup(&candidate).filter(|s| accept(s)) {
                return Some((candidate, sym.clone()));
            }
            if scope.is_empty() {
                return None;
            }
            scope = scope.rsplit_once('.').map(|(outer, _)| outer).unwrap_or("");
        }
    }

    /// Record use of a symbol declared elsewhere, failing when its file is
    /// not imported.
    fn use_symbol(&mut self, element: &str, name: &str, sym: &Symbol) -> Result<(), LinkError> {
        if sym.file == self.filename {
            return Ok(());
        }
        if !self.visible.contains(sym.file.as_str()) {
            return Err(LinkError::NotImported {
                element: element.to_string(),
                name: name.to_string(),
                file: sym.file.clone(),
            });
        }
        self.used.insert(sym.file.clone());
        Ok(())
    }

    fn resolve_type(&mut self, element: &str, scope: &str, name: &str) -> Result<(String, SymbolKind), LinkError> {
        let Some((full, sym)) = self.lookup(scope, name, |s| s.kind.is_type()) else {
            return Err(LinkError::UnknownType {
                element: element.to_string(),
                name: name.to_string(),
            });
        };
        self.use_symbol(element, &full, &sym)?;
        Ok((full, sym.kind))
    }

    fn resolve_message(&mut self, element: &str, scope: &str, name: &str) -> Result<String, LinkError> {
        let (full, kind) = self.resolve_type(element, scope, name)?;
        if kind != SymbolKind::Message {
            return Err(LinkError::WrongKind {
                element: element.to_string(),
                name: full,
                expected: "message",
            });
        }
        Ok(format!(".{full}"))
    }

    fn options(
        &mut self,
        scope: &str,
        options: &[UninterpretedOption],
        extendee: &'static str,
    ) -> Result<(), LinkError> {
        for name in extension_names(options) {
            let Some((full, sym)) = self.lookup(scope, name, |s| s.kind == SymbolKind::Extension)
            else {
                return Err(LinkError::UnknownExtension {
                    element: scope.to_string(),
                    name: name.to_string(),
                });
            };
            if sym.extendee.as_deref() != Some(extendee) {
                return Err(LinkError::WrongExtendee {
                    element: scope.to_string(),
                    name: full,
                    extendee: sym.extendee.clone().unwrap_or_default(),
                    expected: extendee,
                });
            }
            self.use_symbol(scope, &full, &sym)?;
        }
        Ok(())
    }

    fn message(&mut self, scope: &str, message: &mut DescriptorProto) -> Result<(), LinkError> {
        let name = qualify(scope, message.name());
        if let Some(options) = &message.options {
            self.options(&name, &options.uninterpreted_option, MESSAGE_OPTIONS)?;
        }
        for field in &mut message.field {
            self.field(&name, field)?;
        }
        for oneof in &message.oneof_decl {
            if let Some(options) = &oneof.options {
                let element = qualify(&name, oneof.name());
                self.options(&element, &options.uninterpreted_option, ONEOF_OPTIONS)?;
            }
        }
        for nested in &mut message.nested_type {
            self.message(&name, nested)?;
        }
        for enumeration in &message.enum_type {
            self.enumeration(&name, enumeration)?;
        }
        for extension in &mut message.extension {
            self.extension(&name, extension)?;
        }
        Ok(())
    }

    /// `scope` is the enclosing message; type names resolve from there.
    fn field(&mut self, scope: &str, field: &mut FieldDescriptorProto) -> Result<(), LinkError> {
        let element = qualify(scope, field.name());
        if let Some(options) = &field.options {
            self.options(&element, &options.uninterpreted_option, FIELD_OPTIONS)?;
        }

        let Some(type_name) = field.type_name.clone() else {
            if field.r#type.is_none() {
                return Err(LinkError::MissingType { element });
            }
            return Ok(());
        };
        let (full, kind) = self.resolve_type(&element, scope, &type_name)?;
        let resolved = if kind == SymbolKind::Enum {
            Type::Enum
        } else {
            Type::Message
        };
        match field.r#type.map(|_| field.r#type()) {
            None => field.set_type(resolved),
            Some(Type::Group) if resolved == Type::Message => {}
            Some(declared) if declared == resolved => {}
            Some(_) => {
                return Err(LinkError::WrongKind {
                    element,
                    name: full,
                    expected: if resolved == Type::Enum { "message" } else { "enum" },
                })
            }
        }
        field.type_name = Some(format!(".{full}"));
        Ok(())
    }

    fn extension(&mut self, scope: &str, field: &mut FieldDescriptorProto) -> Result<(), LinkError> {
        let element = qualify(scope, field.name());
        if let Some(extendee) = field.extendee.clone() {
            field.extendee = Some(self.resolve_message(&element, scope, &extendee)?);
        }
        self.field(scope, field)
    }

    fn enumeration(&mut self, scope: &str, enumeration: &EnumDescriptorProto) -> Result<(), LinkError> {
        let name = qualify(scope, enumeration.name());
        if let Some(options) = &enumeration.options {
            self.options(&name, &options.uninterpreted_option, ENUM_OPTIONS)?;
        }
        for value in &enumeration.value {
            if let Some(options) = &value.options {
                let element = qualify(&name, value.name());
                self.options(&element, &options.uninterpreted_option, ENUM_VALUE_OPTIONS)?;
            }
        }
        Ok(())
    }

    fn service(&mut self, scope: &str, service: &mut ServiceDescriptorProto) -> Result<(), LinkError> {
        let name = qualify(scope, service.name());
        if let Some(options) = &service.options {
            self.options(&name, &options.uninterpreted_option, SERVICE_OPTIONS)?;
        }
        for method in &mut service.method {
            let element = qualify(&name, method.name());
            if let Some(options) = &method.options {
                self.options(&element, &options.uninterpreted_option, METHOD_OPTIONS)?;
            }
            let input = method.input_type.clone().unwrap_or_default();
            method.input_type = Some(self.resolve_message(&element, scope, &input)?);
            let output = method.output_type.clone().unwrap_or_default();
            method.output_type = Some(self.resolve_message(&element, scope, &output)?);
        }
        Ok(())
    }
}
