//! The fully qualified name table shared by every file linked in one run.

use super::LinkError;
use prost_types::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Package,
    Message,
    Enum,
    EnumValue,
    Field,
    Oneof,
    Service,
    Method,
    Extension,
}

impl SymbolKind {
    pub fn is_type(self) -> bool {
        matches!(self, Self::Message | Self::Enum)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub kind: SymbolKind,
    /// Declaring file. Empty for packages, which many files share.
    pub file: String,
    /// For extensions: the fully qualified options message they extend.
    pub extendee: Option<String>,
}

/// Names are stored without the leading dot.
#[derive(Debug, Default)]
pub struct Symbols {
    table: BTreeMap<String, Symbol>,
    files: BTreeSet<String>,
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.table.get(name.trim_start_matches('.'))
    }

    pub fn contains_file(&self, filename: &str) -> bool {
        self.files.contains(filename)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Add every symbol `file` declares. Importing the same file again is a
    /// no-op and returns `false`. On error nothing is added.
    pub fn import_file(&mut self, file: &FileDescriptorProto) -> Result<bool, LinkError> {
        let filename = file.name().to_string();
        if self.files.contains(&filename) {
            return Ok(false);
        }

        let mut pending = Pending {
            file: &filename,
            table: &self.table,
            added: BTreeMap::new(),
        };

        let package = file.package();
        if !package.is_empty() {
            let mut prefix = String::new();
            for part in package.split('.') {
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(part);
                pending.package(&prefix)?;
            }
        }

        for message in &file.message_type {
            pending.message(package, message)?;
        }
        for enumeration in &file.enum_type {
            pending.enumeration(package, enumeration)?;
        }
        for extension in &file.extension {
            pending.extension(package, extension)?;
        }
        for service in &file.service {
            let name = qualify(package, service.name());
            pending.add(&name, SymbolKind::Service, None)?;
            for method in &service.method {
                pending.add(&qualify(&name, method.name()), SymbolKind::Method, None)?;
            }
        }

        let added = pending.added;
        self.table.extend(added);
        self.files.insert(filename);
        Ok(true)
    }
}

pub(crate) fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

struct Pending<'a> {
    file: &'a str,
    table: &'a BTreeMap<String, Symbol>,
    added: BTreeMap<String, Symbol>,
}

impl Pending<'_> {
    fn existing(&self, name: &str) -> Option<&Symbol> {
        self.added.get(name).or_else(|| self.table.get(name))
    }

    fn package(&mut self, name: &str) -> Result<(), LinkError> {
        match self.existing(name) {
            Some(sym) if sym.kind == SymbolKind::Package => Ok(()),
            Some(sym) => Err(LinkError::Duplicate {
                name: name.to_string(),
                existing: sym.file.clone(),
            }),
            None => {
                self.added.insert(
                    name.to_string(),
                    Symbol {
                        kind: SymbolKind::Package,
                        file: String::new(),
                        extendee: None,
                    },
                );
                Ok(())
            }
        }
    }

    fn add(&mut self, name: &str, kind: SymbolKind, extendee: Option<String>) -> Result<(), LinkError> {
        if let Some(sym) = self.existing(name) {
            let existing = if sym.file.is_empty() {
                "a package".to_string()
            } else {
                sym.file.clone()
            };
            return Err(LinkError::Duplicate {
                name: name.to_string(),
                existing,
            });
        }
        self.added.insert(
            name.to_string(),
            Symbol {
                kind,
                file: self.file.to_string(),
                extendee,
            },
        );
        Ok(())
    }

    fn message(&mut self, scope: &str, message: &DescriptorProto) -> Result<(), LinkError> {
        let name = qualify(scope, message.name());
        self.add(&name, SymbolKind::Message, None)?;
        for field in &message.field {
            self.add(&qualify(&name, field.name()), SymbolKind::Field, None)?;
        }
        for oneof in &message.oneof_decl {
            self.add(&qualify(&name, oneof.name()), SymbolKind::Oneof, None)?;
        }
        for nested in &message.nested_type {
            self.message(&name, nested)?;
        }
        for enumeration in &message.enum_type {
            self.enumeration(&name, enumeration)?;
        }
        for extension in &message.extension {
            self.extension(&name, extension)?;
        }
        Ok(())
    }

    /// Enum values are scoped as siblings of their enum.
    fn enumeration(&mut self, scope: &str, enumeration: &EnumDescriptorProto) -> Result<(), LinkError> {
        self.add(&qualify(scope, enumeration.name()), SymbolKind::Enum, None)?;
        for value in &enumeration.value {
            self.add(&qualify(scope, value.name()), SymbolKind::EnumValue, None)?;
        }
        Ok(())
    }

    fn extension(&mut self, scope: &str, field: &FieldDescriptorProto) -> Result<(), LinkError> {
        let extendee = field
            .extendee
            .as_deref()
            .map(|e| e.trim_start_matches('.').to_string());
        self.add(&qualify(scope, field.name()), SymbolKind::Extension, extendee)
    }
}
