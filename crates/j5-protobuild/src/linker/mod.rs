//! A narrow proto linker: a shared symbol table and per-file reference
//! resolution. Option interpretation stops at resolving extension names.

mod link;
mod symbols;

pub use link::{link_file, LinkedFile};
pub use symbols::{Symbol, SymbolKind, Symbols};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("{name} is already defined in {existing}")]
    Duplicate { name: String, existing: String },

    #[error("{element}: unknown type {name}")]
    UnknownType { element: String, name: String },

    #[error("{element}: {name} is declared in {file}, which is not imported")]
    NotImported {
        element: String,
        name: String,
        file: String,
    },

    #[error("{element}: {name} is not a {expected}")]
    WrongKind {
        element: String,
        name: String,
        expected: &'static str,
    },

    #[error("{element}: unknown extension ({name})")]
    UnknownExtension { element: String, name: String },

    #[error("{element}: ({name}) extends {extendee}, not {expected}")]
    WrongExtendee {
        element: String,
        name: String,
        extendee: String,
        expected: &'static str,
    },

    #[error("{element}: field has neither a type nor a type name")]
    MissingType { element: String },

    #[error("dependency {0} has not been linked")]
    DependencyNotLinked(String),
}

/// Lint warning for an import nothing refers to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("import {import:?} is not used")]
pub struct UnusedImport {
    pub import: String,
}
