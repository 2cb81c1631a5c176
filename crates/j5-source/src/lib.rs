//! J5 schema sources.
//!
//! - [`ast`]: the typed declarations a J5 parser produces
//! - [`sourcewalk`]: the uniform node model and visitor walk, including
//!   entity expansion
//! - [`errpos`]: positioned diagnostics shared by every compiler stage

pub mod ast;
pub mod case;
pub mod errpos;
pub mod sourcewalk;

pub use ast::{Position, SourceFile, Span};
pub use errpos::{PosError, PosErrors, Severity};
