//! J5 → protobuf descriptor conversion.
//!
//! [`convert_j5_file`] walks one source file's node model and builds its
//! `FileDescriptorProto`s. References to other schemas go through a
//! [`TypeResolver`]; [`source_file_summary`] produces the per-file manifest a
//! resolver is usually built from.

mod convert;
mod enums;
mod error;
mod ext;
mod fields;
mod file;
pub mod names;
pub mod options;
mod resolver;
mod rules;
mod summary;

pub use convert::convert_j5_file;
pub use enums::{enum_values, EnumValue};
pub use error::ConvertError;
pub use ext::J5FieldExt;
pub use file::{CommentSet, EnumBuilder, FileContext, MessageBuilder, ServiceBuilder};
pub use resolver::{
    is_well_known_package, well_known_file, well_known_type, ImportScope, ResolveError,
    StaticResolver, TypeResolver,
};
pub use rules::ID62_PATTERN;
pub use summary::{
    source_file_summary, EnumRef, FileSummary, TypeDependency, TypeRef, TypeRefKind,
};
