//! Source node model.
//!
//! Normalizes J5 declarations into a tree of typed nodes and drives a
//! [`SchemaVisitor`] over them in document order. Entities are expanded here,
//! once, into plain objects, enums, oneofs, services and topics.

mod entity;
mod error;
mod nodes;
mod visitor;
mod walk;

pub use entity::{
    EVENT_METADATA, EVENT_PUBLISH_METADATA, PAGE_REQUEST, PAGE_RESPONSE, QUERY_REQUEST,
    STATE_METADATA, UPSERT_METADATA,
};
pub use error::{SourceLocation, WalkError};
pub use nodes::*;
pub use visitor::SchemaVisitor;
pub use walk::{file_nodes, walk_file, RootNode};

#[cfg(test)]
mod tests;
