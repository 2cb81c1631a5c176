use super::error::WalkError;
use super::nodes::{
    EnumNode, ObjectNode, OneofNode, PolymorphNode, SchemaNode, ServiceNode, TopicNode,
};

/// Callbacks for each node kind. Implement only what you need; the defaults
/// ignore the node.
///
/// Root schemas arrive through these methods directly. Nested schemas do not:
/// the visitor decides when to descend, via [`SchemaNode::accept`] on the
/// entries of `nested`, so it can keep its own parent context.
pub trait SchemaVisitor {
    fn visit_object(&mut self, node: &ObjectNode) -> Result<(), WalkError> {
        let _ = node;
        Ok(())
    }

    fn visit_oneof(&mut self, node: &OneofNode) -> Result<(), WalkError> {
        let _ = node;
        Ok(())
    }

    fn visit_enum(&mut self, node: &EnumNode) -> Result<(), WalkError> {
        let _ = node;
        Ok(())
    }

    fn visit_polymorph(&mut self, node: &PolymorphNode) -> Result<(), WalkError> {
        let _ = node;
        Ok(())
    }

    fn visit_service(&mut self, node: &ServiceNode) -> Result<(), WalkError> {
        let _ = node;
        Ok(())
    }

    fn visit_topic(&mut self, node: &TopicNode) -> Result<(), WalkError> {
        let _ = node;
        Ok(())
    }

    /// Called with a non-fatal error for one root element. Returning `Ok`
    /// continues with the next sibling; the default aborts the walk.
    fn structural_error(&mut self, err: WalkError) -> Result<(), WalkError> {
        Err(err)
    }
}

impl SchemaNode {
    pub fn accept(&self, visitor: &mut dyn SchemaVisitor) -> Result<(), WalkError> {
        match self {
            Self::Object(n) => visitor.visit_object(n),
            Self::Oneof(n) => visitor.visit_oneof(n),
            Self::Enum(n) => visitor.visit_enum(n),
            Self::Polymorph(n) => visitor.visit_polymorph(n),
        }
    }
}
