use crate::ast::Span;
use crate::errpos::PosError;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub span: Span,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, span: Span) -> Self {
        Self {
            file: file.into(),
            span,
        }
    }
}

#[derive(Debug, Error)]
pub enum WalkError {
    /// Malformed declaration; aborts only the element it was found in.
    #[error("{message}")]
    Structural {
        message: String,
        location: SourceLocation,
    },

    #[error("entity {entity}: default status filter {status:?} is not a declared status")]
    UnknownStatusFilter {
        entity: String,
        status: String,
        location: SourceLocation,
    },
}

impl WalkError {
    pub fn structural(file: &str, span: Span, message: impl Into<String>) -> Self {
        Self::Structural {
            message: message.into(),
            location: SourceLocation::new(file, span),
        }
    }

    /// Fatal errors stop the walk regardless of the visitor's policy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownStatusFilter { .. })
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::Structural { location, .. } | Self::UnknownStatusFilter { location, .. } => {
                location
            }
        }
    }

    pub fn into_pos_error(self) -> PosError {
        let location = self.location().clone();
        PosError::at(location.file, location.span, self)
    }
}
