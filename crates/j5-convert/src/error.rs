use crate::resolver::ResolveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("property {name} cannot be both required and optional")]
    RequiredAndOptional { name: String },

    #[error("{kind} property {name} cannot be optional")]
    OptionalCollection { name: String, kind: &'static str },

    #[error("property {name}: {outer} items cannot be {inner}")]
    NestedCollection {
        name: String,
        outer: &'static str,
        inner: &'static str,
    },

    #[error("property {name}: exclusive {bound} is set without a {bound} value")]
    ExclusiveWithoutBound { name: String, bound: &'static str },

    #[error("enum {enum_name} has no value {value}")]
    UnknownEnumValue { enum_name: String, value: String },

    #[error("property {name}: {target} is a {found}, expected {expected}")]
    WrongKind {
        name: String,
        target: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("object {object} declares membership of {polymorph}, which does not list it")]
    NotPolymorphMember { object: String, polymorph: String },
}
