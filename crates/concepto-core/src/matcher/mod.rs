//! Predicate matcher
//!
//! Requirement sets are parsed once, at registration, into a list of typed
//! [`Predicate`]s. Node-local predicates are evaluated here; relational
//! predicates (ancestor/parent) need resolved commands and are evaluated by
//! the resolver.

pub mod eval;
pub mod predicate;

pub use eval::{field_spec_is_empty, field_spec_is_set, matches_local};
pub use predicate::{
    CompiledRequirements, FieldSpec, IconFilter, LevelBound, LevelCondition, Predicate,
    RequirementKind, TextMatch,
};
