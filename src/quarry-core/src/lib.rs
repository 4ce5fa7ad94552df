//! Core data model for Quarry.
//!
//! This crate provides the building blocks shared by the query algebra and
//! its optimizer:
//! - `Constant`, `DbType` and `TermType` for the type system
//! - `ImmutableTerm` and its typed evaluator and simplifier
//! - `Substitution`, `DataAtom` and `ProjectionAtom`
//! - `VariableGenerator` for fresh names
//! - `RelationDefinition` and the `MetadataProvider` trait

pub mod atom;
pub mod metadata;
pub mod substitution;
pub mod term;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
pub mod variable_generator;

// Re-export commonly used types
pub use atom::{DataAtom, ProjectionAtom};
pub use metadata::{
    Attribute, EmptyMetadataProvider, ForeignKeyConstraint, InMemoryMetadata, MetadataProvider,
    RelationDefinition, RelationId, UniqueConstraint,
};
pub use substitution::Substitution;
pub use term::{Bindings, FunctionSymbol, FunctionalTerm, ImmutableTerm, Variable};
pub use types::{Constant, DbType, TermType};
pub use variable_generator::VariableGenerator;
