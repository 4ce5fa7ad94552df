//! Relational schema metadata consumed by the optimizer.

mod provider;
mod relation;

pub use provider::{EmptyMetadataProvider, InMemoryMetadata, MetadataProvider};
pub use relation::{
    Attribute, ForeignKeyComponent, ForeignKeyConstraint, RelationDefinition,
    RelationDefinitionBuilder, RelationId, UniqueConstraint,
};
