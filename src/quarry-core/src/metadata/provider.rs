//! Read-only access to relation metadata.

use std::collections::BTreeMap;

use common_error::{QuarryError, QuarryResult};
use log::debug;

use super::{RelationDefinition, RelationId};

/// Source of relation definitions.
///
/// Providers are shared read-only between optimizations.
pub trait MetadataProvider: Send + Sync {
    /// Definition of a relation, if known.
    fn relation(&self, id: &RelationId) -> Option<&RelationDefinition>;

    /// Ids of all known relations.
    fn relation_ids(&self) -> Vec<RelationId>;

    /// Definition of a relation, `UnknownRelation` if absent.
    fn require_relation(&self, id: &RelationId) -> QuarryResult<&RelationDefinition> {
        self.relation(id)
            .ok_or_else(|| QuarryError::unknown_relation(id.as_str()))
    }
}

/// Metadata held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadata {
    relations: BTreeMap<RelationId, RelationDefinition>,
}

impl InMemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relation. Registering the same id twice is an error.
    pub fn add_relation(&mut self, relation: RelationDefinition) -> QuarryResult<()> {
        if self.relations.contains_key(relation.id()) {
            return Err(QuarryError::invalid_parameter(format!(
                "relation {} is already defined",
                relation.id()
            )));
        }
        debug!(
            "Registered relation {} ({} attributes, {} unique constraints)",
            relation.id(),
            relation.arity(),
            relation.unique_constraints().len()
        );
        self.relations.insert(relation.id().clone(), relation);
        Ok(())
    }

    /// Builder-style variant of [`add_relation`](Self::add_relation).
    pub fn with_relation(mut self, relation: RelationDefinition) -> QuarryResult<Self> {
        self.add_relation(relation)?;
        Ok(self)
    }

    /// Check that every foreign key references a known relation, with
    /// positions in range, and targets a unique constraint.
    pub fn validate(&self) -> QuarryResult<()> {
        for relation in self.relations.values() {
            for fk in relation.foreign_keys() {
                let target = self.require_relation(&fk.target)?;
                if let Some(c) = fk.components.iter().find(|c| c.to >= target.arity()) {
                    return Err(QuarryError::invalid_parameter(format!(
                        "foreign key {} of {} refers to position {} of {}",
                        fk.name,
                        relation.id(),
                        c.to,
                        target.id()
                    )));
                }
                let targets = fk.components.iter().map(|c| c.to).collect();
                if !target.is_unique_on(&targets) {
                    return Err(QuarryError::invalid_parameter(format!(
                        "foreign key {} of {} does not reference a unique constraint of {}",
                        fk.name,
                        relation.id(),
                        target.id()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl MetadataProvider for InMemoryMetadata {
    fn relation(&self, id: &RelationId) -> Option<&RelationDefinition> {
        self.relations.get(id)
    }

    fn relation_ids(&self) -> Vec<RelationId> {
        self.relations.keys().cloned().collect()
    }
}

/// Provider that knows no relation.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyMetadataProvider;

impl MetadataProvider for EmptyMetadataProvider {
    fn relation(&self, _id: &RelationId) -> Option<&RelationDefinition> {
        None
    }

    fn relation_ids(&self) -> Vec<RelationId> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DbType;

    fn parent() -> RelationDefinition {
        RelationDefinition::builder("P")
            .attribute("id", DbType::Integer, false)
            .primary_key("pk_p", &[0])
            .build()
            .unwrap()
    }

    #[test]
    fn test_require_relation() {
        let metadata = InMemoryMetadata::new().with_relation(parent()).unwrap();
        assert!(metadata.require_relation(&"P".into()).is_ok());
        let err = metadata.require_relation(&"Q".into()).unwrap_err();
        assert!(matches!(err, QuarryError::UnknownRelation(name) if name == "Q"));
        assert!(EmptyMetadataProvider.require_relation(&"P".into()).is_err());
    }

    #[test]
    fn test_duplicate_relation() {
        let metadata = InMemoryMetadata::new().with_relation(parent()).unwrap();
        assert!(metadata.with_relation(parent()).is_err());
    }

    #[test]
    fn test_validate_foreign_keys() {
        let child = RelationDefinition::builder("C")
            .attribute("id", DbType::Integer, false)
            .attribute("parent", DbType::Integer, false)
            .foreign_key("fk_c_p", "P", &[(1, 0)])
            .build()
            .unwrap();
        let ok = InMemoryMetadata::new()
            .with_relation(parent())
            .unwrap()
            .with_relation(child.clone())
            .unwrap();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.relation_ids().len(), 2);

        let dangling = InMemoryMetadata::new().with_relation(child).unwrap();
        assert!(matches!(
            dangling.validate(),
            Err(QuarryError::UnknownRelation(_))
        ));
    }
}
