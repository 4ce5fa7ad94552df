//! Relation definitions and integrity constraints.

use std::collections::BTreeSet;
use std::fmt;

use common_error::{QuarryError, QuarryResult};
use serde::{Deserialize, Serialize};

use crate::types::DbType;

/// Identifier of a relation (table or view).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(String);

impl RelationId {
    /// Create a relation id.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The relation name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RelationId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// An attribute of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Value type.
    pub db_type: DbType,
    /// Whether the attribute can contain nulls.
    pub nullable: bool,
}

/// A unique constraint over ordered attribute positions (0-based).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Constraint name.
    pub name: String,
    /// Determinant positions.
    pub determinants: Vec<usize>,
    /// Whether this is the primary key.
    pub is_primary_key: bool,
}

/// One column pair of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyComponent {
    /// Position in the referencing relation.
    pub from: usize,
    /// Position in the referenced relation.
    pub to: usize,
}

/// A foreign key from one relation to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyConstraint {
    /// Constraint name.
    pub name: String,
    /// Referenced relation.
    pub target: RelationId,
    /// Column pairs.
    pub components: Vec<ForeignKeyComponent>,
}

/// Schema of a relation: attributes plus integrity constraints.
///
/// Built once through [`RelationDefinitionBuilder`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDefinition {
    id: RelationId,
    attributes: Vec<Attribute>,
    unique_constraints: Vec<UniqueConstraint>,
    foreign_keys: Vec<ForeignKeyConstraint>,
}

impl RelationDefinition {
    /// Start building a relation definition.
    pub fn builder(id: impl Into<RelationId>) -> RelationDefinitionBuilder {
        RelationDefinitionBuilder::new(id.into())
    }

    pub fn id(&self) -> &RelationId {
        &self.id
    }

    pub fn arity(&self) -> usize {
        self.attributes.len()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attribute at a 0-based position.
    pub fn attribute(&self, position: usize) -> Option<&Attribute> {
        self.attributes.get(position)
    }

    /// Position of the attribute with the given name.
    pub fn attribute_position(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    /// Whether the attribute at `position` can be null. Unknown positions are
    /// treated as nullable.
    pub fn is_nullable(&self, position: usize) -> bool {
        self.attributes.get(position).map_or(true, |a| a.nullable)
    }

    pub fn unique_constraints(&self) -> &[UniqueConstraint] {
        &self.unique_constraints
    }

    pub fn foreign_keys(&self) -> &[ForeignKeyConstraint] {
        &self.foreign_keys
    }

    /// The primary key, if any.
    pub fn primary_key(&self) -> Option<&UniqueConstraint> {
        self.unique_constraints.iter().find(|uc| uc.is_primary_key)
    }

    /// Whether `positions` is a superset of the determinants of some unique
    /// constraint.
    pub fn is_unique_on(&self, positions: &BTreeSet<usize>) -> bool {
        self.unique_constraints
            .iter()
            .any(|uc| uc.determinants.iter().all(|p| positions.contains(p)))
    }
}

/// Builder for [`RelationDefinition`].
#[derive(Debug, Clone)]
pub struct RelationDefinitionBuilder {
    id: RelationId,
    attributes: Vec<Attribute>,
    unique_constraints: Vec<UniqueConstraint>,
    foreign_keys: Vec<ForeignKeyConstraint>,
}

impl RelationDefinitionBuilder {
    fn new(id: RelationId) -> Self {
        Self {
            id,
            attributes: Vec::new(),
            unique_constraints: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Append an attribute.
    pub fn attribute(mut self, name: impl Into<String>, db_type: DbType, nullable: bool) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            db_type,
            nullable,
        });
        self
    }

    /// Add a unique constraint over 0-based positions.
    pub fn unique_constraint(mut self, name: impl Into<String>, determinants: &[usize]) -> Self {
        self.unique_constraints.push(UniqueConstraint {
            name: name.into(),
            determinants: determinants.to_vec(),
            is_primary_key: false,
        });
        self
    }

    /// Add the primary key. Its attributes become non-nullable.
    pub fn primary_key(mut self, name: impl Into<String>, determinants: &[usize]) -> Self {
        self.unique_constraints.push(UniqueConstraint {
            name: name.into(),
            determinants: determinants.to_vec(),
            is_primary_key: true,
        });
        self
    }

    /// Add a foreign key given `(from, to)` position pairs.
    pub fn foreign_key(
        mut self,
        name: impl Into<String>,
        target: impl Into<RelationId>,
        pairs: &[(usize, usize)],
    ) -> Self {
        self.foreign_keys.push(ForeignKeyConstraint {
            name: name.into(),
            target: target.into(),
            components: pairs
                .iter()
                .map(|&(from, to)| ForeignKeyComponent { from, to })
                .collect(),
        });
        self
    }

    /// Validate and build the definition.
    pub fn build(mut self) -> QuarryResult<RelationDefinition> {
        let arity = self.attributes.len();
        let mut names = BTreeSet::new();
        for attr in &self.attributes {
            if !names.insert(attr.name.as_str()) {
                return Err(QuarryError::invalid_parameter(format!(
                    "relation {}: duplicate attribute {}",
                    self.id, attr.name
                )));
            }
        }
        if self.unique_constraints.iter().filter(|uc| uc.is_primary_key).count() > 1 {
            return Err(QuarryError::invalid_parameter(format!(
                "relation {}: more than one primary key",
                self.id
            )));
        }
        for uc in &self.unique_constraints {
            if uc.determinants.is_empty() {
                return Err(QuarryError::invalid_parameter(format!(
                    "relation {}: unique constraint {} has no determinant",
                    self.id, uc.name
                )));
            }
            if let Some(p) = uc.determinants.iter().find(|&&p| p >= arity) {
                return Err(QuarryError::invalid_parameter(format!(
                    "relation {}: unique constraint {} refers to position {p} (arity {arity})",
                    self.id, uc.name
                )));
            }
        }
        for fk in &self.foreign_keys {
            if fk.components.is_empty() {
                return Err(QuarryError::invalid_parameter(format!(
                    "relation {}: foreign key {} has no component",
                    self.id, fk.name
                )));
            }
            if let Some(c) = fk.components.iter().find(|c| c.from >= arity) {
                return Err(QuarryError::invalid_parameter(format!(
                    "relation {}: foreign key {} refers to position {} (arity {arity})",
                    self.id, fk.name, c.from
                )));
            }
        }

        let pk_positions: Vec<usize> = self
            .unique_constraints
            .iter()
            .filter(|uc| uc.is_primary_key)
            .flat_map(|uc| uc.determinants.clone())
            .collect();
        for p in pk_positions {
            self.attributes[p].nullable = false;
        }

        Ok(RelationDefinition {
            id: self.id,
            attributes: self.attributes,
            unique_constraints: self.unique_constraints,
            foreign_keys: self.foreign_keys,
        })
    }
}
