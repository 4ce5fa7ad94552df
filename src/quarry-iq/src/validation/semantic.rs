//! Semantic validation of query trees against relation metadata.
//!
//! This module checks:
//! - relation existence
//! - argument positions against relation arity
//! - constant arguments against attribute types
//! - condition typing

use std::collections::BTreeMap;
use std::fmt;

use quarry_core::{ImmutableTerm, MetadataProvider, TermType, Variable};

use crate::node::IQTree;

/// A semantic validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticValidationError {
    /// The relation is unknown to the metadata provider.
    UnknownRelation {
        /// The relation id.
        relation: String,
    },

    /// An argument position exceeds the relation arity.
    PositionOutOfBounds {
        /// The relation id.
        relation: String,
        /// The position.
        position: usize,
        /// The relation arity.
        arity: usize,
    },

    /// Type mismatch in a condition or an argument.
    TypeMismatch {
        /// Description of the type mismatch.
        message: String,
    },
}

impl fmt::Display for SemanticValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRelation { relation } => write!(f, "unknown relation {relation}"),
            Self::PositionOutOfBounds {
                relation,
                position,
                arity,
            } => write!(
                f,
                "position {position} is out of bounds for {relation} of arity {arity}"
            ),
            Self::TypeMismatch { message } => write!(f, "type mismatch: {message}"),
        }
    }
}

impl std::error::Error for SemanticValidationError {}

/// Semantic validator for query trees.
pub struct SemanticValidator<'a> {
    metadata: &'a dyn MetadataProvider,
    /// Attribute types of the variables, as found on extensional nodes.
    types: BTreeMap<Variable, TermType>,
    errors: Vec<SemanticValidationError>,
}

impl<'a> SemanticValidator<'a> {
    /// Validate a tree against `metadata`, collecting every error.
    pub fn validate(
        tree: &IQTree,
        metadata: &'a dyn MetadataProvider,
    ) -> Result<(), Vec<SemanticValidationError>> {
        let mut validator = Self {
            metadata,
            types: BTreeMap::new(),
            errors: Vec::new(),
        };
        validator.collect_leaf_types(tree);
        validator.check_conditions(tree);
        if validator.errors.is_empty() {
            Ok(())
        } else {
            Err(validator.errors)
        }
    }

    fn collect_leaf_types(&mut self, tree: &IQTree) {
        if let IQTree::ExtensionalData(n) = tree {
            let relation = n.relation().as_str().to_string();
            match self.metadata.relation(n.relation()) {
                None => self
                    .errors
                    .push(SemanticValidationError::UnknownRelation { relation }),
                Some(definition) => {
                    for (position, term) in n.arguments() {
                        let Some(attribute) = definition.attribute(*position) else {
                            self.errors.push(SemanticValidationError::PositionOutOfBounds {
                                relation: relation.clone(),
                                position: *position,
                                arity: definition.arity(),
                            });
                            continue;
                        };
                        let attribute_type = TermType::Db(attribute.db_type);
                        match term {
                            ImmutableTerm::Variable(v) => {
                                self.types.entry(v.clone()).or_insert(attribute_type);
                            }
                            ImmutableTerm::Constant(c) => {
                                if let Some(t) = c.term_type() {
                                    if !t.is_comparable_with(&attribute_type) {
                                        self.errors.push(SemanticValidationError::TypeMismatch {
                                            message: format!(
                                                "{c} stored at {relation}.{}",
                                                attribute.name
                                            ),
                                        });
                                    }
                                }
                            }
                            ImmutableTerm::Functional(_) => {}
                        }
                    }
                }
            }
        }
        for child in tree.children() {
            self.collect_leaf_types(child);
        }
    }

    fn check_conditions(&mut self, tree: &IQTree) {
        let condition = match tree {
            IQTree::Filter { node, .. } => Some(node.condition()),
            IQTree::LeftJoin { node, .. } => node.condition(),
            IQTree::InnerJoin { node, .. } => node.condition(),
            _ => None,
        };
        if let Some(condition) = condition {
            self.check_condition(condition);
        }
        if let IQTree::Construction { node, .. } = tree {
            for (_, term) in node.substitution().iter() {
                let types = &self.types;
                if let Err(e) = term.infer_type_with(&|v| types.get(v).cloned()) {
                    self.errors.push(SemanticValidationError::TypeMismatch {
                        message: e.to_string(),
                    });
                }
            }
        }
        for child in tree.children() {
            self.check_conditions(child);
        }
    }

    fn check_condition(&mut self, condition: &ImmutableTerm) {
        let types = &self.types;
        match condition.infer_type_with(&|v| types.get(v).cloned()) {
            Ok(Some(t)) if !t.is_boolean() => {
                self.errors.push(SemanticValidationError::TypeMismatch {
                    message: format!("condition {condition} has type {t}"),
                });
            }
            Ok(_) => {}
            Err(e) => self.errors.push(SemanticValidationError::TypeMismatch {
                message: e.to_string(),
            }),
        }
    }
}
