//! Validation of intermediate queries.
//!
//! # Validation Categories
//!
//! ## Structural Validation
//!
//! - Operator arity (joins and unions need two children)
//! - Scoping of conditions and construction substitutions
//! - Union branches projecting the union variables
//! - Root projecting exactly the answer variables
//!
//! ## Semantic Validation
//!
//! - Relation existence and argument positions
//! - Typing of conditions, bindings and constant arguments
//!
//! Violations surface as `MalformedTree`, except unknown relations
//! (`UnknownRelation`) and typing errors (`TypeError`).

mod semantic;
mod structural;

pub use semantic::{SemanticValidationError, SemanticValidator};
pub use structural::{StructuralValidationError, StructuralValidator};

use common_error::{QuarryError, QuarryResult};
use log::debug;
use quarry_core::MetadataProvider;

use crate::iq::IQ;

/// A validation error that can occur during query validation.
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Structural validation error.
    Structural(StructuralValidationError),
    /// Semantic validation error.
    Semantic(SemanticValidationError),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structural(e) => write!(f, "Structural error: {e}"),
            Self::Semantic(e) => write!(f, "Semantic error: {e}"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<StructuralValidationError> for ValidationError {
    fn from(e: StructuralValidationError) -> Self {
        Self::Structural(e)
    }
}

impl From<SemanticValidationError> for ValidationError {
    fn from(e: SemanticValidationError) -> Self {
        Self::Semantic(e)
    }
}

/// Combined validator; semantic checks run when metadata is supplied.
#[derive(Default)]
pub struct IQValidator<'a> {
    metadata: Option<&'a dyn MetadataProvider>,
}

impl<'a> IQValidator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also check the tree against relation metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: &'a dyn MetadataProvider) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Collect every validation error of the query.
    pub fn errors(&self, iq: &IQ) -> Vec<ValidationError> {
        let mut errors: Vec<ValidationError> = Vec::new();

        let expected = iq.projection().variable_set();
        let actual = iq.tree().variables();
        if expected != actual {
            errors.push(
                StructuralValidationError::RootProjectionMismatch { expected, actual }.into(),
            );
        }
        if let Err(structural) = StructuralValidator::validate(iq.tree()) {
            errors.extend(structural.into_iter().map(ValidationError::Structural));
        }
        if let Some(metadata) = self.metadata {
            if let Err(semantic) = SemanticValidator::validate(iq.tree(), metadata) {
                errors.extend(semantic.into_iter().map(ValidationError::Semantic));
            }
        }
        errors
    }

    /// Validate the query, reporting the most severe error kind.
    pub fn validate(&self, iq: &IQ) -> QuarryResult<()> {
        let errors = self.errors(iq);
        if errors.is_empty() {
            return Ok(());
        }
        debug!(
            "Validation found {} error(s) in:\n{}",
            errors.len(),
            iq.explain()
        );
        if let Some(ValidationError::Semantic(SemanticValidationError::UnknownRelation {
            relation,
        })) = errors.iter().find(|e| {
            matches!(
                e,
                ValidationError::Semantic(SemanticValidationError::UnknownRelation { .. })
            )
        }) {
            return Err(QuarryError::unknown_relation(relation.clone()));
        }
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let only_typing = errors.iter().all(|e| {
            matches!(
                e,
                ValidationError::Semantic(SemanticValidationError::TypeMismatch { .. })
            )
        });
        if only_typing {
            Err(QuarryError::type_error(message))
        } else {
            Err(QuarryError::malformed(message))
        }
    }
}

/// Validate the structure of a query.
pub fn validate_iq(iq: &IQ) -> QuarryResult<()> {
    IQValidator::new().validate(iq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IQTree;
    use quarry_core::term::{is_not_null, string, strict_eq, var};
    use quarry_core::testing::nullable_unique_metadata;
    use quarry_core::{EmptyMetadataProvider, ProjectionAtom, Variable};

    fn answer(names: &[&str]) -> ProjectionAtom {
        ProjectionAtom::new("ans", names.iter().map(|n| Variable::new(*n)).collect()).unwrap()
    }

    #[test]
    fn test_root_projection_must_match() {
        let tree = IQTree::extensional("TABLE1", [(0, var("a")), (1, var("b"))]).unwrap();
        let iq = IQ::new(answer(&["a"]), tree).unwrap();
        assert!(matches!(validate_iq(&iq), Err(QuarryError::MalformedTree(_))));
        let normalized = iq.normalize_for_optimization().unwrap();
        assert!(validate_iq(&normalized).is_ok());
    }

    #[test]
    fn test_error_kinds() {
        let tree = IQTree::filter(
            is_not_null(var("a")),
            IQTree::extensional("TABLE1", [(0, var("a"))]).unwrap(),
        );
        let iq = IQ::new(answer(&["a"]), tree).unwrap();
        assert!(iq.validate_with_metadata(&nullable_unique_metadata()).is_ok());
        assert!(matches!(
            iq.validate_with_metadata(&EmptyMetadataProvider),
            Err(QuarryError::UnknownRelation(r)) if r == "TABLE1"
        ));

        let ill_typed = IQ::new(
            answer(&["a"]),
            IQTree::filter(
                strict_eq(var("a"), string("x")),
                IQTree::extensional("TABLE1", [(0, var("a"))]).unwrap(),
            ),
        )
        .unwrap();
        assert!(matches!(
            ill_typed.validate_with_metadata(&nullable_unique_metadata()),
            Err(QuarryError::TypeError(_))
        ));
    }
}
