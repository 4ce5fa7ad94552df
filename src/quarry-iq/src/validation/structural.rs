//! Structural validation of query trees.
//!
//! Checks that do not need metadata:
//! - operator arity
//! - variable scoping of conditions and substitutions
//! - union branch projections

use std::collections::BTreeSet;
use std::fmt;

use quarry_core::{ImmutableTerm, Variable};

use crate::node::{ConstructionNode, IQTree};

/// A structural validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralValidationError {
    /// An operator has too few children.
    InvalidArity {
        /// The operator name.
        operator: &'static str,
        /// Minimum number of children.
        expected: usize,
        /// Actual number of children.
        actual: usize,
    },

    /// A variable is used where it is not in scope.
    UnboundVariable {
        /// The operator name.
        operator: &'static str,
        /// The variable.
        variable: Variable,
    },

    /// A construction node defines a variable its child already projects.
    RedefinedVariable {
        /// The variable.
        variable: Variable,
    },

    /// A construction node is ill-formed (domain, idempotence).
    InvalidConstruction {
        /// Description of the issue.
        message: String,
    },

    /// A union branch projects other variables than the union.
    UnionProjectionMismatch {
        /// Index of the branch.
        branch: usize,
        /// Variables projected by the union.
        expected: BTreeSet<Variable>,
        /// Variables projected by the branch.
        actual: BTreeSet<Variable>,
    },

    /// An extensional node holds a functional term.
    FunctionalArgument {
        /// The node.
        node: String,
    },

    /// The root does not project the answer variables.
    RootProjectionMismatch {
        /// The answer variables.
        expected: BTreeSet<Variable>,
        /// Variables projected by the root.
        actual: BTreeSet<Variable>,
    },
}

fn names(vars: &BTreeSet<Variable>) -> String {
    vars.iter().map(Variable::name).collect::<Vec<_>>().join(",")
}

impl fmt::Display for StructuralValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArity {
                operator,
                expected,
                actual,
            } => write!(
                f,
                "{operator} expects at least {expected} children, got {actual}"
            ),
            Self::UnboundVariable { operator, variable } => {
                write!(f, "{operator} uses {variable}, which its children do not project")
            }
            Self::RedefinedVariable { variable } => {
                write!(f, "construction redefines {variable}, already projected by its child")
            }
            Self::InvalidConstruction { message } => write!(f, "invalid construction: {message}"),
            Self::UnionProjectionMismatch {
                branch,
                expected,
                actual,
            } => write!(
                f,
                "union branch {branch} projects [{}] instead of [{}]",
                names(actual),
                names(expected)
            ),
            Self::FunctionalArgument { node } => {
                write!(f, "extensional node {node} holds a functional term")
            }
            Self::RootProjectionMismatch { expected, actual } => write!(
                f,
                "root projects [{}] instead of the answer variables [{}]",
                names(actual),
                names(expected)
            ),
        }
    }
}

impl std::error::Error for StructuralValidationError {}

/// Structural validator for query trees.
pub struct StructuralValidator;

impl StructuralValidator {
    /// Validate a tree, collecting every error.
    pub fn validate(tree: &IQTree) -> Result<(), Vec<StructuralValidationError>> {
        let mut errors = Vec::new();
        Self::validate_node(tree, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_node(tree: &IQTree, errors: &mut Vec<StructuralValidationError>) {
        match tree {
            IQTree::ExtensionalData(n) => {
                if n
                    .arguments()
                    .values()
                    .any(|t| matches!(t, ImmutableTerm::Functional(_)))
                {
                    errors.push(StructuralValidationError::FunctionalArgument {
                        node: n.to_string(),
                    });
                }
            }
            IQTree::Native(_) | IQTree::Empty(_) | IQTree::True => {}
            IQTree::Construction { node, child } => {
                Self::validate_construction(node, &child.variables(), errors);
            }
            IQTree::Filter { node, child } => {
                Self::check_scope("FILTER", Some(node.condition()), &child.variables(), errors);
            }
            IQTree::LeftJoin { node, .. } => {
                Self::check_scope("LJ", node.condition(), &tree.variables(), errors);
            }
            IQTree::InnerJoin { node, children } => {
                Self::check_arity("JOIN", 2, children.len(), errors);
                Self::check_scope("JOIN", node.condition(), &tree.variables(), errors);
            }
            IQTree::Union { node, children } => {
                Self::check_arity("UNION", 2, children.len(), errors);
                for (branch, child) in children.iter().enumerate() {
                    let actual = child.variables();
                    if &actual != node.projected() {
                        errors.push(StructuralValidationError::UnionProjectionMismatch {
                            branch,
                            expected: node.projected().clone(),
                            actual,
                        });
                    }
                }
            }
        }
        for child in tree.children() {
            Self::validate_node(child, errors);
        }
    }

    fn validate_construction(
        node: &ConstructionNode,
        child_vars: &BTreeSet<Variable>,
        errors: &mut Vec<StructuralValidationError>,
    ) {
        let substitution = node.substitution();
        if !substitution.is_idempotent() {
            errors.push(StructuralValidationError::InvalidConstruction {
                message: format!("{substitution} is not idempotent"),
            });
        }
        for v in substitution.domain() {
            if !node.projected().contains(&v) {
                errors.push(StructuralValidationError::InvalidConstruction {
                    message: format!("{v} is defined but not projected"),
                });
            }
            if child_vars.contains(&v) {
                errors.push(StructuralValidationError::RedefinedVariable { variable: v });
            }
        }
        for variable in node.child_variables() {
            if !child_vars.contains(&variable) {
                errors.push(StructuralValidationError::UnboundVariable {
                    operator: "CONSTRUCT",
                    variable,
                });
            }
        }
    }

    fn check_arity(
        operator: &'static str,
        expected: usize,
        actual: usize,
        errors: &mut Vec<StructuralValidationError>,
    ) {
        if actual < expected {
            errors.push(StructuralValidationError::InvalidArity {
                operator,
                expected,
                actual,
            });
        }
    }

    fn check_scope(
        operator: &'static str,
        condition: Option<&ImmutableTerm>,
        scope: &BTreeSet<Variable>,
        errors: &mut Vec<StructuralValidationError>,
    ) {
        let Some(condition) = condition else {
            return;
        };
        for variable in condition.variables() {
            if !scope.contains(&variable) {
                errors.push(StructuralValidationError::UnboundVariable { operator, variable });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::term::{is_not_null, var};
    use quarry_core::Substitution;

    fn leaf(name: &str) -> IQTree {
        IQTree::extensional("T1", [(0, var(name))]).unwrap()
    }

    #[test]
    fn test_valid_tree() {
        let tree = IQTree::filter(
            is_not_null(var("a")),
            IQTree::inner_join(vec![leaf("a"), leaf("b")]),
        );
        assert!(StructuralValidator::validate(&tree).is_ok());
    }

    #[test]
    fn test_unbound_filter_variable() {
        let tree = IQTree::filter(is_not_null(var("z")), leaf("a"));
        let errors = StructuralValidator::validate(&tree).unwrap_err();
        assert_eq!(
            errors,
            vec![StructuralValidationError::UnboundVariable {
                operator: "FILTER",
                variable: Variable::new("z"),
            }]
        );
    }

    #[test]
    fn test_join_arity_and_union_branches() {
        let join = IQTree::inner_join(vec![leaf("a")]);
        assert!(StructuralValidator::validate(&join).is_err());

        let union = IQTree::union(
            BTreeSet::from([Variable::new("a")]),
            vec![leaf("a"), leaf("b")],
        );
        let errors = StructuralValidator::validate(&union).unwrap_err();
        assert!(matches!(
            errors[0],
            StructuralValidationError::UnionProjectionMismatch { branch: 1, .. }
        ));
    }

    #[test]
    fn test_construction_redefinition() {
        let tree = IQTree::construction(
            BTreeSet::from([Variable::new("a")]),
            Substitution::singleton(Variable::new("a"), var("b")),
            IQTree::inner_join(vec![leaf("a"), leaf("b")]),
        )
        .unwrap();
        let errors = StructuralValidator::validate(&tree).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, StructuralValidationError::RedefinedVariable { .. })));
        assert!(errors[0].to_string().contains("redefines a"));
    }
}
