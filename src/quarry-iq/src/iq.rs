//! A query: projection atom plus tree.

use std::fmt;

use common_error::{QuarryError, QuarryResult};
use quarry_core::{MetadataProvider, ProjectionAtom, VariableGenerator};
use serde::{Deserialize, Serialize};

use crate::node::IQTree;
use crate::validation::IQValidator;

/// An intermediate query.
///
/// The projection atom fixes the answer variables and their order. Every
/// rewrite produces a new `IQ` with the same projection atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IQ {
    projection: ProjectionAtom,
    tree: IQTree,
}

impl IQ {
    /// Create a query. Every answer variable must be projected by the tree.
    pub fn new(projection: ProjectionAtom, tree: IQTree) -> QuarryResult<Self> {
        let tree_vars = tree.variables();
        if let Some(missing) = projection.variables().iter().find(|v| !tree_vars.contains(*v)) {
            return Err(QuarryError::malformed(format!(
                "answer variable {missing} of {projection} is not projected by the tree"
            )));
        }
        Ok(Self { projection, tree })
    }

    pub fn projection(&self) -> &ProjectionAtom {
        &self.projection
    }

    pub fn tree(&self) -> &IQTree {
        &self.tree
    }

    pub fn into_tree(self) -> IQTree {
        self.tree
    }

    /// Same projection atom over another tree.
    pub fn with_tree(&self, tree: IQTree) -> QuarryResult<Self> {
        Self::new(self.projection.clone(), tree)
    }

    /// Whether the tree is an `Empty` leaf.
    pub fn is_declared_empty(&self) -> bool {
        self.tree.is_declared_empty()
    }

    /// Make the root a construction node projecting exactly the answer
    /// variables.
    pub fn normalize_for_optimization(self) -> QuarryResult<Self> {
        let answer = self.projection.variable_set();
        match &self.tree {
            IQTree::Construction { node, .. } if *node.projected() == answer => Ok(self),
            _ => {
                let tree = IQTree::projection(answer, self.tree);
                Self::new(self.projection, tree)
            }
        }
    }

    /// Variable generator aware of every variable of the query.
    pub fn variable_generator(&self) -> VariableGenerator {
        let mut generator = VariableGenerator::new(self.tree.all_variables());
        generator.register(self.projection.variables().iter().cloned());
        generator
    }

    /// Check structural invariants.
    pub fn validate(&self) -> QuarryResult<()> {
        IQValidator::new().validate(self)
    }

    /// Check structural invariants and the relations against `metadata`.
    pub fn validate_with_metadata(&self, metadata: &dyn MetadataProvider) -> QuarryResult<()> {
        IQValidator::new().with_metadata(metadata).validate(self)
    }

    /// Projection atom followed by the indented tree.
    pub fn explain(&self) -> String {
        format!("{}\n{}", self.projection, self.tree.explain())
    }
}

impl fmt::Display for IQ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.explain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::term::var;
    use quarry_core::Variable;

    fn answer(names: &[&str]) -> ProjectionAtom {
        ProjectionAtom::new("ans", names.iter().map(|n| Variable::new(*n)).collect()).unwrap()
    }

    #[test]
    fn test_new_rejects_unprojected_answer() {
        let tree = IQTree::extensional("T1", [(0, var("a"))]).unwrap();
        assert!(IQ::new(answer(&["a", "b"]), tree.clone()).is_err());
        assert!(IQ::new(answer(&["a"]), tree).is_ok());
    }

    #[test]
    fn test_normalize_adds_root_construction() {
        let tree = IQTree::extensional("T1", [(0, var("a")), (1, var("b"))]).unwrap();
        let iq = IQ::new(answer(&["a"]), tree).unwrap().normalize_for_optimization().unwrap();
        let IQTree::Construction { node, .. } = iq.tree() else {
            panic!("expected a construction root");
        };
        assert_eq!(node.projected().len(), 1);

        let again = iq.clone().normalize_for_optimization().unwrap();
        assert_eq!(again, iq);
    }

    #[test]
    fn test_explain_starts_with_projection() {
        let tree = IQTree::extensional("T1", [(0, var("a"))]).unwrap();
        let iq = IQ::new(answer(&["a"]), tree).unwrap();
        assert!(iq.explain().starts_with("ans(a)\nEXTENSIONAL T1{0:a}"));
    }

    #[test]
    fn test_variable_generator_avoids_tree_variables() {
        let tree = IQTree::extensional("T1", [(0, var("f0")), (1, var("a"))]).unwrap();
        let iq = IQ::new(answer(&["a"]), tree).unwrap();
        let mut generator = iq.variable_generator();
        assert_eq!(generator.generate_new_variable(), Variable::new("f1"));
    }
}
