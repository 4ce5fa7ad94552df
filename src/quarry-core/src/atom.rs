//! Data and projection atoms.

use std::collections::BTreeSet;
use std::fmt;

use common_error::{QuarryError, QuarryResult};
use serde::{Deserialize, Serialize};

use crate::metadata::RelationId;
use crate::substitution::Substitution;
use crate::term::{ImmutableTerm, Variable};

/// A relation applied to ordered argument terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataAtom {
    relation: RelationId,
    arguments: Vec<ImmutableTerm>,
}

impl DataAtom {
    pub fn new(relation: impl Into<RelationId>, arguments: Vec<ImmutableTerm>) -> Self {
        Self {
            relation: relation.into(),
            arguments,
        }
    }

    pub fn relation(&self) -> &RelationId {
        &self.relation
    }

    pub fn arguments(&self) -> &[ImmutableTerm] {
        &self.arguments
    }

    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    /// Variables occurring in the arguments.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut vars = BTreeSet::new();
        self.arguments.iter().for_each(|a| a.collect_variables(&mut vars));
        vars
    }

    /// Apply a substitution to every argument.
    #[must_use]
    pub fn apply(&self, substitution: &Substitution) -> Self {
        Self {
            relation: self.relation.clone(),
            arguments: self.arguments.iter().map(|a| a.apply(substitution)).collect(),
        }
    }
}

impl fmt::Display for DataAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.arguments.iter().map(ToString::to_string).collect();
        write!(f, "{}({})", self.relation, args.join(","))
    }
}

/// Answer predicate with its ordered, distinct answer variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectionAtom {
    predicate: String,
    variables: Vec<Variable>,
}

impl ProjectionAtom {
    /// Create a projection atom; repeated variables are rejected.
    pub fn new(predicate: impl Into<String>, variables: Vec<Variable>) -> QuarryResult<Self> {
        let mut seen = BTreeSet::new();
        if let Some(dup) = variables.iter().find(|v| !seen.insert(*v)) {
            return Err(QuarryError::invalid_parameter(format!(
                "answer variable {dup} occurs twice in the projection atom"
            )));
        }
        Ok(Self {
            predicate: predicate.into(),
            variables,
        })
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable_set(&self) -> BTreeSet<Variable> {
        self.variables.iter().cloned().collect()
    }

    pub fn arity(&self) -> usize {
        self.variables.len()
    }
}

impl fmt::Display for ProjectionAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vars: Vec<&str> = self.variables.iter().map(Variable::name).collect();
        write!(f, "{}({})", self.predicate, vars.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{int, var};

    #[test]
    fn test_data_atom_apply() {
        let atom = DataAtom::new("R", vec![var("x"), int(2), var("g")]);
        let s = Substitution::singleton(Variable::new("g"), var("gf1"));
        assert_eq!(atom.apply(&s).to_string(), "R(x,2,gf1)");
        assert_eq!(atom.variables().len(), 2);
    }

    #[test]
    fn test_projection_atom_distinct() {
        let ok = ProjectionAtom::new("ans", vec![Variable::new("x"), Variable::new("y")]).unwrap();
        assert_eq!(ok.to_string(), "ans(x,y)");
        assert!(ProjectionAtom::new("ans", vec![Variable::new("x"), Variable::new("x")]).is_err());
    }
}
