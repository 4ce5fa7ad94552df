//! Unary, binary and n-ary operator nodes.

use std::collections::BTreeSet;
use std::fmt;

use common_error::{QuarryError, QuarryResult};
use quarry_core::{ImmutableTerm, Substitution, Variable};
use serde::{Deserialize, Serialize};

/// Projects a set of variables, some of them defined by a substitution over
/// the variables of the child.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructionNode {
    projected: BTreeSet<Variable>,
    substitution: Substitution,
}

impl ConstructionNode {
    /// Create a construction node.
    ///
    /// The substitution domain must be projected, and no domain variable may
    /// occur in the range.
    pub fn new(projected: BTreeSet<Variable>, substitution: Substitution) -> QuarryResult<Self> {
        if let Some(v) = substitution.domain().iter().find(|v| !projected.contains(*v)) {
            return Err(QuarryError::malformed(format!(
                "construction defines {v} without projecting it"
            )));
        }
        common_error::ensure!(
            substitution.is_idempotent(),
            MalformedTree: "construction substitution {substitution} is not idempotent"
        );
        Ok(Self {
            projected,
            substitution,
        })
    }

    /// Pure projection.
    pub fn projection(projected: BTreeSet<Variable>) -> Self {
        Self {
            projected,
            substitution: Substitution::new(),
        }
    }

    pub fn projected(&self) -> &BTreeSet<Variable> {
        &self.projected
    }

    pub fn substitution(&self) -> &Substitution {
        &self.substitution
    }

    /// Variables this node reads from its child.
    pub fn child_variables(&self) -> BTreeSet<Variable> {
        let domain = self.substitution.domain();
        let mut vars: BTreeSet<Variable> = self.projected.difference(&domain).cloned().collect();
        vars.extend(self.substitution.range_variables());
        vars
    }

    /// Whether the node neither defines nor drops variables of `child_vars`.
    pub fn is_identity_over(&self, child_vars: &BTreeSet<Variable>) -> bool {
        self.substitution.is_empty() && &self.projected == child_vars
    }
}

impl fmt::Display for ConstructionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vars: Vec<&str> = self.projected.iter().map(Variable::name).collect();
        write!(f, "[{}]", vars.join(","))?;
        if !self.substitution.is_empty() {
            write!(f, " {}", self.substitution)?;
        }
        Ok(())
    }
}

/// Keeps the tuples satisfying a condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterNode {
    condition: ImmutableTerm,
}

impl FilterNode {
    pub fn new(condition: ImmutableTerm) -> Self {
        Self { condition }
    }

    pub fn condition(&self) -> &ImmutableTerm {
        &self.condition
    }
}

/// N-ary inner join: natural join on shared variables plus an optional
/// condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InnerJoinNode {
    condition: Option<ImmutableTerm>,
}

impl InnerJoinNode {
    pub fn new(condition: Option<ImmutableTerm>) -> Self {
        Self { condition }
    }

    pub fn condition(&self) -> Option<&ImmutableTerm> {
        self.condition.as_ref()
    }
}

/// Left outer join: natural join on shared variables plus an optional
/// condition evaluated on matching pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeftJoinNode {
    condition: Option<ImmutableTerm>,
}

impl LeftJoinNode {
    pub fn new(condition: Option<ImmutableTerm>) -> Self {
        Self { condition }
    }

    pub fn condition(&self) -> Option<&ImmutableTerm> {
        self.condition.as_ref()
    }
}

/// Bag union of children projecting the same variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnionNode {
    projected: BTreeSet<Variable>,
}

impl UnionNode {
    pub fn new(projected: BTreeSet<Variable>) -> Self {
        Self { projected }
    }

    pub fn projected(&self) -> &BTreeSet<Variable> {
        &self.projected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::term::{int, var};

    fn vars(names: &[&str]) -> BTreeSet<Variable> {
        names.iter().map(|n| Variable::new(*n)).collect()
    }

    #[test]
    fn test_construction_checks() {
        let s = Substitution::singleton(Variable::new("g"), var("gf1"));
        assert!(ConstructionNode::new(vars(&["a"]), s.clone()).is_err());
        let node = ConstructionNode::new(vars(&["a", "g"]), s).unwrap();
        assert_eq!(node.child_variables(), vars(&["a", "gf1"]));
        assert_eq!(node.to_string(), "[a,g] {g/gf1}");

        let cyclic = Substitution::singleton(Variable::new("g"), var("g"));
        // Identity bindings are dropped, so this is a plain projection.
        assert!(ConstructionNode::new(vars(&["g"]), cyclic).unwrap().substitution().is_empty());
    }

    #[test]
    fn test_construction_rejects_non_idempotent() {
        let s = Substitution::from_pairs(vec![
            (Variable::new("a"), var("b")),
            (Variable::new("b"), int(1)),
        ]);
        assert!(ConstructionNode::new(vars(&["a", "b"]), s).is_err());
    }

    #[test]
    fn test_identity_projection() {
        let node = ConstructionNode::projection(vars(&["a", "b"]));
        assert!(node.is_identity_over(&vars(&["a", "b"])));
        assert!(!node.is_identity_over(&vars(&["a", "b", "c"])));
    }
}
