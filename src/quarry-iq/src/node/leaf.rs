//! Leaf nodes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use common_error::{QuarryError, QuarryResult};
use quarry_core::{DataAtom, ImmutableTerm, RelationId, Variable};
use serde::{Deserialize, Serialize};

/// Occurrence of a relation, with terms at some of its positions.
///
/// Positions absent from the map are not accessed. Terms are variables or
/// constants. The variable set is computed once, at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ExtensionalDataRepr", into = "ExtensionalDataRepr")]
pub struct ExtensionalDataNode {
    relation: RelationId,
    arguments: BTreeMap<usize, ImmutableTerm>,
    variables: BTreeSet<Variable>,
}

#[derive(Clone, Serialize, Deserialize)]
struct ExtensionalDataRepr {
    relation: RelationId,
    arguments: BTreeMap<usize, ImmutableTerm>,
}

impl TryFrom<ExtensionalDataRepr> for ExtensionalDataNode {
    type Error = QuarryError;

    fn try_from(repr: ExtensionalDataRepr) -> QuarryResult<Self> {
        Self::new(repr.relation, repr.arguments)
    }
}

impl From<ExtensionalDataNode> for ExtensionalDataRepr {
    fn from(node: ExtensionalDataNode) -> Self {
        Self {
            relation: node.relation,
            arguments: node.arguments,
        }
    }
}

impl ExtensionalDataNode {
    /// Create a node; functional terms are rejected.
    pub fn new(
        relation: impl Into<RelationId>,
        arguments: BTreeMap<usize, ImmutableTerm>,
    ) -> QuarryResult<Self> {
        let relation = relation.into();
        if let Some((pos, term)) = arguments
            .iter()
            .find(|(_, t)| matches!(t, ImmutableTerm::Functional(_)))
        {
            return Err(QuarryError::malformed(format!(
                "{relation}: position {pos} holds the functional term {term}"
            )));
        }
        let variables = arguments
            .values()
            .filter_map(ImmutableTerm::as_variable)
            .cloned()
            .collect();
        Ok(Self {
            relation,
            arguments,
            variables,
        })
    }

    /// Node for a data atom, positions numbered from 0.
    pub fn from_atom(atom: &DataAtom) -> QuarryResult<Self> {
        Self::new(
            atom.relation().clone(),
            atom.arguments().iter().cloned().enumerate().collect(),
        )
    }

    pub fn relation(&self) -> &RelationId {
        &self.relation
    }

    pub fn arguments(&self) -> &BTreeMap<usize, ImmutableTerm> {
        &self.arguments
    }

    pub fn argument(&self, position: usize) -> Option<&ImmutableTerm> {
        self.arguments.get(&position)
    }

    pub fn variables(&self) -> &BTreeSet<Variable> {
        &self.variables
    }

    /// Positions where `variable` occurs.
    pub fn positions_of(&self, variable: &Variable) -> Vec<usize> {
        self.arguments
            .iter()
            .filter(|(_, t)| t.as_variable() == Some(variable))
            .map(|(p, _)| *p)
            .collect()
    }

    /// Same relation with other arguments.
    pub fn with_arguments(&self, arguments: BTreeMap<usize, ImmutableTerm>) -> QuarryResult<Self> {
        Self::new(self.relation.clone(), arguments)
    }
}

impl fmt::Display for ExtensionalDataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self
            .arguments
            .iter()
            .map(|(p, t)| format!("{p}:{t}"))
            .collect();
        write!(f, "{}{{{}}}", self.relation, args.join(","))
    }
}

/// A leaf holding SQL ready for execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeNode {
    sql: String,
    signature: Vec<Variable>,
}

impl NativeNode {
    /// Create a native node; the signature lists the output columns in order.
    pub fn new(sql: impl Into<String>, signature: Vec<Variable>) -> QuarryResult<Self> {
        let mut seen = BTreeSet::new();
        if let Some(dup) = signature.iter().find(|v| !seen.insert(*v)) {
            return Err(QuarryError::malformed(format!(
                "native node signature repeats {dup}"
            )));
        }
        Ok(Self {
            sql: sql.into(),
            signature,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn signature(&self) -> &[Variable] {
        &self.signature
    }

    pub fn variables(&self) -> BTreeSet<Variable> {
        self.signature.iter().cloned().collect()
    }
}

/// A leaf producing no tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmptyNode {
    variables: BTreeSet<Variable>,
}

impl EmptyNode {
    pub fn new(variables: BTreeSet<Variable>) -> Self {
        Self { variables }
    }

    pub fn variables(&self) -> &BTreeSet<Variable> {
        &self.variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::term::{int, var};

    #[test]
    fn test_extensional_variables() {
        let node = ExtensionalDataNode::new(
            "T1",
            BTreeMap::from([(0, var("a")), (1, int(2)), (2, var("a"))]),
        )
        .unwrap();
        assert_eq!(node.variables().len(), 1);
        assert_eq!(node.positions_of(&Variable::new("a")), vec![0, 2]);
        assert_eq!(node.to_string(), "T1{0:a,1:2,2:a}");
    }

    #[test]
    fn test_extensional_rejects_functional_terms() {
        let t = quarry_core::term::is_not_null(var("a"));
        assert!(ExtensionalDataNode::new("T1", BTreeMap::from([(0, t)])).is_err());
    }

    #[test]
    fn test_extensional_serde_recomputes_variables() {
        let node = ExtensionalDataNode::from_atom(&DataAtom::new("T1", vec![var("a"), var("b")])).unwrap();
        let json = serde_json::to_string(&node).unwrap();
        assert!(!json.contains("variables"));
        let back: ExtensionalDataNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_native_signature_distinct() {
        let a = Variable::new("a");
        assert!(NativeNode::new("SELECT 1", vec![a.clone(), a]).is_err());
    }
}
