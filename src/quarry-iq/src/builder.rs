//! Constructors for query trees.
//!
//! Plain constructors build exactly the requested node. The `*_or_simpler`
//! helpers used by rewrites collapse degenerate shapes (a join with one
//! child, a filter on `TRUE`).

use std::collections::BTreeSet;

use common_error::QuarryResult;
use quarry_core::term::conjunction;
use quarry_core::{DataAtom, ImmutableTerm, Substitution, Variable};

use crate::node::{
    ConstructionNode, EmptyNode, ExtensionalDataNode, FilterNode, IQTree, InnerJoinNode,
    LeftJoinNode, NativeNode, UnionNode,
};

impl IQTree {
    /// Extensional node from `(position, term)` pairs.
    pub fn extensional(
        relation: &str,
        arguments: impl IntoIterator<Item = (usize, ImmutableTerm)>,
    ) -> QuarryResult<Self> {
        ExtensionalDataNode::new(relation, arguments.into_iter().collect()).map(Self::ExtensionalData)
    }

    /// Extensional node for a data atom.
    pub fn extensional_atom(atom: &DataAtom) -> QuarryResult<Self> {
        ExtensionalDataNode::from_atom(atom).map(Self::ExtensionalData)
    }

    /// Native leaf.
    pub fn native(sql: impl Into<String>, signature: Vec<Variable>) -> QuarryResult<Self> {
        NativeNode::new(sql, signature).map(Self::Native)
    }

    /// Empty leaf projecting `variables`.
    pub fn empty(variables: BTreeSet<Variable>) -> Self {
        Self::Empty(EmptyNode::new(variables))
    }

    /// Construction node.
    pub fn construction(
        projected: BTreeSet<Variable>,
        substitution: Substitution,
        child: IQTree,
    ) -> QuarryResult<Self> {
        Ok(Self::Construction {
            node: ConstructionNode::new(projected, substitution)?,
            child: Box::new(child),
        })
    }

    /// Pure projection of `child` on `projected`.
    pub fn projection(projected: BTreeSet<Variable>, child: IQTree) -> Self {
        Self::Construction {
            node: ConstructionNode::projection(projected),
            child: Box::new(child),
        }
    }

    /// Filter node.
    pub fn filter(condition: ImmutableTerm, child: IQTree) -> Self {
        Self::Filter {
            node: FilterNode::new(condition),
            child: Box::new(child),
        }
    }

    /// Inner join without condition.
    pub fn inner_join(children: Vec<IQTree>) -> Self {
        Self::inner_join_with(None, children)
    }

    /// Inner join with an optional condition.
    pub fn inner_join_with(condition: Option<ImmutableTerm>, children: Vec<IQTree>) -> Self {
        Self::InnerJoin {
            node: InnerJoinNode::new(condition),
            children,
        }
    }

    /// Left join without condition.
    pub fn left_join(left: IQTree, right: IQTree) -> Self {
        Self::left_join_with(None, left, right)
    }

    /// Left join with an optional condition.
    pub fn left_join_with(condition: Option<ImmutableTerm>, left: IQTree, right: IQTree) -> Self {
        Self::LeftJoin {
            node: LeftJoinNode::new(condition),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Union of children projecting `projected`.
    pub fn union(projected: BTreeSet<Variable>, children: Vec<IQTree>) -> Self {
        Self::Union {
            node: UnionNode::new(projected),
            children,
        }
    }

    /// Filter, or the child itself when there is no condition.
    pub fn filter_or_simpler(condition: Option<ImmutableTerm>, child: IQTree) -> Self {
        match condition {
            Some(c) if !c.is_true() => Self::filter(c, child),
            _ => child,
        }
    }

    /// Inner join that collapses when fewer than two children remain.
    pub fn inner_join_or_simpler(condition: Option<ImmutableTerm>, mut children: Vec<IQTree>) -> Self {
        match children.len() {
            0 => Self::filter_or_simpler(condition, Self::True),
            1 => Self::filter_or_simpler(condition, children.remove(0)),
            _ => Self::inner_join_with(condition, children),
        }
    }

    /// Construction node, or the child itself when it would be an identity.
    pub fn construction_or_simpler(
        projected: BTreeSet<Variable>,
        substitution: Substitution,
        child: IQTree,
    ) -> QuarryResult<Self> {
        if substitution.is_empty() && projected == child.variables() {
            return Ok(child);
        }
        Self::construction(projected, substitution, child)
    }

    /// Add conjuncts above the tree, merging into an existing filter.
    pub fn with_conjuncts(self, conjuncts: Vec<ImmutableTerm>) -> Self {
        if conjuncts.is_empty() {
            return self;
        }
        match self {
            Self::Filter { node, child } => {
                let merged = conjunction(std::iter::once(node.condition().clone()).chain(conjuncts));
                Self::filter_or_simpler(merged, *child)
            }
            other => Self::filter_or_simpler(conjunction(conjuncts), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::term::{boolean, is_not_null, var};

    fn leaf(name: &str) -> IQTree {
        IQTree::extensional("T1", [(0, var(name))]).unwrap()
    }

    #[test]
    fn test_join_or_simpler() {
        assert_eq!(IQTree::inner_join_or_simpler(None, vec![leaf("a")]), leaf("a"));
        assert_eq!(IQTree::inner_join_or_simpler(None, vec![]), IQTree::True);
        let filtered = IQTree::inner_join_or_simpler(Some(is_not_null(var("a"))), vec![leaf("a")]);
        assert!(matches!(filtered, IQTree::Filter { .. }));
        assert!(matches!(
            IQTree::inner_join_or_simpler(None, vec![leaf("a"), leaf("b")]),
            IQTree::InnerJoin { .. }
        ));
    }

    #[test]
    fn test_filter_or_simpler_drops_true() {
        assert_eq!(IQTree::filter_or_simpler(Some(boolean(true)), leaf("a")), leaf("a"));
    }

    #[test]
    fn test_with_conjuncts_merges() {
        let tree = IQTree::filter(is_not_null(var("a")), leaf("a"))
            .with_conjuncts(vec![is_not_null(var("b"))]);
        let IQTree::Filter { node, .. } = tree else {
            panic!("expected a filter");
        };
        assert_eq!(node.condition().conjuncts().len(), 2);
    }

    #[test]
    fn test_construction_or_simpler() {
        let projected = BTreeSet::from([Variable::new("a")]);
        let tree = IQTree::construction_or_simpler(projected, Substitution::new(), leaf("a")).unwrap();
        assert_eq!(tree, leaf("a"));
    }
}
