//! The intermediate query tree.

mod leaf;
mod operator;

pub use leaf::{EmptyNode, ExtensionalDataNode, NativeNode};
pub use operator::{ConstructionNode, FilterNode, InnerJoinNode, LeftJoinNode, UnionNode};

use std::collections::BTreeSet;

use common_error::QuarryResult;
use quarry_core::Variable;
use serde::{Deserialize, Serialize};

/// An immutable query tree.
///
/// Trees are values: equality is structural and every rewrite builds a new
/// tree. Leaves carry their variables; the variables of operator nodes are
/// recomputed from their children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IQTree {
    /// Relation occurrence.
    ExtensionalData(ExtensionalDataNode),
    /// SQL ready for execution.
    Native(NativeNode),
    /// No tuple.
    Empty(EmptyNode),
    /// One empty tuple.
    True,
    /// Projection with variable definitions.
    Construction {
        node: ConstructionNode,
        child: Box<IQTree>,
    },
    /// Selection.
    Filter { node: FilterNode, child: Box<IQTree> },
    /// Left outer join; `left` and `right` never swap.
    LeftJoin {
        node: LeftJoinNode,
        left: Box<IQTree>,
        right: Box<IQTree>,
    },
    /// N-ary inner join.
    InnerJoin {
        node: InnerJoinNode,
        children: Vec<IQTree>,
    },
    /// N-ary bag union.
    Union {
        node: UnionNode,
        children: Vec<IQTree>,
    },
}

impl IQTree {
    /// Get the name of this node kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ExtensionalData(_) => "EXTENSIONAL",
            Self::Native(_) => "NATIVE",
            Self::Empty(_) => "EMPTY",
            Self::True => "TRUE",
            Self::Construction { .. } => "CONSTRUCT",
            Self::Filter { .. } => "FILTER",
            Self::LeftJoin { .. } => "LJ",
            Self::InnerJoin { .. } => "JOIN",
            Self::Union { .. } => "UNION",
        }
    }

    /// Variables projected by the tree.
    pub fn variables(&self) -> BTreeSet<Variable> {
        match self {
            Self::ExtensionalData(n) => n.variables().clone(),
            Self::Native(n) => n.variables(),
            Self::Empty(n) => n.variables().clone(),
            Self::True => BTreeSet::new(),
            Self::Construction { node, .. } => node.projected().clone(),
            Self::Filter { child, .. } => child.variables(),
            Self::LeftJoin { left, right, .. } => {
                let mut vars = left.variables();
                vars.extend(right.variables());
                vars
            }
            Self::InnerJoin { children, .. } => {
                children.iter().flat_map(IQTree::variables).collect()
            }
            Self::Union { node, .. } => node.projected().clone(),
        }
    }

    /// Every variable occurring anywhere in the tree, including variables
    /// that are not projected.
    pub fn all_variables(&self) -> BTreeSet<Variable> {
        let mut vars = BTreeSet::new();
        self.collect_all_variables(&mut vars);
        vars
    }

    fn collect_all_variables(&self, vars: &mut BTreeSet<Variable>) {
        match self {
            Self::Construction { node, .. } => {
                vars.extend(node.projected().iter().cloned());
                vars.extend(node.substitution().range_variables());
            }
            Self::Filter { node, .. } => node.condition().collect_variables(vars),
            Self::LeftJoin { node, .. } => {
                if let Some(c) = node.condition() {
                    c.collect_variables(vars);
                }
            }
            Self::InnerJoin { node, .. } => {
                if let Some(c) = node.condition() {
                    c.collect_variables(vars);
                }
            }
            _ => vars.extend(self.variables()),
        }
        for child in self.children() {
            child.collect_all_variables(vars);
        }
    }

    /// Children in order.
    pub fn children(&self) -> Vec<&IQTree> {
        match self {
            Self::ExtensionalData(_) | Self::Native(_) | Self::Empty(_) | Self::True => vec![],
            Self::Construction { child, .. } | Self::Filter { child, .. } => vec![&**child],
            Self::LeftJoin { left, right, .. } => vec![&**left, &**right],
            Self::InnerJoin { children, .. } | Self::Union { children, .. } => {
                children.iter().collect()
            }
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Self::ExtensionalData(_) | Self::Native(_) | Self::Empty(_) | Self::True
        )
    }

    /// Whether the tree is an `Empty` leaf.
    pub fn is_declared_empty(&self) -> bool {
        matches!(self, Self::Empty(_))
    }

    /// Rebuild the node with each child replaced by `f(child)`.
    pub fn try_map_children<F>(self, mut f: F) -> QuarryResult<Self>
    where
        F: FnMut(IQTree) -> QuarryResult<IQTree>,
    {
        Ok(match self {
            leaf @ (Self::ExtensionalData(_) | Self::Native(_) | Self::Empty(_) | Self::True) => {
                leaf
            }
            Self::Construction { node, child } => Self::Construction {
                node,
                child: Box::new(f(*child)?),
            },
            Self::Filter { node, child } => Self::Filter {
                node,
                child: Box::new(f(*child)?),
            },
            Self::LeftJoin { node, left, right } => {
                let left = f(*left)?;
                let right = f(*right)?;
                Self::LeftJoin {
                    node,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            Self::InnerJoin { node, children } => Self::InnerJoin {
                node,
                children: children.into_iter().map(&mut f).collect::<QuarryResult<_>>()?,
            },
            Self::Union { node, children } => Self::Union {
                node,
                children: children.into_iter().map(&mut f).collect::<QuarryResult<_>>()?,
            },
        })
    }

    /// Count the number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Get the maximum depth of the tree.
    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    /// Check if the tree contains a node satisfying `predicate`.
    pub fn contains_node<F>(&self, predicate: F) -> bool
    where
        F: Fn(&IQTree) -> bool,
    {
        fn check<F: Fn(&IQTree) -> bool>(tree: &IQTree, predicate: &F) -> bool {
            predicate(tree) || tree.children().iter().any(|c| check(c, predicate))
        }
        check(self, &predicate)
    }

    /// Extensional nodes of the tree, left to right.
    pub fn extensional_nodes(&self) -> Vec<&ExtensionalDataNode> {
        let mut out = Vec::new();
        fn collect<'a>(tree: &'a IQTree, out: &mut Vec<&'a ExtensionalDataNode>) {
            if let IQTree::ExtensionalData(n) = tree {
                out.push(n);
            }
            for child in tree.children() {
                collect(child, out);
            }
        }
        collect(self, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::term::{is_not_null, var};
    use quarry_core::Substitution;

    fn v(name: &str) -> Variable {
        Variable::new(name)
    }

    fn t1(args: &[(usize, &str)]) -> IQTree {
        IQTree::extensional("T1", args.iter().map(|(p, n)| (*p, var(n)))).unwrap()
    }

    #[test]
    fn test_variables_of_composites() {
        let join = IQTree::inner_join(vec![t1(&[(0, "a"), (1, "b")]), t1(&[(0, "a"), (2, "c")])]);
        assert_eq!(join.variables(), BTreeSet::from([v("a"), v("b"), v("c")]));

        let lj = IQTree::left_join(t1(&[(0, "a")]), t1(&[(0, "a"), (1, "g")]));
        assert_eq!(lj.variables(), BTreeSet::from([v("a"), v("g")]));

        let filter = IQTree::filter(is_not_null(var("a")), lj.clone());
        assert_eq!(filter.variables(), lj.variables());
        assert_eq!(filter.depth(), 3);
        assert_eq!(filter.node_count(), 4);
    }

    #[test]
    fn test_all_variables_includes_hidden() {
        let tree = IQTree::construction(
            BTreeSet::from([v("a"), v("g")]),
            Substitution::singleton(v("g"), var("gf1")),
            t1(&[(0, "a"), (2, "gf1")]),
        )
        .unwrap();
        assert_eq!(tree.variables(), BTreeSet::from([v("a"), v("g")]));
        assert!(tree.all_variables().contains(&v("gf1")));
    }

    #[test]
    fn test_try_map_children_preserves_order() {
        let tree = IQTree::left_join(t1(&[(0, "a")]), t1(&[(0, "b")]));
        let mapped = tree
            .try_map_children(|c| Ok(IQTree::filter(is_not_null(var("a")), c)))
            .unwrap();
        let IQTree::LeftJoin { left, right, .. } = &mapped else {
            panic!("expected a left join");
        };
        assert!(left.variables().contains(&v("a")));
        assert!(right.variables().contains(&v("b")));
        assert_eq!(mapped.extensional_nodes().len(), 2);
        assert!(mapped.contains_node(|n| matches!(n, IQTree::Filter { .. })));
        assert!(!IQTree::True.contains_node(|n| n.is_declared_empty()));
    }
}
