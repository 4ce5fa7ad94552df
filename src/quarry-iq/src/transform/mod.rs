//! Structural transformation of query trees.
//!
//! An [`IQTreeTransformer`] dispatches on the node kind through one hook per
//! kind. The default hooks transform the children and rebuild the node, so
//! a rewrite only overrides the kinds it cares about:
//!
//! ```rust
//! use quarry_iq::transform::IQTreeTransformer;
//! use quarry_iq::{FilterNode, IQTree};
//! use common_error::QuarryResult;
//!
//! /// Drops every filter.
//! struct DropFilters;
//!
//! impl IQTreeTransformer for DropFilters {
//!     fn transform_filter(&mut self, _node: FilterNode, child: IQTree) -> QuarryResult<IQTree> {
//!         self.transform(child)
//!     }
//! }
//! ```
//!
//! Left-join children are never swapped, and the children of commutative
//! nodes keep their order.

mod adapters;

pub use adapters::{ChildTransformer, FnTransformer};

use common_error::QuarryResult;

use crate::node::{
    ConstructionNode, EmptyNode, ExtensionalDataNode, FilterNode, IQTree, InnerJoinNode,
    LeftJoinNode, NativeNode, UnionNode,
};

/// Rewrites a tree, one hook per node kind.
pub trait IQTreeTransformer {
    /// Transform a tree by dispatching on its kind.
    fn transform(&mut self, tree: IQTree) -> QuarryResult<IQTree> {
        match tree {
            IQTree::ExtensionalData(node) => self.transform_extensional(node),
            IQTree::Native(node) => self.transform_native(node),
            IQTree::Empty(node) => self.transform_empty(node),
            IQTree::True => self.transform_true(),
            IQTree::Construction { node, child } => self.transform_construction(node, *child),
            IQTree::Filter { node, child } => self.transform_filter(node, *child),
            IQTree::LeftJoin { node, left, right } => {
                self.transform_left_join(node, *left, *right)
            }
            IQTree::InnerJoin { node, children } => self.transform_inner_join(node, children),
            IQTree::Union { node, children } => self.transform_union(node, children),
        }
    }

    /// Transform every child of `tree` and rebuild the same operator.
    fn transform_children(&mut self, tree: IQTree) -> QuarryResult<IQTree> {
        tree.try_map_children(|child| self.transform(child))
    }

    fn transform_extensional(&mut self, node: ExtensionalDataNode) -> QuarryResult<IQTree> {
        Ok(IQTree::ExtensionalData(node))
    }

    fn transform_native(&mut self, node: NativeNode) -> QuarryResult<IQTree> {
        Ok(IQTree::Native(node))
    }

    fn transform_empty(&mut self, node: EmptyNode) -> QuarryResult<IQTree> {
        Ok(IQTree::Empty(node))
    }

    fn transform_true(&mut self) -> QuarryResult<IQTree> {
        Ok(IQTree::True)
    }

    fn transform_construction(
        &mut self,
        node: ConstructionNode,
        child: IQTree,
    ) -> QuarryResult<IQTree> {
        Ok(IQTree::Construction {
            node,
            child: Box::new(self.transform(child)?),
        })
    }

    fn transform_filter(&mut self, node: FilterNode, child: IQTree) -> QuarryResult<IQTree> {
        Ok(IQTree::Filter {
            node,
            child: Box::new(self.transform(child)?),
        })
    }

    fn transform_left_join(
        &mut self,
        node: LeftJoinNode,
        left: IQTree,
        right: IQTree,
    ) -> QuarryResult<IQTree> {
        let left = self.transform(left)?;
        let right = self.transform(right)?;
        Ok(IQTree::LeftJoin {
            node,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn transform_inner_join(
        &mut self,
        node: InnerJoinNode,
        children: Vec<IQTree>,
    ) -> QuarryResult<IQTree> {
        Ok(IQTree::InnerJoin {
            node,
            children: self.transform_all(children)?,
        })
    }

    fn transform_union(&mut self, node: UnionNode, children: Vec<IQTree>) -> QuarryResult<IQTree> {
        Ok(IQTree::Union {
            node,
            children: self.transform_all(children)?,
        })
    }

    /// Transform a list of siblings, keeping their order.
    fn transform_all(&mut self, children: Vec<IQTree>) -> QuarryResult<Vec<IQTree>> {
        children.into_iter().map(|c| self.transform(c)).collect()
    }
}
