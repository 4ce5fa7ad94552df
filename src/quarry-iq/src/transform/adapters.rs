//! Ready-made transformers.

use common_error::QuarryResult;

use super::IQTreeTransformer;
use crate::node::IQTree;

/// Applies an inner transformer to each child independently and rebuilds
/// the same operator around the results. The node itself is untouched.
#[derive(Debug)]
pub struct ChildTransformer<T> {
    inner: T,
}

impl<T: IQTreeTransformer> ChildTransformer<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: IQTreeTransformer> IQTreeTransformer for ChildTransformer<T> {
    fn transform(&mut self, tree: IQTree) -> QuarryResult<IQTree> {
        tree.try_map_children(|child| self.inner.transform(child))
    }
}

/// Bottom-up rewrite driven by a closure: children first, then the node.
pub struct FnTransformer<F> {
    rewrite: F,
}

impl<F> FnTransformer<F>
where
    F: FnMut(IQTree) -> QuarryResult<IQTree>,
{
    pub fn new(rewrite: F) -> Self {
        Self { rewrite }
    }
}

impl<F> IQTreeTransformer for FnTransformer<F>
where
    F: FnMut(IQTree) -> QuarryResult<IQTree>,
{
    fn transform(&mut self, tree: IQTree) -> QuarryResult<IQTree> {
        let rebuilt = tree.try_map_children(|child| self.transform(child))?;
        (self.rewrite)(rebuilt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::term::{boolean, var};

    fn leaf(name: &str) -> IQTree {
        IQTree::extensional("T1", [(0, var(name))]).unwrap()
    }

    #[test]
    fn test_fn_transformer_is_bottom_up() {
        let tree = IQTree::filter(boolean(true), IQTree::filter(boolean(true), leaf("a")));
        let mut visited = Vec::new();
        let out = FnTransformer::new(|t: IQTree| {
            visited.push(t.kind_name());
            Ok(match t {
                IQTree::Filter { node, child } if node.condition().is_true() => *child,
                other => other,
            })
        })
        .transform(tree)
        .unwrap();
        assert_eq!(out, leaf("a"));
        assert_eq!(visited, vec!["EXTENSIONAL", "FILTER", "FILTER"]);
    }

    #[test]
    fn test_child_transformer_skips_root() {
        let drop_true_filters = FnTransformer::new(|t: IQTree| {
            Ok(match t {
                IQTree::Filter { node, child } if node.condition().is_true() => *child,
                other => other,
            })
        });
        let tree = IQTree::filter(boolean(true), IQTree::filter(boolean(true), leaf("a")));
        let out = ChildTransformer::new(drop_true_filters).transform(tree).unwrap();
        assert_eq!(out, IQTree::filter(boolean(true), leaf("a")));
    }
}
