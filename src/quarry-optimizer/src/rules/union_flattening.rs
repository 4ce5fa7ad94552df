//! Union flattening rule.

use common_error::QuarryResult;
use quarry_iq::transform::IQTreeTransformer;
use quarry_iq::{IQTree, UnionNode, IQ};

use super::rule::{OptimizationRule, Transformed};
use super::sweep_to_fixed_point;
use crate::context::OptimizationContext;

/// Union flattening rule.
///
/// Merges a union of unions into one n-ary union, drops `EMPTY` branches and
/// collapses a union left with a single branch.
pub struct UnionFlattening;

impl OptimizationRule for UnionFlattening {
    fn name(&self) -> &'static str {
        "UnionFlattening"
    }

    fn description(&self) -> &'static str {
        "Merge nested unions and remove empty branches"
    }

    fn apply(&self, iq: IQ, context: &mut OptimizationContext<'_>) -> QuarryResult<Transformed> {
        sweep_to_fixed_point(self.name(), iq, context, |tree, _| Flattener.transform(tree))
    }
}

struct Flattener;

impl IQTreeTransformer for Flattener {
    fn transform_union(&mut self, node: UnionNode, children: Vec<IQTree>) -> QuarryResult<IQTree> {
        let mut branches = Vec::with_capacity(children.len());
        for child in self.transform_all(children)? {
            match child {
                IQTree::Union {
                    node: inner,
                    children,
                } if inner.projected() == node.projected() => branches.extend(children),
                IQTree::Empty(_) => {}
                other => branches.push(other),
            }
        }
        Ok(match branches.len() {
            0 => IQTree::empty(node.projected().clone()),
            1 => {
                let branch = branches.remove(0);
                if branch.variables() == *node.projected() {
                    branch
                } else {
                    IQTree::projection(node.projected().clone(), branch)
                }
            }
            _ => IQTree::Union {
                node,
                children: branches,
            },
        })
    }
}
