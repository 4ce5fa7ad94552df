//! Boolean push-up rule.

use common_error::QuarryResult;
use quarry_core::term::{and_optional, conjunction};
use quarry_iq::transform::IQTreeTransformer;
use quarry_iq::{FilterNode, IQTree, InnerJoinNode, LeftJoinNode, IQ};

use super::rule::{OptimizationRule, Transformed};
use super::sweep_to_fixed_point;
use crate::context::OptimizationContext;

/// Boolean push-up rule.
///
/// # Rewrites
///
/// - adjacent filters merge into one conjunction
/// - filters on inner-join children and above an inner join move into the
///   join condition
/// - a filter on the left of a left join moves above the left join
/// - a filter on the right of a left join moves into the left-join condition
///
/// Conditions never cross construction or union nodes.
pub struct BooleanPushUp;

impl OptimizationRule for BooleanPushUp {
    fn name(&self) -> &'static str {
        "BooleanPushUp"
    }

    fn description(&self) -> &'static str {
        "Move filter conditions into join conditions and toward the root"
    }

    fn apply(&self, iq: IQ, context: &mut OptimizationContext<'_>) -> QuarryResult<Transformed> {
        sweep_to_fixed_point(self.name(), iq, context, |tree, _| PushUp.transform(tree))
    }
}

struct PushUp;

impl IQTreeTransformer for PushUp {
    fn transform_filter(&mut self, node: FilterNode, child: IQTree) -> QuarryResult<IQTree> {
        Ok(match self.transform(child)? {
            IQTree::Filter {
                node: inner,
                child: grandchild,
            } => IQTree::filter_or_simpler(
                conjunction([inner.condition().clone(), node.condition().clone()]),
                *grandchild,
            ),
            IQTree::InnerJoin {
                node: join,
                children,
            } => IQTree::inner_join_with(
                and_optional(join.condition(), [node.condition().clone()]),
                children,
            ),
            child => IQTree::Filter {
                node,
                child: Box::new(child),
            },
        })
    }

    fn transform_inner_join(
        &mut self,
        node: InnerJoinNode,
        children: Vec<IQTree>,
    ) -> QuarryResult<IQTree> {
        let mut lifted = Vec::new();
        let children = self
            .transform_all(children)?
            .into_iter()
            .map(|child| match child {
                IQTree::Filter { node, child } => {
                    lifted.push(node.condition().clone());
                    *child
                }
                other => other,
            })
            .collect();
        if lifted.is_empty() {
            return Ok(IQTree::InnerJoin { node, children });
        }
        Ok(IQTree::inner_join_with(
            and_optional(node.condition(), lifted),
            children,
        ))
    }

    fn transform_left_join(
        &mut self,
        node: LeftJoinNode,
        left: IQTree,
        right: IQTree,
    ) -> QuarryResult<IQTree> {
        let (left_condition, left) = match self.transform(left)? {
            IQTree::Filter { node, child } => (Some(node.condition().clone()), *child),
            other => (None, other),
        };
        let (right_conditions, right) = match self.transform(right)? {
            IQTree::Filter { node, child } => (vec![node.condition().clone()], *child),
            other => (Vec::new(), other),
        };
        let condition = if right_conditions.is_empty() {
            node.condition().cloned()
        } else {
            and_optional(node.condition(), right_conditions)
        };
        Ok(IQTree::filter_or_simpler(
            left_condition,
            IQTree::left_join_with(condition, left, right),
        ))
    }
}
