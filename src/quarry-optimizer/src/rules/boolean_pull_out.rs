//! Boolean pull-out rule.

use std::collections::BTreeSet;

use common_error::QuarryResult;
use quarry_core::term::{and_optional, strict_eq};
use quarry_core::{ImmutableTerm, Substitution, Variable};
use quarry_iq::transform::IQTreeTransformer;
use quarry_iq::{IQTree, InnerJoinNode, IQ};

use super::rule::{OptimizationRule, Transformed};
use super::sweep_to_fixed_point;
use crate::context::OptimizationContext;

/// Boolean pull-out rule.
///
/// When a construction child of an inner join binds a variable that a
/// sibling also projects, the binding cannot be lifted above the join. The
/// sibling's occurrence is renamed to a fresh variable and the join gets an
/// explicit equality between the two.
///
/// ```text
/// JOIN                                CONSTRUCT [a, b]
///   CONSTRUCT [a, b] {b/1}       =>     JOIN (b = bf0)
///     T1(a)                               CONSTRUCT [a, b] {b/1}
///   T2(b)                                   T1(a)
///                                         T2(bf0)
/// ```
pub struct BooleanPullOut;

impl OptimizationRule for BooleanPullOut {
    fn name(&self) -> &'static str {
        "BooleanPullOut"
    }

    fn description(&self) -> &'static str {
        "Replace bindings shared across join children by explicit equalities"
    }

    fn apply(&self, iq: IQ, context: &mut OptimizationContext<'_>) -> QuarryResult<Transformed> {
        sweep_to_fixed_point(self.name(), iq, context, |tree, ctx| {
            PullOut { context: ctx }.transform(tree)
        })
    }
}

struct PullOut<'c, 'a> {
    context: &'c mut OptimizationContext<'a>,
}

/// First construction child binding a variable another child projects.
fn conflicting_binding(children: &[IQTree]) -> Option<(usize, Variable)> {
    children.iter().enumerate().find_map(|(i, child)| {
        let IQTree::Construction { node, .. } = child else {
            return None;
        };
        node.substitution()
            .domain()
            .into_iter()
            .find(|v| {
                children
                    .iter()
                    .enumerate()
                    .any(|(k, other)| k != i && other.variables().contains(v))
            })
            .map(|v| (i, v))
    })
}

impl IQTreeTransformer for PullOut<'_, '_> {
    fn transform_inner_join(
        &mut self,
        node: InnerJoinNode,
        children: Vec<IQTree>,
    ) -> QuarryResult<IQTree> {
        let children = self.transform_all(children)?;
        let Some((binder, variable)) = conflicting_binding(&children) else {
            return Ok(IQTree::InnerJoin { node, children });
        };
        let projected: BTreeSet<Variable> = children.iter().flat_map(IQTree::variables).collect();

        let mut equalities: Vec<ImmutableTerm> = Vec::new();
        let mut renamed = Vec::with_capacity(children.len());
        for (k, child) in children.into_iter().enumerate() {
            if k == binder || !child.variables().contains(&variable) {
                renamed.push(child);
                continue;
            }
            let fresh = self.context.fresh_variable_from(&variable);
            equalities.push(strict_eq(&variable, &fresh));
            renamed.push(child.apply_renaming(&Substitution::renaming([(variable.clone(), fresh)]))?);
        }
        let join = IQTree::inner_join_with(and_optional(node.condition(), equalities), renamed);
        IQTree::construction_or_simpler(projected, Substitution::new(), join)
    }
}
