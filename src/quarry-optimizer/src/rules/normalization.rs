//! Normalization rule.
//!
//! Simplifies conditions and substitutions and absorbs degenerate nodes.

use std::collections::BTreeSet;

use common_error::QuarryResult;
use quarry_core::term::null;
use quarry_core::{ImmutableTerm, Substitution, Variable};
use quarry_iq::transform::{ChildTransformer, IQTreeTransformer};
use quarry_iq::{ConstructionNode, FilterNode, IQTree, InnerJoinNode, LeftJoinNode, UnionNode, IQ};

use super::rule::{OptimizationRule, Transformed};
use super::sweep_to_fixed_point;
use crate::context::OptimizationContext;

/// Normalization rule.
///
/// # Rewrites
///
/// - `FILTER(TRUE)` disappears, `FILTER(FALSE)` and `FILTER(NULL)` become `EMPTY`
/// - a join with an `EMPTY` child is `EMPTY`; `TRUE` children are dropped
///   and a join left with one child collapses into a filter
/// - a left join with an `EMPTY` left is `EMPTY`; with an `EMPTY` right or an
///   unsatisfiable condition it is the left padded with nulls
/// - a construction or a filter over `EMPTY` is `EMPTY`
/// - a union whose branches are all `EMPTY` is `EMPTY`
pub struct Normalization;

impl OptimizationRule for Normalization {
    fn name(&self) -> &'static str {
        "Normalization"
    }

    fn description(&self) -> &'static str {
        "Simplify conditions and absorb EMPTY and TRUE nodes"
    }

    fn apply(&self, iq: IQ, context: &mut OptimizationContext<'_>) -> QuarryResult<Transformed> {
        sweep_to_fixed_point(self.name(), iq, context, |tree, _| Normalizer.transform(tree))
    }
}

struct Normalizer;

fn is_unsatisfiable(condition: &ImmutableTerm) -> bool {
    condition.is_false() || condition.is_null_constant()
}

fn simplify_condition(condition: Option<&ImmutableTerm>) -> QuarryResult<Option<ImmutableTerm>> {
    condition.map(ImmutableTerm::simplify_as_condition).transpose()
}

/// `left` extended with null bindings for the variables only `right` projects.
fn pad_with_nulls(left: IQTree, right_vars: &BTreeSet<Variable>) -> QuarryResult<IQTree> {
    let left_vars = left.variables();
    let padding: Substitution = right_vars
        .difference(&left_vars)
        .map(|v| (v.clone(), null()))
        .collect();
    if padding.is_empty() {
        return Ok(left);
    }
    let mut projected = left_vars;
    projected.extend(padding.domain());
    IQTree::construction(projected, padding, left)
}

impl IQTreeTransformer for Normalizer {
    fn transform_construction(
        &mut self,
        node: ConstructionNode,
        child: IQTree,
    ) -> QuarryResult<IQTree> {
        let child = self.transform(child)?;
        if child.is_declared_empty() {
            return Ok(IQTree::empty(node.projected().clone()));
        }
        let substitution = node
            .substitution()
            .iter()
            .map(|(v, t)| Ok((v.clone(), t.simplify()?)))
            .collect::<QuarryResult<Substitution>>()?;
        IQTree::construction(node.projected().clone(), substitution, child)
    }

    fn transform_filter(&mut self, node: FilterNode, child: IQTree) -> QuarryResult<IQTree> {
        let child = self.transform(child)?;
        if child.is_declared_empty() {
            return Ok(child);
        }
        let condition = node.condition().simplify_as_condition()?;
        if is_unsatisfiable(&condition) {
            return Ok(IQTree::empty(child.variables()));
        }
        Ok(IQTree::filter_or_simpler(Some(condition), child))
    }

    fn transform_left_join(
        &mut self,
        node: LeftJoinNode,
        left: IQTree,
        right: IQTree,
    ) -> QuarryResult<IQTree> {
        let left = self.transform(left)?;
        let right = self.transform(right)?;
        let right_vars = right.variables();
        if left.is_declared_empty() {
            let mut vars = left.variables();
            vars.extend(right_vars);
            return Ok(IQTree::empty(vars));
        }
        if matches!(right, IQTree::True) {
            return Ok(left);
        }
        let condition = simplify_condition(node.condition())?;
        if right.is_declared_empty() || condition.as_ref().is_some_and(is_unsatisfiable) {
            return pad_with_nulls(left, &right_vars);
        }
        Ok(IQTree::left_join_with(
            condition.filter(|c| !c.is_true()),
            left,
            right,
        ))
    }

    fn transform_inner_join(
        &mut self,
        node: InnerJoinNode,
        children: Vec<IQTree>,
    ) -> QuarryResult<IQTree> {
        let children = self.transform_all(children)?;
        if children.iter().any(IQTree::is_declared_empty) {
            let vars = children.iter().flat_map(IQTree::variables).collect();
            return Ok(IQTree::empty(vars));
        }
        let condition = simplify_condition(node.condition())?;
        if condition.as_ref().is_some_and(is_unsatisfiable) {
            let vars = children.iter().flat_map(IQTree::variables).collect();
            return Ok(IQTree::empty(vars));
        }
        let children = children
            .into_iter()
            .filter(|c| !matches!(c, IQTree::True))
            .collect();
        Ok(IQTree::inner_join_or_simpler(
            condition.filter(|c| !c.is_true()),
            children,
        ))
    }

    fn transform_union(&mut self, node: UnionNode, children: Vec<IQTree>) -> QuarryResult<IQTree> {
        // Each branch on its own.
        let union = ChildTransformer::new(Normalizer).transform(IQTree::Union { node, children })?;
        match union {
            IQTree::Union { node, children } if children.iter().all(IQTree::is_declared_empty) => {
                Ok(IQTree::empty(node.projected().clone()))
            }
            other => Ok(other),
        }
    }
}
