//! Optimization passes for intermediate queries.
//!
//! Every pass rewrites the tree while preserving the bag of answers on all
//! database instances that satisfy the metadata constraints.
//!
//! # Passes
//!
//! - **Normalization**: constant conditions, `Empty` and `True` absorption
//! - **Union Flattening**: n-ary unions without empty branches
//! - **Projection Shrinking**: drop what the root does not need
//! - **Self-Join Elimination**: fold inner-join occurrences on a unique constraint
//! - **Left-Join Elimination**: merge the optional side into a left occurrence
//! - **Boolean Pull-Out**: explicit equalities for conflicting bindings
//! - **Binding Lift**: move substitutions toward the root
//! - **Boolean Push-Up**: move filter conditions toward the root
//!
//! # Local fixed point
//!
//! Each pass repeats its sweep until the tree stops changing, so applying a
//! pass twice gives the same tree as applying it once.

mod binding_lift;
mod boolean_pull_out;
mod boolean_push_up;
mod left_join_elimination;
mod normalization;
mod optimizer;
mod projection_shrinking;
mod rule;
mod self_join_elimination;
mod union_flattening;

pub use binding_lift::BindingLift;
pub use boolean_pull_out::BooleanPullOut;
pub use boolean_push_up::BooleanPushUp;
pub use left_join_elimination::LeftJoinElimination;
pub use normalization::Normalization;
pub use optimizer::{Optimizer, OptimizerConfig};
pub use projection_shrinking::ProjectionShrinking;
pub use rule::{OptimizationRule, OptimizedIQ, RuleTrace, Transformed};
pub use self_join_elimination::SelfJoinElimination;
pub use union_flattening::UnionFlattening;

use std::collections::{BTreeMap, BTreeSet};

use common_config::PassKind;
use common_error::QuarryResult;
use log::warn;
use quarry_core::Variable;
use quarry_iq::{IQTree, IQ};

use crate::context::OptimizationContext;

/// Upper bound on the sweeps of one pass.
const MAX_SWEEPS: usize = 64;

/// The rule implementing a pass.
pub fn rule_for(pass: PassKind) -> Box<dyn OptimizationRule> {
    match pass {
        PassKind::Normalization => Box::new(Normalization),
        PassKind::UnionFlattening => Box::new(UnionFlattening),
        PassKind::ProjectionShrinking => Box::new(ProjectionShrinking),
        PassKind::SelfJoinElimination => Box::new(SelfJoinElimination),
        PassKind::LeftJoinElimination => Box::new(LeftJoinElimination),
        PassKind::BooleanPullOut => Box::new(BooleanPullOut),
        PassKind::BindingLift => Box::new(BindingLift),
        PassKind::BooleanPushUp => Box::new(BooleanPushUp),
    }
}

/// Repeat `sweep` on the tree of `iq` until it stops changing.
pub(crate) fn sweep_to_fixed_point<'a, F>(
    rule_name: &'static str,
    iq: IQ,
    context: &mut OptimizationContext<'a>,
    mut sweep: F,
) -> QuarryResult<Transformed>
where
    F: FnMut(IQTree, &mut OptimizationContext<'a>) -> QuarryResult<IQTree>,
{
    let original = iq.tree().clone();
    let mut tree = original.clone();
    let mut stable = false;
    for _ in 0..MAX_SWEEPS {
        let next = sweep(tree.clone(), context)?;
        if next == tree {
            stable = true;
            break;
        }
        tree = next;
    }
    if !stable {
        warn!("{rule_name}: no local fixpoint after {MAX_SWEEPS} sweeps");
    }
    if tree == original {
        return Ok(Transformed::no(iq));
    }
    Ok(Transformed::yes(iq.with_tree(tree)?))
}

/// Variables projected by at least two of `children`.
pub(crate) fn shared_variables<'t>(
    children: impl IntoIterator<Item = &'t IQTree>,
) -> BTreeSet<Variable> {
    let mut occurrences: BTreeMap<Variable, usize> = BTreeMap::new();
    for child in children {
        for v in child.variables() {
            *occurrences.entry(v).or_default() += 1;
        }
    }
    occurrences
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(v, _)| v)
        .collect()
}
