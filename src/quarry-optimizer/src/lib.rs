//! Constraint-aware optimizer for Quarry intermediate queries.
//!
//! The optimizer rewrites an [`IQ`] into an equivalent, simpler one using the
//! unique and foreign key constraints exposed by a [`MetadataProvider`].
//!
//! # Passes
//!
//! - **Normalization**: constant conditions, `Empty` and `True` absorption
//! - **Union Flattening**: n-ary unions without empty branches
//! - **Projection Shrinking**: unused positions, bindings and join children
//! - **Self-Join Elimination**: occurrences identifying the same tuple
//! - **Left-Join Elimination**: optional sides already read on the left
//! - **Boolean Pull-Out**, **Binding Lift**, **Boolean Push-Up**: moving
//!   bindings and conditions toward the root
//!
//! # Example
//!
//! ```rust
//! use quarry_core::term::var;
//! use quarry_core::testing::nullable_unique_metadata;
//! use quarry_core::{ProjectionAtom, Variable};
//! use quarry_iq::{IQTree, IQ};
//!
//! let tree = IQTree::inner_join(vec![
//!     IQTree::extensional("TABLE1", [(0, var("a"))]).unwrap(),
//!     IQTree::extensional("TABLE1", [(0, var("a")), (2, var("e"))]).unwrap(),
//! ]);
//! let answer = ProjectionAtom::new("ans", vec![Variable::new("a"), Variable::new("e")]).unwrap();
//! let iq = IQ::new(answer, tree).unwrap();
//!
//! let optimized = quarry_optimizer::optimize(iq, &nullable_unique_metadata()).unwrap();
//! println!("{}", optimized.explain());
//! ```

mod context;
mod rules;

pub use context::OptimizationContext;
pub use rules::{
    rule_for, BindingLift, BooleanPullOut, BooleanPushUp, LeftJoinElimination, Normalization,
    OptimizationRule, OptimizedIQ, Optimizer, OptimizerConfig, ProjectionShrinking, RuleTrace,
    SelfJoinElimination, Transformed, UnionFlattening,
};

use common_error::QuarryResult;
use quarry_core::MetadataProvider;
use quarry_iq::IQ;

/// Optimize a query with the default pipeline.
pub fn optimize(iq: IQ, metadata: &dyn MetadataProvider) -> QuarryResult<IQ> {
    Optimizer::default()
        .optimize(iq, metadata)
        .map(|result| result.iq)
}
