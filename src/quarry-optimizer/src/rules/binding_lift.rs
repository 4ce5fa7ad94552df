//! Binding lift rule.
//!
//! Moves construction nodes toward the root so that the bindings they
//! define are computed once, above the joins and filters that do not need
//! them.

use std::collections::BTreeSet;

use common_error::{QuarryError, QuarryResult};
use quarry_core::{Substitution, Variable};
use quarry_iq::transform::IQTreeTransformer;
use quarry_iq::{
    ConstructionNode, FilterNode, IQTree, InnerJoinNode, LeftJoinNode, UnionNode, IQ,
};

use super::rule::{OptimizationRule, Transformed};
use super::sweep_to_fixed_point;
use crate::context::OptimizationContext;

/// Binding lift rule.
///
/// # Rewrites
///
/// - nested construction nodes merge into one
/// - `FILTER(c)` over a construction moves below it, with `c` rewritten
///   through the substitution
/// - a construction child of an inner join is lifted above the join when
///   no sibling projects a variable it binds
/// - a construction on the left of a left join is lifted above the left
///   join when the right side does not project a variable it binds
/// - constant bindings shared by every branch of a union are lifted above
///   the union
///
/// Variables a lifted construction hides are renamed when they would clash
/// with the variables of their new neighbours.
pub struct BindingLift;

impl OptimizationRule for BindingLift {
    fn name(&self) -> &'static str {
        "BindingLift"
    }

    fn description(&self) -> &'static str {
        "Lift construction nodes above filters, joins and unions"
    }

    fn apply(&self, iq: IQ, context: &mut OptimizationContext<'_>) -> QuarryResult<Transformed> {
        sweep_to_fixed_point(self.name(), iq, context, |tree, ctx| {
            Lifter { context: ctx }.transform(tree)
        })
    }
}

struct Lifter<'c, 'a> {
    context: &'c mut OptimizationContext<'a>,
}

impl Lifter<'_, '_> {
    /// Rename the variables `child` hides below `node` that occur in `avoid`.
    fn isolate_private_variables(
        &mut self,
        node: &ConstructionNode,
        child: IQTree,
        avoid: &BTreeSet<Variable>,
    ) -> QuarryResult<(Substitution, IQTree)> {
        let clashes: Vec<Variable> = child
            .variables()
            .into_iter()
            .filter(|v| !node.projected().contains(v) && avoid.contains(v))
            .collect();
        if clashes.is_empty() {
            return Ok((node.substitution().clone(), child));
        }
        let renaming = Substitution::renaming(
            clashes
                .into_iter()
                .map(|v| {
                    let fresh = self.context.fresh_variable_from(&v);
                    (v, fresh)
                })
                .collect::<Vec<_>>(),
        );
        let substitution = node.substitution().transform_terms(|t| t.apply(&renaming));
        Ok((substitution, child.apply_renaming(&renaming)?))
    }

    fn merge_constructions(
        &mut self,
        outer: ConstructionNode,
        inner: ConstructionNode,
        grandchild: IQTree,
    ) -> QuarryResult<IQTree> {
        let avoid = outer.substitution().domain();
        let (inner_substitution, grandchild) =
            self.isolate_private_variables(&inner, grandchild, &avoid)?;
        let substitution = inner_substitution
            .compose(outer.substitution())
            .restrict_domain_to(outer.projected());
        IQTree::construction(outer.projected().clone(), substitution, grandchild)
    }
}

/// Constant bindings found in every branch, all branches being construction
/// nodes.
fn common_ground_bindings(projected: &BTreeSet<Variable>, children: &[IQTree]) -> Substitution {
    let mut constructions = children.iter().map(|c| match c {
        IQTree::Construction { node, .. } => Some(node),
        _ => None,
    });
    let Some(Some(first)) = constructions.next() else {
        return Substitution::new();
    };
    let others: Option<Vec<&ConstructionNode>> = constructions.collect();
    let Some(others) = others else {
        return Substitution::new();
    };
    first
        .substitution()
        .iter()
        .filter(|(v, t)| {
            projected.contains(*v)
                && t.is_ground()
                && others.iter().all(|o| o.substitution().get(v) == Some(*t))
        })
        .map(|(v, t)| (v.clone(), t.clone()))
        .collect()
}

impl IQTreeTransformer for Lifter<'_, '_> {
    fn transform_construction(
        &mut self,
        node: ConstructionNode,
        child: IQTree,
    ) -> QuarryResult<IQTree> {
        match self.transform(child)? {
            IQTree::Construction {
                node: inner,
                child: grandchild,
            } => self.merge_constructions(node, inner, *grandchild),
            child => Ok(IQTree::Construction {
                node,
                child: Box::new(child),
            }),
        }
    }

    fn transform_filter(&mut self, node: FilterNode, child: IQTree) -> QuarryResult<IQTree> {
        match self.transform(child)? {
            IQTree::Construction {
                node: construction,
                child: grandchild,
            } => {
                let condition = node.condition().apply(construction.substitution());
                Ok(IQTree::Construction {
                    node: construction,
                    child: Box::new(IQTree::filter(condition, *grandchild)),
                })
            }
            child => Ok(IQTree::Filter {
                node,
                child: Box::new(child),
            }),
        }
    }

    fn transform_inner_join(
        &mut self,
        node: InnerJoinNode,
        children: Vec<IQTree>,
    ) -> QuarryResult<IQTree> {
        let mut children = self.transform_all(children)?;
        let liftable = children.iter().enumerate().position(|(i, child)| {
            let IQTree::Construction { node: c, .. } = child else {
                return false;
            };
            let domain = c.substitution().domain();
            children
                .iter()
                .enumerate()
                .all(|(k, other)| k == i || other.variables().is_disjoint(&domain))
        });
        let Some(i) = liftable else {
            return Ok(IQTree::InnerJoin { node, children });
        };

        let projected: BTreeSet<Variable> = children.iter().flat_map(IQTree::variables).collect();
        let IQTree::Construction {
            node: construction,
            child,
        } = children.remove(i)
        else {
            return Err(QuarryError::internal("liftable join child is not a construction"));
        };
        let siblings: BTreeSet<Variable> = children.iter().flat_map(IQTree::variables).collect();
        let (substitution, child) =
            self.isolate_private_variables(&construction, *child, &siblings)?;
        children.insert(i, child);
        let condition = node.condition().map(|c| c.apply(&substitution));
        IQTree::construction(
            projected,
            substitution,
            IQTree::inner_join_with(condition, children),
        )
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
        match left {
            IQTree::Construction {
                node: construction,
                child,
            } if construction
                .substitution()
                .domain()
                .is_disjoint(&right_vars) =>
            {
                let (substitution, child) =
                    self.isolate_private_variables(&construction, *child, &right_vars)?;
                let mut projected = construction.projected().clone();
                projected.extend(right_vars);
                let condition = node.condition().map(|c| c.apply(&substitution));
                IQTree::construction(
                    projected,
                    substitution,
                    IQTree::left_join_with(condition, child, right),
                )
            }
            left => Ok(IQTree::LeftJoin {
                node,
                left: Box::new(left),
                right: Box::new(right),
            }),
        }
    }

    fn transform_union(&mut self, node: UnionNode, children: Vec<IQTree>) -> QuarryResult<IQTree> {
        let children = self.transform_all(children)?;
        let common = common_ground_bindings(node.projected(), &children);
        if common.is_empty() {
            return Ok(IQTree::Union { node, children });
        }
        let lifted = common.domain();
        let remaining: BTreeSet<Variable> =
            node.projected().difference(&lifted).cloned().collect();
        let branches = children
            .into_iter()
            .map(|child| match child {
                IQTree::Construction {
                    node: construction,
                    child,
                } => {
                    let substitution = lifted
                        .iter()
                        .fold(construction.substitution().clone(), |s, v| s.remove(v));
                    IQTree::construction_or_simpler(remaining.clone(), substitution, *child)
                }
                other => Err(QuarryError::internal(format!(
                    "union branch {} has no common binding",
                    other.kind_name()
                ))),
            })
            .collect::<QuarryResult<Vec<_>>>()?;
        IQTree::construction(
            node.projected().clone(),
            common,
            IQTree::union(remaining, branches),
        )
    }
}
