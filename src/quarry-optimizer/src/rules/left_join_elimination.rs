//! Left-join elimination rule.
//!
//! A left join whose optional side reads the same tuple as an occurrence on
//! the left is replaced by that occurrence, widened with the columns of the
//! optional side.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;

use common_error::QuarryResult;
use quarry_core::term::{conjunction, if_else_null, is_not_null, strict_eq};
use quarry_core::{ImmutableTerm, Substitution, Variable};
use quarry_iq::transform::IQTreeTransformer;
use quarry_iq::{
    ConstructionNode, ExtensionalDataNode, FilterNode, IQTree, InnerJoinNode, LeftJoinNode,
    UnionNode, IQ,
};

use super::rule::{OptimizationRule, Transformed};
use super::{shared_variables, sweep_to_fixed_point};
use crate::context::OptimizationContext;

/// Left-join elimination rule.
///
/// # Description
///
/// For `LJ(left, right)` where `right` is an extensional node (possibly
/// under a construction node) and `left` contains an occurrence of the same
/// relation, reachable through inner joins, filters and left-join left
/// children, that agrees with `right` on the determinants of a unique
/// constraint:
///
/// - the left occurrence reads the extra columns of `right` into fresh
///   variables;
/// - the left join is dropped;
/// - each right-only variable `v` is bound to `IF_ELSE_NULL(match, value)`,
///   where `match` holds the equalities `right` imposed on that tuple
///   (constants, repeated variables, variables shared with the left) and the
///   left-join condition.
///
/// # Legal When
///
/// Every determinant variable is non-null on the left, either by derived
/// nullability or because an ancestor filter or join rejects its nulls.
pub struct LeftJoinElimination;

impl OptimizationRule for LeftJoinElimination {
    fn name(&self) -> &'static str {
        "LeftJoinElimination"
    }

    fn description(&self) -> &'static str {
        "Merge the optional side of a left join into a left occurrence of the same tuple"
    }

    fn apply(&self, iq: IQ, context: &mut OptimizationContext<'_>) -> QuarryResult<Transformed> {
        sweep_to_fixed_point(self.name(), iq, context, |tree, ctx| {
            LeftJoinEliminator {
                context: ctx,
                non_null: BTreeSet::new(),
            }
            .transform(tree)
        })
    }
}

struct LeftJoinEliminator<'c, 'a> {
    context: &'c mut OptimizationContext<'a>,
    /// Variables whose nulls are rejected by an ancestor.
    non_null: BTreeSet<Variable>,
}

/// Position of a node: the child indices from the root of a subtree.
type Path = Vec<usize>;

/// Extensional occurrences whose tuples appear in every answer of `tree`.
fn reachable_occurrences<'t>(
    tree: &'t IQTree,
    path: &mut Path,
    out: &mut Vec<(Path, &'t ExtensionalDataNode)>,
) {
    match tree {
        IQTree::ExtensionalData(node) => out.push((path.clone(), node)),
        IQTree::Filter { child, .. } => {
            path.push(0);
            reachable_occurrences(child, path, out);
            path.pop();
        }
        IQTree::LeftJoin { left, .. } => {
            path.push(0);
            reachable_occurrences(left, path, out);
            path.pop();
        }
        IQTree::InnerJoin { children, .. } => {
            for (i, child) in children.iter().enumerate() {
                path.push(i);
                reachable_occurrences(child, path, out);
                path.pop();
            }
        }
        _ => {}
    }
}

fn replace_at(tree: IQTree, path: &[usize], replacement: IQTree) -> QuarryResult<IQTree> {
    let Some((&index, rest)) = path.split_first() else {
        return Ok(replacement);
    };
    let mut replacement = Some(replacement);
    let mut position = 0;
    tree.try_map_children(|child| {
        let current = position;
        position += 1;
        match replacement.take() {
            Some(r) if current == index => replace_at(child, rest, r),
            other => {
                replacement = other;
                Ok(child)
            }
        }
    })
}

impl LeftJoinEliminator<'_, '_> {
    fn with_non_null<T>(
        &mut self,
        non_null: BTreeSet<Variable>,
        f: impl FnOnce(&mut Self) -> QuarryResult<T>,
    ) -> QuarryResult<T> {
        let saved = mem::replace(&mut self.non_null, non_null);
        let result = f(self);
        self.non_null = saved;
        result
    }

    fn eliminate(
        &mut self,
        node: &LeftJoinNode,
        left: &IQTree,
        right: &IQTree,
    ) -> QuarryResult<Option<IQTree>> {
        let (right_construction, occurrence) = match right {
            IQTree::ExtensionalData(r) => (None, r),
            IQTree::Construction { node: c, child } => match &**child {
                IQTree::ExtensionalData(r) => (Some(c), r),
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };
        let metadata = self.context.metadata();
        let relation = metadata.require_relation(occurrence.relation())?;
        let left_vars = left.variables();
        let left_nullable = left.nullable_variables(metadata)?;
        let known_non_null: BTreeSet<Variable> = left_vars
            .iter()
            .filter(|v| !left_nullable.contains(*v) || self.non_null.contains(*v))
            .cloned()
            .collect();

        let mut candidates = Vec::new();
        reachable_occurrences(left, &mut Vec::new(), &mut candidates);
        let found = candidates.into_iter().find(|(_, o)| {
            o.relation() == occurrence.relation()
                && relation.unique_constraints().iter().any(|uc| {
                    uc.determinants.iter().all(|d| {
                        match (o.argument(*d), occurrence.argument(*d)) {
                            (Some(x), Some(y)) if x == y => match x {
                                ImmutableTerm::Variable(v) => known_non_null.contains(v),
                                ImmutableTerm::Constant(c) => !c.is_null(),
                                ImmutableTerm::Functional(_) => false,
                            },
                            _ => false,
                        }
                    })
                })
        });
        let Some((path, target)) = found else {
            return Ok(None);
        };

        let right_vars = right.variables();
        let mut arguments = target.arguments().clone();
        // Values of the variables of the right occurrence, read from the
        // widened left occurrence.
        let mut values: BTreeMap<Variable, ImmutableTerm> = BTreeMap::new();
        let mut conditions: Vec<ImmutableTerm> = Vec::new();
        for (position, right_term) in occurrence.arguments() {
            let value = match target.argument(*position) {
                Some(t) => t.clone(),
                None => {
                    let fresh = match right_term {
                        ImmutableTerm::Variable(y) => self.context.fresh_variable_from(y),
                        _ => self.context.fresh_variable(),
                    };
                    arguments.insert(*position, fresh.clone().into());
                    fresh.into()
                }
            };
            match right_term {
                ImmutableTerm::Variable(y) if left_vars.contains(y) && right_vars.contains(y) => {
                    if value != *right_term {
                        conditions.push(strict_eq(value, y));
                    } else if !known_non_null.contains(y) {
                        conditions.push(is_not_null(y));
                    }
                }
                ImmutableTerm::Variable(y) => match values.get(y) {
                    Some(first) => conditions.push(strict_eq(value, first.clone())),
                    None => {
                        values.insert(y.clone(), value);
                    }
                },
                _ => {
                    if value != *right_term {
                        conditions.push(strict_eq(value, right_term.clone()));
                    }
                }
            }
        }
        let values = Substitution::from_pairs(values);

        // Unconditional value of every variable projected by the right side.
        let value_of = |w: &Variable| match right_construction.and_then(|c| c.substitution().get(w))
        {
            Some(term) => term.apply(&values),
            None => values.apply_to_variable(w),
        };
        let mut unconditional = Substitution::new();
        for w in &right_vars {
            let value = value_of(w);
            if left_vars.contains(w) {
                if value != ImmutableTerm::Variable(w.clone()) {
                    conditions.push(strict_eq(value, w));
                }
            } else {
                unconditional = unconditional.with(w.clone(), value);
            }
        }
        if let Some(condition) = node.condition() {
            conditions.push(condition.apply(&unconditional));
        }

        let match_condition = conjunction(conditions);
        let bindings = unconditional.transform_terms(|value| match &match_condition {
            Some(m) => if_else_null(m.clone(), value.clone()),
            None => value.clone(),
        });
        let widened = IQTree::ExtensionalData(target.with_arguments(arguments)?);
        let left = replace_at(left.clone(), &path, widened)?;
        let mut projected = left_vars;
        projected.extend(right_vars);
        IQTree::construction_or_simpler(projected, bindings, left).map(Some)
    }
}

impl IQTreeTransformer for LeftJoinEliminator<'_, '_> {
    fn transform_construction(
        &mut self,
        node: ConstructionNode,
        child: IQTree,
    ) -> QuarryResult<IQTree> {
        let domain = node.substitution().domain();
        let inherited = self
            .non_null
            .iter()
            .filter(|v| node.projected().contains(*v) && !domain.contains(*v))
            .cloned()
            .collect();
        let child = self.with_non_null(inherited, |this| this.transform(child))?;
        Ok(IQTree::Construction {
            node,
            child: Box::new(child),
        })
    }

    fn transform_filter(&mut self, node: FilterNode, child: IQTree) -> QuarryResult<IQTree> {
        let mut non_null = self.non_null.clone();
        non_null.extend(node.condition().null_rejected_variables());
        let child = self.with_non_null(non_null, |this| this.transform(child))?;
        Ok(IQTree::Filter {
            node,
            child: Box::new(child),
        })
    }

    fn transform_inner_join(
        &mut self,
        node: InnerJoinNode,
        children: Vec<IQTree>,
    ) -> QuarryResult<IQTree> {
        let mut non_null = self.non_null.clone();
        non_null.extend(shared_variables(&children));
        if let Some(condition) = node.condition() {
            non_null.extend(condition.null_rejected_variables());
        }
        let children = self.with_non_null(non_null, |this| this.transform_all(children))?;
        Ok(IQTree::InnerJoin { node, children })
    }

    fn transform_union(&mut self, node: UnionNode, children: Vec<IQTree>) -> QuarryResult<IQTree> {
        let inherited = self
            .non_null
            .intersection(node.projected())
            .cloned()
            .collect();
        let children = self.with_non_null(inherited, |this| this.transform_all(children))?;
        Ok(IQTree::Union { node, children })
    }

    fn transform_left_join(
        &mut self,
        node: LeftJoinNode,
        left: IQTree,
        right: IQTree,
    ) -> QuarryResult<IQTree> {
        let left = self.transform(left)?;
        let right = self.with_non_null(BTreeSet::new(), |this| this.transform(right))?;
        if let Some(eliminated) = self.eliminate(&node, &left, &right)? {
            return Ok(eliminated);
        }
        Ok(IQTree::LeftJoin {
            node,
            left: Box::new(left),
            right: Box::new(right),
        })
    }
}
