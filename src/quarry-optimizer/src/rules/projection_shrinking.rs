//! Projection shrinking rule.
//!
//! Remove variables, positions and whole subtrees the root does not need.

use std::collections::BTreeSet;

use common_error::QuarryResult;
use quarry_core::{ImmutableTerm, MetadataProvider, Variable};
use quarry_iq::{
    ConstructionNode, ExtensionalDataNode, IQTree, InnerJoinNode, LeftJoinNode, UnionNode, IQ,
};

use super::rule::{OptimizationRule, Transformed};
use super::{shared_variables, sweep_to_fixed_point};
use crate::context::OptimizationContext;

/// Projection shrinking rule.
///
/// # Description
///
/// Propagates the set of required variables from the root projection down
/// the tree. A variable is required below a node when the node projects it
/// to a requiring parent, reads it in a condition or a binding, or joins on
/// it.
///
/// # Legal When
///
/// - Dropped extensional positions hold a variable occurring once in the node
/// - A removed left-join right side binds no required variable and matches
///   at most one tuple (a unique constraint bound on shared variables)
/// - A removed inner-join child is reached by a non-null foreign key from a
///   sibling and brings no variable of its own
pub struct ProjectionShrinking;

impl OptimizationRule for ProjectionShrinking {
    fn name(&self) -> &'static str {
        "ProjectionShrinking"
    }

    fn description(&self) -> &'static str {
        "Remove unused variables, positions and join children"
    }

    fn apply(&self, iq: IQ, context: &mut OptimizationContext<'_>) -> QuarryResult<Transformed> {
        let answer = iq.projection().variable_set();
        sweep_to_fixed_point(self.name(), iq, context, |tree, ctx| {
            let shrinker = Shrinker {
                metadata: ctx.metadata(),
            };
            match tree {
                IQTree::Construction { node, child } => {
                    shrinker.construction(node, *child, &answer, true)
                }
                other => shrinker.shrink(other, &answer),
            }
        })
    }
}

struct Shrinker<'m> {
    metadata: &'m dyn MetadataProvider,
}

fn intersection(a: &BTreeSet<Variable>, b: &BTreeSet<Variable>) -> BTreeSet<Variable> {
    a.intersection(b).cloned().collect()
}

impl Shrinker<'_> {
    /// Shrink `tree`, which must keep projecting `required`.
    fn shrink(&self, tree: IQTree, required: &BTreeSet<Variable>) -> QuarryResult<IQTree> {
        match tree {
            IQTree::ExtensionalData(node) => {
                Ok(IQTree::ExtensionalData(shrink_extensional(&node, required)?))
            }
            IQTree::Empty(node) => Ok(IQTree::empty(intersection(node.variables(), required))),
            IQTree::Native(_) | IQTree::True => Ok(tree),
            IQTree::Construction { node, child } => self.construction(node, *child, required, false),
            IQTree::Filter { node, child } => {
                let mut child_required = required.clone();
                node.condition().collect_variables(&mut child_required);
                Ok(IQTree::Filter {
                    node,
                    child: Box::new(self.shrink(*child, &child_required)?),
                })
            }
            IQTree::InnerJoin { node, children } => self.inner_join(node, children, required),
            IQTree::LeftJoin { node, left, right } => self.left_join(node, *left, *right, required),
            IQTree::Union { node, children } => self.union(node, children, required),
        }
    }

    fn construction(
        &self,
        node: ConstructionNode,
        child: IQTree,
        required: &BTreeSet<Variable>,
        is_root: bool,
    ) -> QuarryResult<IQTree> {
        let projected = if is_root {
            node.projected().clone()
        } else {
            intersection(node.projected(), required)
        };
        let substitution = node.substitution().restrict_domain_to(&projected);
        let mut child_required: BTreeSet<Variable> =
            projected.difference(&substitution.domain()).cloned().collect();
        child_required.extend(substitution.range_variables());
        let child = self.shrink(child, &child_required)?;
        if !is_root && substitution.is_empty() && projected == child.variables() {
            return Ok(child);
        }
        IQTree::construction(projected, substitution, child)
    }

    fn inner_join(
        &self,
        node: InnerJoinNode,
        children: Vec<IQTree>,
        required: &BTreeSet<Variable>,
    ) -> QuarryResult<IQTree> {
        let mut needed = required.clone();
        needed.extend(shared_variables(&children));
        if let Some(condition) = node.condition() {
            condition.collect_variables(&mut needed);
        }
        let mut children = children
            .into_iter()
            .map(|child| {
                let child_required = intersection(&child.variables(), &needed);
                self.shrink(child, &child_required)
            })
            .collect::<QuarryResult<Vec<_>>>()?;
        if let Some(index) = self.redundant_child(&children)? {
            children.remove(index);
        }
        Ok(IQTree::inner_join_or_simpler(
            node.condition().cloned(),
            children,
        ))
    }

    /// A child reached from a sibling through a foreign key.
    fn redundant_child(&self, children: &[IQTree]) -> QuarryResult<Option<usize>> {
        for (i, candidate) in children.iter().enumerate() {
            let IQTree::ExtensionalData(target) = candidate else {
                continue;
            };
            for (j, sibling) in children.iter().enumerate() {
                let IQTree::ExtensionalData(source) = sibling else {
                    continue;
                };
                if i != j && self.covered_by_foreign_key(target, source)? {
                    return Ok(Some(i));
                }
            }
        }
        Ok(None)
    }

    /// Every tuple of `source` joins exactly one tuple of `target`, and
    /// `target` only holds the referenced variables.
    fn covered_by_foreign_key(
        &self,
        target: &ExtensionalDataNode,
        source: &ExtensionalDataNode,
    ) -> QuarryResult<bool> {
        let source_relation = self.metadata.require_relation(source.relation())?;
        let target_relation = self.metadata.require_relation(target.relation())?;
        for fk in source_relation.foreign_keys() {
            if &fk.target != target.relation() || target.arguments().len() != fk.components.len()
            {
                continue;
            }
            let referenced: BTreeSet<usize> = fk.components.iter().map(|c| c.to).collect();
            if referenced.len() != fk.components.len() || !target_relation.is_unique_on(&referenced)
            {
                continue;
            }
            let mut seen = BTreeSet::new();
            let covered = fk.components.iter().all(|c| {
                match (source.argument(c.from), target.argument(c.to)) {
                    (Some(ImmutableTerm::Variable(x)), Some(ImmutableTerm::Variable(y))) => {
                        x == y && !source_relation.is_nullable(c.from) && seen.insert(x.clone())
                    }
                    _ => false,
                }
            });
            if covered {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn left_join(
        &self,
        node: LeftJoinNode,
        left: IQTree,
        right: IQTree,
        required: &BTreeSet<Variable>,
    ) -> QuarryResult<IQTree> {
        let left_vars = left.variables();
        let right_vars = right.variables();
        let mut needed = required.clone();
        needed.extend(left_vars.intersection(&right_vars).cloned());
        if let Some(condition) = node.condition() {
            condition.collect_variables(&mut needed);
        }
        let left = self.shrink(left, &intersection(&left_vars, &needed))?;
        let right = self.shrink(right, &intersection(&right_vars, &needed))?;
        if self.right_is_redundant(&left, &right, required)? {
            return Ok(left);
        }
        Ok(IQTree::LeftJoin {
            node,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// The right side binds nothing required and matches at most one tuple
    /// per left tuple.
    fn right_is_redundant(
        &self,
        left: &IQTree,
        right: &IQTree,
        required: &BTreeSet<Variable>,
    ) -> QuarryResult<bool> {
        let IQTree::ExtensionalData(occurrence) = right else {
            return Ok(false);
        };
        let left_vars = left.variables();
        if occurrence
            .variables()
            .iter()
            .any(|v| !left_vars.contains(v) && required.contains(v))
        {
            return Ok(false);
        }
        let relation = self.metadata.require_relation(occurrence.relation())?;
        Ok(relation.unique_constraints().iter().any(|uc| {
            uc.determinants
                .iter()
                .all(|d| match occurrence.argument(*d) {
                    Some(ImmutableTerm::Variable(v)) => left_vars.contains(v),
                    Some(ImmutableTerm::Constant(c)) => !c.is_null(),
                    _ => false,
                })
        }))
    }

    fn union(
        &self,
        node: UnionNode,
        children: Vec<IQTree>,
        required: &BTreeSet<Variable>,
    ) -> QuarryResult<IQTree> {
        let projected = intersection(node.projected(), required);
        let children = children
            .into_iter()
            .map(|child| {
                let child = self.shrink(child, &projected)?;
                Ok(if child.variables() == projected {
                    child
                } else {
                    IQTree::projection(projected.clone(), child)
                })
            })
            .collect::<QuarryResult<Vec<_>>>()?;
        Ok(IQTree::union(projected, children))
    }
}

/// Drop positions holding a variable that is neither required nor repeated.
fn shrink_extensional(
    node: &ExtensionalDataNode,
    required: &BTreeSet<Variable>,
) -> QuarryResult<ExtensionalDataNode> {
    let arguments = node
        .arguments()
        .iter()
        .filter(|(_, term)| match term.as_variable() {
            Some(v) => required.contains(v) || node.positions_of(v).len() > 1,
            None => true,
        })
        .map(|(p, t)| (*p, t.clone()))
        .collect();
    node.with_arguments(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::{apply, query};
    use quarry_core::term::{is_not_null, var};
    use quarry_core::testing::{
        foreign_key_metadata, keyed_relation_metadata, nullable_unique_metadata,
    };
    use quarry_core::Substitution;

    fn v(name: &str) -> Variable {
        Variable::new(name)
    }

    fn ext(relation: &str, args: &[(usize, &str)]) -> IQTree {
        IQTree::extensional(relation, args.iter().map(|(p, n)| (*p, var(n)))).unwrap()
    }

    fn below_root(iq: &IQ) -> IQTree {
        match iq.tree() {
            IQTree::Construction { child, .. } => (**child).clone(),
            other => other.clone(),
        }
    }

    #[test]
    fn test_unused_positions_dropped() {
        let metadata = nullable_unique_metadata();
        let tree = ext("TABLE1", &[(0, "a"), (1, "b"), (2, "c")]);
        let out = apply(&ProjectionShrinking, query(&["a"], tree), &metadata);
        assert_eq!(below_root(&out), ext("TABLE1", &[(0, "a")]));
    }

    #[test]
    fn test_repeated_and_filtered_variables_kept() {
        let metadata = nullable_unique_metadata();
        let tree = IQTree::filter(
            is_not_null(var("c")),
            ext("TABLE1", &[(0, "a"), (1, "b"), (2, "c")]),
        );
        let out = apply(&ProjectionShrinking, query(&["a"], tree), &metadata);
        assert_eq!(
            below_root(&out),
            IQTree::filter(is_not_null(var("c")), ext("TABLE1", &[(0, "a"), (2, "c")]))
        );

        let repeated = ext("TABLE1", &[(0, "a"), (1, "b"), (2, "b")]);
        let out = apply(&ProjectionShrinking, query(&["a"], repeated.clone()), &metadata);
        assert_eq!(below_root(&out), repeated);
    }

    #[test]
    fn test_unused_bindings_and_identity_constructions() {
        let metadata = nullable_unique_metadata();
        let inner = IQTree::construction(
            BTreeSet::from([v("a"), v("h")]),
            Substitution::singleton(v("h"), var("b")),
            ext("TABLE1", &[(0, "a"), (1, "b")]),
        )
        .unwrap();
        let out = apply(&ProjectionShrinking, query(&["a"], inner), &metadata);
        assert_eq!(below_root(&out), ext("TABLE1", &[(0, "a")]));
    }

    #[test]
    fn test_left_join_right_side_removed() {
        let metadata = keyed_relation_metadata();
        let tree = IQTree::left_join(
            ext("R", &[(0, "k"), (1, "a")]),
            ext("R", &[(0, "k"), (2, "b")]),
        );
        let out = apply(&ProjectionShrinking, query(&["k", "a"], tree), &metadata);
        assert_eq!(below_root(&out), ext("R", &[(0, "k"), (1, "a")]));
    }

    #[test]
    fn test_left_join_needed_right_side_kept() {
        let metadata = keyed_relation_metadata();
        let tree = IQTree::left_join(
            ext("R", &[(0, "k"), (1, "a")]),
            ext("R", &[(1, "a"), (2, "b")]),
        );
        let iq = query(&["k", "a"], tree);
        let out = apply(&ProjectionShrinking, iq, &metadata);
        assert!(out.tree().contains_node(|t| matches!(t, IQTree::LeftJoin { .. })));
    }

    #[test]
    fn test_foreign_key_child_removed() {
        let metadata = foreign_key_metadata();
        let tree = IQTree::inner_join(vec![
            ext("ADDRESS", &[(1, "p"), (2, "city")]),
            ext("PERSON", &[(0, "p")]),
        ]);
        let out = apply(&ProjectionShrinking, query(&["city"], tree), &metadata);
        assert_eq!(below_root(&out), ext("ADDRESS", &[(2, "city")]));

        let with_name = IQTree::inner_join(vec![
            ext("ADDRESS", &[(1, "p"), (2, "city")]),
            ext("PERSON", &[(0, "p"), (1, "name")]),
        ]);
        let out = apply(&ProjectionShrinking, query(&["city", "name"], with_name), &metadata);
        assert!(out.tree().contains_node(|t| matches!(t, IQTree::InnerJoin { .. })));
    }

    #[test]
    fn test_union_projection_shrinks() {
        let metadata = nullable_unique_metadata();
        let ab = BTreeSet::from([v("a"), v("b")]);
        let tree = IQTree::union(
            ab,
            vec![
                ext("TABLE1", &[(0, "a"), (1, "b")]),
                ext("TABLE2", &[(0, "a"), (1, "b")]),
            ],
        );
        let out = apply(&ProjectionShrinking, query(&["a"], tree), &metadata);
        let IQTree::Union { node, children } = below_root(&out) else {
            panic!("union expected:\n{}", out.explain());
        };
        assert_eq!(node.projected(), &BTreeSet::from([v("a")]));
        assert_eq!(children[0], ext("TABLE1", &[(0, "a")]));
    }
}
