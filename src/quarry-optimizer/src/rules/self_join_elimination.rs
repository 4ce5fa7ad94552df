//! Self-join elimination rule for inner joins.

use std::collections::{BTreeMap, BTreeSet};

use common_error::{QuarryError, QuarryResult};
use quarry_core::term::{and_optional, is_not_null, strict_eq};
use quarry_core::{ImmutableTerm, MetadataProvider, Substitution, Variable};
use quarry_iq::transform::IQTreeTransformer;
use quarry_iq::{ExtensionalDataNode, IQTree, InnerJoinNode, IQ};

use super::rule::{OptimizationRule, Transformed};
use super::sweep_to_fixed_point;
use crate::context::OptimizationContext;

/// Self-join elimination rule.
///
/// # Description
///
/// Two occurrences of a relation in the same inner join that agree on every
/// determinant of a unique constraint denote the same tuple. They are folded
/// into one occurrence; the arguments they disagree on are unified.
///
/// # Legal When
///
/// - Each determinant holds the same variable or the same non-null constant
///   in both occurrences. A shared variable is joined on, hence non-null, so
///   a nullable unique constraint still identifies the tuple.
///
/// # Nullable keys
///
/// Folding removes the natural-join equality on the shared variables. Each
/// shared variable that becomes nullable in the folded occurrence gets an
/// explicit `IS_NOT_NULL` filter.
pub struct SelfJoinElimination;

impl OptimizationRule for SelfJoinElimination {
    fn name(&self) -> &'static str {
        "SelfJoinElimination"
    }

    fn description(&self) -> &'static str {
        "Fold inner-join occurrences of a relation agreeing on a unique constraint"
    }

    fn apply(&self, iq: IQ, context: &mut OptimizationContext<'_>) -> QuarryResult<Transformed> {
        sweep_to_fixed_point(self.name(), iq, context, |tree, ctx| {
            SelfJoinEliminator {
                metadata: ctx.metadata(),
            }
            .transform(tree)
        })
    }
}

struct SelfJoinEliminator<'m> {
    metadata: &'m dyn MetadataProvider,
}

/// Outcome of unifying the arguments of two occurrences.
enum Unification {
    Merged {
        occurrence: ExtensionalDataNode,
        substitution: Substitution,
    },
    Clash,
}

impl SelfJoinEliminator<'_> {
    /// First pair of children identifying the same tuple.
    fn find_pair(&self, children: &[IQTree]) -> QuarryResult<Option<(usize, usize)>> {
        for (i, first) in children.iter().enumerate() {
            let IQTree::ExtensionalData(a) = first else {
                continue;
            };
            for (j, second) in children.iter().enumerate().skip(i + 1) {
                let IQTree::ExtensionalData(b) = second else {
                    continue;
                };
                if a.relation() == b.relation() && self.same_tuple(a, b)? {
                    return Ok(Some((i, j)));
                }
            }
        }
        Ok(None)
    }

    fn same_tuple(&self, a: &ExtensionalDataNode, b: &ExtensionalDataNode) -> QuarryResult<bool> {
        let relation = self.metadata.require_relation(a.relation())?;
        Ok(relation.unique_constraints().iter().any(|uc| {
            uc.determinants.iter().all(|d| match (a.argument(*d), b.argument(*d)) {
                (Some(x), Some(y)) => x == y && !x.is_null_constant(),
                _ => false,
            })
        }))
    }

    fn fold(
        &self,
        node: InnerJoinNode,
        children: Vec<IQTree>,
        i: usize,
        j: usize,
    ) -> QuarryResult<IQTree> {
        let projected: BTreeSet<Variable> = children.iter().flat_map(IQTree::variables).collect();
        let (IQTree::ExtensionalData(a), IQTree::ExtensionalData(b)) = (&children[i], &children[j])
        else {
            return Err(QuarryError::internal("self-join pair is not extensional"));
        };
        let (occurrence, substitution) = match unify(a, b)? {
            Unification::Merged {
                occurrence,
                substitution,
            } => (occurrence, substitution),
            Unification::Clash => return Ok(IQTree::empty(projected)),
        };

        let nullable = IQTree::ExtensionalData(occurrence.clone()).nullable_variables(self.metadata)?;
        let null_checks: BTreeSet<Variable> = a
            .variables()
            .intersection(b.variables())
            .filter_map(|v| match substitution.apply_to_variable(v) {
                ImmutableTerm::Variable(w) if nullable.contains(&w) => Some(w),
                _ => None,
            })
            .collect();
        let folded = IQTree::ExtensionalData(occurrence)
            .with_conjuncts(null_checks.into_iter().map(is_not_null).collect());

        let mut used_by_siblings = BTreeSet::new();
        let mut siblings = Vec::with_capacity(children.len() - 1);
        let mut folded = Some(folded);
        for (k, child) in children.into_iter().enumerate() {
            if k == i {
                if let Some(f) = folded.take() {
                    siblings.push(f);
                }
            } else if k != j {
                used_by_siblings.extend(child.variables());
                siblings.push(child);
            }
        }

        // Eliminated variables still read by a sibling are equated explicitly;
        // the others are re-bound above the join.
        let equalities: Vec<ImmutableTerm> = substitution
            .iter()
            .filter(|(v, _)| used_by_siblings.contains(*v))
            .map(|(v, t)| strict_eq(v, t.clone()))
            .collect();
        let bound: BTreeSet<Variable> = substitution
            .domain()
            .into_iter()
            .filter(|v| !used_by_siblings.contains(v))
            .collect();
        let condition = node.condition().map(|c| c.apply(&substitution));
        let join = IQTree::inner_join_or_simpler(
            and_optional(condition.as_ref(), equalities),
            siblings,
        );
        IQTree::construction_or_simpler(projected, substitution.restrict_domain_to(&bound), join)
    }
}

/// Merge the arguments of `b` into `a`, unifying the terms found at the
/// same position.
fn unify(a: &ExtensionalDataNode, b: &ExtensionalDataNode) -> QuarryResult<Unification> {
    let mut substitution = Substitution::new();
    let mut arguments: BTreeMap<usize, ImmutableTerm> = a.arguments().clone();
    for (position, b_term) in b.arguments() {
        let Some(a_term) = a.argument(*position) else {
            arguments.insert(*position, b_term.clone());
            continue;
        };
        let a_term = substitution.apply(a_term);
        let b_term = substitution.apply(b_term);
        if a_term == b_term {
            continue;
        }
        substitution = match (a_term, b_term) {
            (a_term, ImmutableTerm::Variable(y)) => {
                Substitution::singleton(y, a_term).compose(&substitution)
            }
            (ImmutableTerm::Variable(x), b_term) => {
                Substitution::singleton(x, b_term).compose(&substitution)
            }
            _ => return Ok(Unification::Clash),
        };
    }
    let arguments = arguments
        .into_iter()
        .map(|(p, t)| (p, substitution.apply(&t)))
        .collect();
    Ok(Unification::Merged {
        occurrence: a.with_arguments(arguments)?,
        substitution,
    })
}

impl IQTreeTransformer for SelfJoinEliminator<'_> {
    fn transform_inner_join(
        &mut self,
        node: InnerJoinNode,
        children: Vec<IQTree>,
    ) -> QuarryResult<IQTree> {
        let children = self.transform_all(children)?;
        match self.find_pair(&children)? {
            Some((i, j)) => self.fold(node, children, i, j),
            None => Ok(IQTree::InnerJoin { node, children }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::{apply, query};
    use quarry_core::term::{conjunction, int, var};
    use quarry_core::testing::{keyed_relation_metadata, nullable_unique_metadata};

    fn v(name: &str) -> Variable {
        Variable::new(name)
    }

    fn ext(relation: &str, args: &[(usize, ImmutableTerm)]) -> IQTree {
        IQTree::extensional(relation, args.iter().cloned()).unwrap()
    }

    fn below_root(iq: &IQ) -> IQTree {
        match iq.tree() {
            IQTree::Construction { child, .. } => (**child).clone(),
            other => other.clone(),
        }
    }

    #[test]
    fn test_simple_join_on_nullable_key() {
        let metadata = nullable_unique_metadata();
        let tree = IQTree::inner_join(vec![
            ext("TABLE1", &[(0, var("a"))]),
            ext("TABLE1", &[(0, var("a")), (2, var("e"))]),
        ]);
        let out = apply(&SelfJoinElimination, query(&["a", "e"], tree), &metadata);
        assert_eq!(
            below_root(&out),
            IQTree::filter(
                is_not_null(var("a")),
                ext("TABLE1", &[(0, var("a")), (2, var("e"))])
            )
        );
    }

    #[test]
    fn test_every_shared_nullable_variable_checked() {
        let metadata = nullable_unique_metadata();
        let tree = IQTree::inner_join(vec![
            ext("TABLE1", &[(0, var("a")), (1, var("b"))]),
            ext("TABLE1", &[(0, var("a")), (1, var("b")), (2, var("e"))]),
        ]);
        let out = apply(&SelfJoinElimination, query(&["a", "e"], tree), &metadata);
        let expected_condition =
            conjunction([is_not_null(var("a")), is_not_null(var("b"))]).unwrap();
        assert_eq!(
            below_root(&out),
            IQTree::filter(
                expected_condition,
                ext("TABLE1", &[(0, var("a")), (1, var("b")), (2, var("e"))])
            )
        );
    }

    #[test]
    fn test_disagreeing_variables_are_rebound() {
        let metadata = keyed_relation_metadata();
        let tree = IQTree::inner_join(vec![
            ext("R", &[(0, var("k")), (1, var("a"))]),
            ext("R", &[(0, var("k")), (1, var("b")), (2, var("c"))]),
        ]);
        let out = apply(&SelfJoinElimination, query(&["a", "b", "c"], tree), &metadata);
        assert!(!out.tree().contains_node(|t| matches!(t, IQTree::InnerJoin { .. })));
        let IQTree::Construction { node, child } = below_root(&out) else {
            panic!("construction expected:\n{}", out.explain());
        };
        assert_eq!(node.substitution().get(&v("b")), Some(&var("a")));
        // `k` is a non-null primary key: no check needed.
        assert_eq!(*child, ext("R", &[(0, var("k")), (1, var("a")), (2, var("c"))]));
    }

    #[test]
    fn test_clashing_constants_make_the_join_empty() {
        let metadata = keyed_relation_metadata();
        let tree = IQTree::inner_join(vec![
            ext("R", &[(0, var("k")), (1, int(1))]),
            ext("R", &[(0, var("k")), (1, int(2))]),
        ]);
        let out = apply(&SelfJoinElimination, query(&["k"], tree), &metadata);
        assert!(below_root(&out).is_declared_empty());
    }

    #[test]
    fn test_unbound_determinant_left_untouched() {
        let metadata = keyed_relation_metadata();
        let tree = IQTree::inner_join(vec![
            ext("R", &[(1, var("a"))]),
            ext("R", &[(1, var("a")), (2, var("b"))]),
        ]);
        let iq = query(&["a", "b"], tree);
        let out = apply(&SelfJoinElimination, iq.clone(), &metadata);
        assert_eq!(out, iq);
    }

    #[test]
    fn test_sibling_keeps_eliminated_variable() {
        let metadata = keyed_relation_metadata();
        let tree = IQTree::inner_join(vec![
            ext("R", &[(0, var("k")), (1, var("a"))]),
            ext("R", &[(0, var("k")), (1, var("b"))]),
            ext("R", &[(0, var("j")), (1, var("b"))]),
        ]);
        let out = apply(&SelfJoinElimination, query(&["a", "b", "j"], tree), &metadata);
        let IQTree::InnerJoin { node, children } = below_root(&out) else {
            panic!("join expected:\n{}", out.explain());
        };
        assert_eq!(node.condition(), Some(&strict_eq(var("b"), var("a"))));
        assert_eq!(children.len(), 2);
    }
}
