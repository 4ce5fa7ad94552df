//! Integration tests for quarry-iq

use std::collections::BTreeSet;

use proptest::prelude::*;
use quarry_core::term::{int, is_not_null, strict_eq, var};
use quarry_core::testing::nullable_unique_metadata;
use quarry_core::{DataAtom, ProjectionAtom, Substitution, Variable};
use quarry_iq::transform::IQTreeTransformer;
use quarry_iq::{FnTransformer, IQTree, IQ};

fn v(name: &str) -> Variable {
    Variable::new(name)
}

fn answer(names: &[&str]) -> ProjectionAtom {
    ProjectionAtom::new("ans", names.iter().map(|n| v(n)).collect()).unwrap()
}

/// `ans(a,g) :- LJ(TABLE1{0:a}, TABLE1{0:a,1:2,2:g})`
fn left_join_query() -> IQ {
    let tree = IQTree::left_join(
        IQTree::filter(
            is_not_null(var("a")),
            IQTree::extensional("TABLE1", [(0, var("a"))]).unwrap(),
        ),
        IQTree::extensional("TABLE1", [(0, var("a")), (1, int(2)), (2, var("g"))]).unwrap(),
    );
    IQ::new(answer(&["a", "g"]), tree)
        .unwrap()
        .normalize_for_optimization()
        .unwrap()
}

#[test]
fn test_left_join_query_is_valid() {
    let iq = left_join_query();
    iq.validate_with_metadata(&nullable_unique_metadata()).unwrap();
    assert_eq!(
        iq.tree().nullable_variables(&nullable_unique_metadata()).unwrap(),
        BTreeSet::from([v("g")])
    );
}

#[test]
fn test_iq_serde_roundtrip() {
    let iq = left_join_query();
    let json = serde_json::to_string(&iq).unwrap();
    let back: IQ = serde_json::from_str(&json).unwrap();
    assert_eq!(back, iq);
}

#[test]
fn test_explain_lists_every_node() {
    let iq = left_join_query();
    let text = iq.explain();
    assert_eq!(text.lines().count(), 1 + iq.tree().node_count());
    assert!(text.contains("CONSTRUCT [a,g]"));
    assert!(text.contains("EXTENSIONAL TABLE1{0:a,1:2,2:g}"));
}

#[test]
fn test_bottom_up_rewrite_to_join() {
    // Turn the left join into an inner join, as if the right side were mandatory.
    let iq = left_join_query();
    let rewritten = FnTransformer::new(|t: IQTree| {
        Ok(match t {
            IQTree::LeftJoin { left, right, .. } => IQTree::inner_join(vec![*left, *right]),
            other => other,
        })
    })
    .transform(iq.tree().clone())
    .unwrap();
    let rewritten = iq.with_tree(rewritten).unwrap();
    rewritten.validate().unwrap();
    // g is still bound to the nullable col3 of TABLE1.
    assert_eq!(
        rewritten
            .tree()
            .nullable_variables(&nullable_unique_metadata())
            .unwrap(),
        BTreeSet::from([v("g")])
    );
}

#[test]
fn test_extensional_node_from_atom() {
    let atom = DataAtom::new("TABLE1", vec![var("a"), int(2), var("g")]);
    let leaf = IQTree::extensional_atom(&atom).unwrap();
    assert!(leaf.is_leaf());
    assert_eq!(
        leaf,
        IQTree::extensional("TABLE1", [(0, var("a")), (1, int(2)), (2, var("g"))]).unwrap()
    );

    let iq = IQ::new(answer(&["a", "g"]), leaf.clone()).unwrap();
    let root = iq.normalize_for_optimization().unwrap().into_tree();
    assert!(!root.is_leaf());
    assert_eq!(root.children(), vec![&leaf]);
}

#[test]
fn test_renaming_preserves_validity() {
    let tree = IQTree::construction(
        BTreeSet::from([v("a"), v("h")]),
        Substitution::singleton(v("h"), strict_eq(var("b"), int(1))),
        IQTree::extensional("TABLE2", [(0, var("a")), (1, var("b"))]).unwrap(),
    )
    .unwrap();
    let renamed = tree
        .apply_renaming(&Substitution::renaming([(v("b"), v("bf0"))]))
        .unwrap();
    let iq = IQ::new(answer(&["a", "h"]), renamed).unwrap();
    iq.validate_with_metadata(&nullable_unique_metadata()).unwrap();
    assert!(iq.tree().all_variables().contains(&v("bf0")));
}

fn arb_leaf() -> impl Strategy<Value = IQTree> {
    (
        prop::sample::select(vec!["TABLE1", "TABLE2"]),
        prop::sample::subsequence(vec!["a", "b", "c"], 1..=3),
    )
        .prop_map(|(relation, names)| {
            IQTree::extensional(
                relation,
                names.into_iter().enumerate().map(|(p, n)| (p, var(n))),
            )
            .unwrap()
        })
}

fn arb_tree() -> impl Strategy<Value = IQTree> {
    arb_leaf().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 2..4).prop_map(IQTree::inner_join),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| IQTree::left_join(l, r)),
            inner.prop_map(|t| {
                let first = t.variables().into_iter().next();
                match first {
                    Some(x) => IQTree::filter(is_not_null(x), t),
                    None => t,
                }
            }),
        ]
    })
}

proptest! {
    /// Nullable variables are always projected variables.
    #[test]
    fn nullable_variables_are_projected(tree in arb_tree()) {
        let nullable = tree.nullable_variables(&nullable_unique_metadata()).unwrap();
        prop_assert!(nullable.is_subset(&tree.variables()));
    }

    /// Generated trees pass both validators.
    #[test]
    fn generated_trees_are_valid(tree in arb_tree()) {
        let vars: Vec<Variable> = tree.variables().into_iter().collect();
        let iq = IQ::new(ProjectionAtom::new("ans", vars).unwrap(), tree).unwrap();
        prop_assert!(iq.validate_with_metadata(&nullable_unique_metadata()).is_ok());
    }
}
