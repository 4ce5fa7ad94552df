//! Integration tests for quarry-core
//!
//! Property tests checking that simplification and substitution composition
//! agree with the typed evaluator.

use std::collections::BTreeMap;

use proptest::prelude::*;
use quarry_core::term::*;
use quarry_core::*;

const VARS: [&str; 3] = ["a", "b", "c"];

fn arb_int_leaf() -> impl Strategy<Value = ImmutableTerm> {
    prop_oneof![
        prop::sample::select(VARS.to_vec()).prop_map(var),
        (0i64..3).prop_map(int),
        Just(null()),
    ]
}

fn arb_bool_leaf() -> impl Strategy<Value = ImmutableTerm> {
    prop_oneof![
        (arb_int_leaf(), arb_int_leaf()).prop_map(|(l, r)| strict_eq(l, r)),
        (arb_int_leaf(), arb_int_leaf()).prop_map(|(l, r)| less_than(l, r)),
        arb_int_leaf().prop_map(is_null),
        arb_int_leaf().prop_map(is_not_null),
        any::<bool>().prop_map(boolean),
        Just(null()),
    ]
}

fn arb_bool_term() -> impl Strategy<Value = ImmutableTerm> {
    arb_bool_leaf().prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 2..4)
                .prop_map(|ts| ImmutableTerm::function(FunctionSymbol::And, ts).unwrap()),
            prop::collection::vec(inner.clone(), 2..4).prop_map(disjunction),
            inner.clone().prop_map(not),
            inner.clone().prop_map(is_true),
            (inner.clone(), arb_int_leaf())
                .prop_map(|(c, v)| is_not_null(if_else_null(c, v))),
            (inner.clone(), inner).prop_map(|(c, v)| if_else_null(c, v)),
        ]
    })
}

fn arb_int_term() -> impl Strategy<Value = ImmutableTerm> {
    prop_oneof![
        arb_int_leaf(),
        (arb_bool_term(), arb_int_leaf()).prop_map(|(c, v)| if_else_null(c, v)),
        prop::collection::vec(arb_int_leaf(), 1..4).prop_map(coalesce),
    ]
}

fn arb_bindings() -> impl Strategy<Value = Bindings> {
    prop::collection::vec(prop::option::of(0i64..3), 3).prop_map(|values| {
        VARS.iter()
            .zip(values)
            .map(|(name, value)| {
                (
                    Variable::new(*name),
                    value.map_or(Constant::Null, Constant::Integer),
                )
            })
            .collect::<BTreeMap<_, _>>()
    })
}

fn arb_substitution() -> impl Strategy<Value = Substitution> {
    prop::collection::btree_map(prop::sample::select(VARS.to_vec()), arb_int_leaf(), 0..3)
        .prop_map(|m| {
            m.into_iter()
                .map(|(name, term)| (Variable::new(name), term))
                .collect()
        })
}

proptest! {
    /// Simplification preserves the value of boolean terms.
    #[test]
    fn simplify_preserves_boolean_value(t in arb_bool_term(), b in arb_bindings()) {
        let simplified = t.simplify().unwrap();
        prop_assert_eq!(simplified.evaluate(&b).unwrap(), t.evaluate(&b).unwrap());
    }

    /// Simplification preserves the value of integer terms.
    #[test]
    fn simplify_preserves_integer_value(t in arb_int_term(), b in arb_bindings()) {
        let simplified = t.simplify().unwrap();
        prop_assert_eq!(simplified.evaluate(&b).unwrap(), t.evaluate(&b).unwrap());
    }

    /// Condition simplification preserves truth, though not null-ness.
    #[test]
    fn condition_simplification_preserves_truth(t in arb_bool_term(), b in arb_bindings()) {
        let simplified = t.simplify_as_condition().unwrap();
        prop_assert_eq!(
            simplified.evaluate(&b).unwrap() == Constant::TRUE,
            t.evaluate(&b).unwrap() == Constant::TRUE
        );
    }

    /// A condition that holds never leaves a null-rejected variable null.
    #[test]
    fn null_rejected_variables_are_bound(t in arb_bool_term(), b in arb_bindings()) {
        if t.evaluate(&b).unwrap() == Constant::TRUE {
            for v in t.null_rejected_variables() {
                prop_assert!(!b[&v].is_null(), "{} is null but {} holds", v, t);
            }
        }
    }

    /// Applying a composition equals applying both substitutions in turn.
    #[test]
    fn composition_law(
        s1 in arb_substitution(),
        s2 in arb_substitution(),
        t in arb_bool_term()
    ) {
        prop_assert_eq!(s1.compose(&s2).apply(&t), s1.apply(&s2.apply(&t)));
    }
}

#[test]
fn test_scenario_terms() {
    let f0 = Variable::new("f0");
    let condition = strict_eq(&f0, int(2));
    let g = if_else_null(condition.clone(), var("gf1"));
    assert_eq!(g.to_string(), "IF_ELSE_NULL(EQ(f0,2),gf1)");

    let mut b = Bindings::new();
    b.insert(f0, Constant::Integer(2));
    b.insert(Variable::new("gf1"), Constant::Integer(9));
    assert_eq!(g.evaluate(&b).unwrap(), Constant::Integer(9));
}

#[test]
fn test_serde_roundtrip() {
    let t = iri_template("http://ex.org/{}", vec![var("x")]).unwrap();
    let json = serde_json::to_string(&t).unwrap();
    let back: ImmutableTerm = serde_json::from_str(&json).unwrap();
    assert_eq!(back, t);
}
