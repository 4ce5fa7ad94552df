//! Optimization followed by SQL generation and extraction.

use proptest::prelude::*;
use quarry_core::term::{int, is_not_null, strict_eq, var};
use quarry_core::testing::{foreign_key_metadata, keyed_relation_metadata, nullable_unique_metadata};
use quarry_core::{FunctionSymbol, ImmutableTerm, MetadataProvider, ProjectionAtom, Variable};
use quarry_iq::{IQTree, IQ};
use quarry_sql::{extract_signature, extract_sql, ExtractedSql, NativeQueryGenerator};

fn v(name: &str) -> Variable {
    Variable::new(name)
}

fn ext(relation: &str, args: &[(usize, ImmutableTerm)]) -> IQTree {
    IQTree::extensional(relation, args.iter().cloned()).unwrap()
}

fn query(names: &[&str], tree: IQTree) -> IQ {
    let answer = ProjectionAtom::new("ans", names.iter().map(|n| v(n)).collect()).unwrap();
    IQ::new(answer, tree).unwrap()
}

fn compile(iq: IQ, metadata: &dyn MetadataProvider) -> ExtractedSql {
    let optimized = quarry_optimizer::optimize(iq, metadata).unwrap();
    let generated = NativeQueryGenerator::new(metadata).generate(optimized).unwrap();
    generated.validate_with_metadata(metadata).unwrap();
    extract_sql(&generated).unwrap()
}

#[test]
fn test_self_join_compiles_to_single_scan() {
    let tree = IQTree::inner_join(vec![
        ext("TABLE1", &[(0, var("a"))]),
        ext("TABLE1", &[(0, var("a")), (2, var("e"))]),
    ]);
    let extracted = compile(query(&["a", "e"], tree), &nullable_unique_metadata());
    assert_eq!(
        extracted.sql,
        r#"SELECT "table1_0"."col1" AS "a", "table1_0"."col3" AS "e" FROM "TABLE1" AS "table1_0" WHERE "table1_0"."col1" IS NOT NULL"#
    );
    assert_eq!(extracted.signature, vec![v("a"), v("e")]);
}

#[test]
fn test_left_join_on_primary_key_compiles_without_join() {
    let tree = IQTree::left_join(
        ext("R", &[(0, var("x")), (1, var("y")), (2, var("z"))]),
        ext("R", &[(0, var("x")), (1, int(2)), (2, var("g"))]),
    );
    let metadata = keyed_relation_metadata();
    let optimized = quarry_optimizer::optimize(query(&["x", "g"], tree), &metadata).unwrap();
    let generated = NativeQueryGenerator::new(&metadata).generate(optimized).unwrap();

    let IQTree::Construction { node, child } = generated.tree() else {
        panic!("root construction expected");
    };
    assert!(node.substitution().get(&v("g")).is_some());
    let IQTree::Native(native) = &**child else {
        panic!("native leaf expected");
    };
    assert_eq!(native.signature(), &[v("f0"), v("gf1"), v("x")]);
    assert_eq!(
        native.sql(),
        r#"SELECT "r_0"."a" AS "f0", "r_0"."b" AS "gf1", "r_0"."k" AS "x" FROM "R" AS "r_0""#
    );
    assert_eq!(extract_signature(&generated).unwrap(), vec![v("x"), v("g")]);
}

#[test]
fn test_left_join_on_primary_key_returns_answer_definitions() {
    let tree = IQTree::left_join(
        ext("R", &[(0, var("x")), (1, var("y")), (2, var("z"))]),
        ext("R", &[(0, var("x")), (1, int(2)), (2, var("g"))]),
    );
    let extracted = compile(query(&["x", "g"], tree), &keyed_relation_metadata());
    assert_eq!(extracted.signature, vec![v("x"), v("g")]);
    assert_eq!(extracted.columns, vec![v("f0"), v("gf1"), v("x")]);
    assert!(!extracted.columns.contains(&v("g")));

    assert_eq!(extracted.answer_term(&v("x")), var("x"));
    let g = extracted.answer_term(&v("g"));
    let ImmutableTerm::Functional(f) = &g else {
        panic!("g should be computed from the columns");
    };
    assert_eq!(f.symbol(), &FunctionSymbol::IfElseNull);
    let used = g.variables();
    assert!(used.iter().all(|c| extracted.columns.contains(c)), "{used:?}");
}

#[test]
fn test_foreign_key_join_compiles_to_single_scan() {
    let tree = IQTree::inner_join(vec![
        ext("ADDRESS", &[(1, var("p")), (2, var("city"))]),
        ext("PERSON", &[(0, var("p"))]),
    ]);
    let extracted = compile(query(&["city"], tree), &foreign_key_metadata());
    assert_eq!(
        extracted.sql,
        r#"SELECT "address_0"."city" AS "city" FROM "ADDRESS" AS "address_0""#
    );
}

#[test]
fn test_kept_left_join_renders_outer_join() {
    let tree = IQTree::left_join(
        ext("TABLE1", &[(0, var("a"))]),
        ext("TABLE1", &[(0, var("a")), (1, int(2)), (2, var("g"))]),
    );
    let extracted = compile(query(&["a", "g"], tree), &nullable_unique_metadata());
    assert!(extracted.sql.contains("LEFT OUTER JOIN"), "{}", extracted.sql);
    assert_eq!(extracted.signature, vec![v("a"), v("g")]);
}

#[test]
fn test_empty_query_is_reported() {
    let tree = IQTree::filter(strict_eq(int(1), int(2)), ext("TABLE1", &[(0, var("a"))]));
    let metadata = nullable_unique_metadata();
    let optimized = quarry_optimizer::optimize(query(&["a"], tree), &metadata).unwrap();
    let generated = NativeQueryGenerator::new(&metadata)
        .generate(optimized.clone())
        .unwrap();
    assert_eq!(generated, optimized);
    assert!(extract_sql(&generated).unwrap_err().is_empty_query());
}

const VARS: [&str; 3] = ["a", "b", "c"];

fn arb_leaf() -> impl Strategy<Value = IQTree> {
    (
        prop::sample::select(vec!["TABLE1", "TABLE2"]),
        prop::sample::select(VARS.to_vec()),
        prop::option::of(prop::sample::select(VARS.to_vec())),
        prop::option::of(0i64..3),
    )
        .prop_map(|(relation, key, second, third)| {
            let mut args = vec![(0, var(key))];
            args.extend(second.map(|s| (1, var(s))));
            args.extend(third.map(|c| (2, int(c))));
            ext(relation, &args)
        })
}

fn arb_tree() -> impl Strategy<Value = IQTree> {
    arb_leaf().prop_recursive(3, 10, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 2..4).prop_map(IQTree::inner_join),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| IQTree::left_join(l, r)),
            inner.prop_map(|t| match t.variables().into_iter().next() {
                Some(x) => IQTree::filter(is_not_null(x), t),
                None => t,
            }),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every non-empty optimized query compiles to SQL whose signature is
    /// the answer.
    #[test]
    fn compiled_signature_matches_answer(tree in arb_tree()) {
        let metadata = nullable_unique_metadata();
        let answer: Vec<Variable> = tree.variables().into_iter().collect();
        let names: Vec<&str> = answer.iter().map(|v| v.name()).collect();
        let optimized = quarry_optimizer::optimize(query(&names, tree), &metadata).unwrap();
        prop_assume!(!optimized.is_declared_empty());
        let generated = NativeQueryGenerator::new(&metadata).generate(optimized).unwrap();
        prop_assert!(generated.validate_with_metadata(&metadata).is_ok());
        let extracted = extract_sql(&generated).unwrap();
        prop_assert!(extracted.sql.starts_with("SELECT "));
        prop_assert_eq!(extracted.signature, answer);
    }
}
