//! Nullability reasoning on terms.

use std::collections::BTreeSet;

use super::{FunctionSymbol, ImmutableTerm, Variable};

impl ImmutableTerm {
    /// Whether the term may evaluate to null, given the set of variables
    /// that may be null.
    pub fn is_nullable(&self, nullable_vars: &BTreeSet<Variable>) -> bool {
        match self {
            Self::Variable(v) => nullable_vars.contains(v),
            Self::Constant(c) => c.is_null(),
            Self::Functional(f) => match f.symbol() {
                FunctionSymbol::IsNull | FunctionSymbol::IsNotNull | FunctionSymbol::IsTrue => false,
                FunctionSymbol::IfElseNull => true,
                FunctionSymbol::Coalesce => f.args().iter().all(|a| a.is_nullable(nullable_vars)),
                _ => f.args().iter().any(|a| a.is_nullable(nullable_vars)),
            },
        }
    }

    /// Variables whose nullness makes the term null.
    pub fn strict_variables(&self) -> BTreeSet<Variable> {
        match self {
            Self::Variable(v) => BTreeSet::from([v.clone()]),
            Self::Constant(_) => BTreeSet::new(),
            Self::Functional(f) => match f.symbol() {
                s if s.is_null_propagating() => {
                    f.args().iter().flat_map(Self::strict_variables).collect()
                }
                FunctionSymbol::IfElseNull => f.args().iter().flat_map(Self::strict_variables).collect(),
                FunctionSymbol::Coalesce => intersect_all(f.args().iter().map(Self::strict_variables)),
                _ => BTreeSet::new(),
            },
        }
    }

    /// Variables that are necessarily non-null whenever this condition
    /// evaluates to true.
    pub fn null_rejected_variables(&self) -> BTreeSet<Variable> {
        match self {
            Self::Variable(v) => BTreeSet::from([v.clone()]),
            Self::Constant(_) => BTreeSet::new(),
            Self::Functional(f) => {
                let args = f.args();
                match f.symbol() {
                    FunctionSymbol::And | FunctionSymbol::IfElseNull => {
                        args.iter().flat_map(Self::null_rejected_variables).collect()
                    }
                    FunctionSymbol::Or => intersect_all(args.iter().map(Self::null_rejected_variables)),
                    FunctionSymbol::IsTrue => args[0].null_rejected_variables(),
                    FunctionSymbol::IsNotNull | FunctionSymbol::Not => args[0].strict_variables(),
                    FunctionSymbol::IsNull => BTreeSet::new(),
                    _ => self.strict_variables(),
                }
            }
        }
    }
}

fn intersect_all(
    mut sets: impl Iterator<Item = BTreeSet<Variable>>,
) -> BTreeSet<Variable> {
    let Some(first) = sets.next() else {
        return BTreeSet::new();
    };
    sets.fold(first, |acc, s| acc.intersection(&s).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::*;

    fn names(set: BTreeSet<Variable>) -> Vec<String> {
        set.into_iter().map(|v| v.name().to_string()).collect()
    }

    #[test]
    fn test_is_nullable() {
        let nullable = BTreeSet::from([Variable::new("x")]);
        assert!(var("x").is_nullable(&nullable));
        assert!(!var("y").is_nullable(&nullable));
        assert!(!is_null(var("x")).is_nullable(&nullable));
        assert!(coalesce(vec![var("x"), var("x")]).is_nullable(&nullable));
        assert!(!coalesce(vec![var("x"), var("y")]).is_nullable(&nullable));
        assert!(if_else_null(boolean(true), var("y")).is_nullable(&nullable));
        assert!(concat(vec![var("y"), var("x")]).is_nullable(&nullable));
    }

    #[test]
    fn test_null_rejected_variables() {
        let cond = conjunction(vec![
            strict_eq(var("a"), var("b")),
            is_not_null(var("c")),
            is_null(var("d")),
        ])
        .unwrap();
        assert_eq!(names(cond.null_rejected_variables()), vec!["a", "b", "c"]);

        let or = disjunction(vec![
            strict_eq(var("a"), int(1)),
            conjunction(vec![strict_eq(var("a"), int(2)), is_not_null(var("b"))]).unwrap(),
        ]);
        assert_eq!(names(or.null_rejected_variables()), vec!["a"]);

        let ite = is_not_null(if_else_null(strict_eq(var("f0"), int(2)), var("g")));
        assert_eq!(names(ite.null_rejected_variables()), vec!["f0", "g"]);
    }

    #[test]
    fn test_coalesce_is_not_strict() {
        let t = coalesce(vec![var("a"), var("b")]);
        assert!(t.strict_variables().is_empty());
        let t = coalesce(vec![concat(vec![var("a"), var("b")]), var("a")]);
        assert_eq!(names(t.strict_variables()), vec!["a"]);
    }
}
