//! Immutable terms: variables, constants and functional terms.
//!
//! Terms are referentially transparent values. Two structurally equal terms
//! are interchangeable everywhere.

mod evaluate;
mod function;
mod nullability;
mod simplify;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::substitution::Substitution;
use crate::types::Constant;

pub use evaluate::Bindings;
pub use function::{encode_iri_safe, fill_iri_template, Arity, FunctionSymbol, FunctionalTerm};

/// A variable, scoped to one query tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variable(String);

impl Variable {
    /// Create a variable with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The variable name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Variable {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A term of the query algebra.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImmutableTerm {
    /// A variable.
    Variable(Variable),
    /// A ground value.
    Constant(Constant),
    /// A function symbol applied to terms.
    Functional(FunctionalTerm),
}

impl ImmutableTerm {
    /// Create a functional term, checking the arity of the symbol.
    pub fn function(
        symbol: FunctionSymbol,
        args: Vec<ImmutableTerm>,
    ) -> common_error::QuarryResult<Self> {
        FunctionalTerm::new(symbol, args).map(Self::Functional)
    }

    pub(crate) fn function_unchecked(symbol: FunctionSymbol, args: Vec<ImmutableTerm>) -> Self {
        Self::Functional(FunctionalTerm::new_unchecked(symbol, args))
    }

    /// Get as a variable.
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Get as a constant.
    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Self::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Get as a functional term.
    pub fn as_functional(&self) -> Option<&FunctionalTerm> {
        match self {
            Self::Functional(f) => Some(f),
            _ => None,
        }
    }

    /// Whether this is the boolean constant `TRUE`.
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Constant(Constant::Boolean(true)))
    }

    /// Whether this is the boolean constant `FALSE`.
    pub fn is_false(&self) -> bool {
        matches!(self, Self::Constant(Constant::Boolean(false)))
    }

    /// Whether this is the `NULL` constant.
    pub fn is_null_constant(&self) -> bool {
        matches!(self, Self::Constant(Constant::Null))
    }

    /// Whether the term contains no variable.
    pub fn is_ground(&self) -> bool {
        match self {
            Self::Variable(_) => false,
            Self::Constant(_) => true,
            Self::Functional(f) => f.args().iter().all(Self::is_ground),
        }
    }

    /// Variables occurring in the term.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    /// Add the variables of the term to `vars`.
    pub fn collect_variables(&self, vars: &mut BTreeSet<Variable>) {
        match self {
            Self::Variable(v) => {
                vars.insert(v.clone());
            }
            Self::Constant(_) => {}
            Self::Functional(f) => f.args().iter().for_each(|a| a.collect_variables(vars)),
        }
    }

    /// Whether `v` occurs in the term.
    pub fn contains_variable(&self, v: &Variable) -> bool {
        match self {
            Self::Variable(w) => w == v,
            Self::Constant(_) => false,
            Self::Functional(f) => f.args().iter().any(|a| a.contains_variable(v)),
        }
    }

    /// Apply a substitution, replacing every variable of its domain at once.
    pub fn apply(&self, substitution: &Substitution) -> Self {
        match self {
            Self::Variable(v) => substitution
                .get(v)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            Self::Constant(_) => self.clone(),
            Self::Functional(f) => Self::Functional(
                f.with_args(f.args().iter().map(|a| a.apply(substitution)).collect()),
            ),
        }
    }

    /// The conjuncts of the term, flattening nested `AND`s.
    pub fn conjuncts(&self) -> Vec<ImmutableTerm> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts(&self, out: &mut Vec<ImmutableTerm>) {
        match self {
            Self::Functional(f) if *f.symbol() == FunctionSymbol::And => {
                f.args().iter().for_each(|a| a.collect_conjuncts(out));
            }
            other => out.push(other.clone()),
        }
    }
}

impl fmt::Display for ImmutableTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(v) => write!(f, "{v}"),
            Self::Constant(c) => write!(f, "{c}"),
            Self::Functional(t) => write!(f, "{t}"),
        }
    }
}

impl From<Variable> for ImmutableTerm {
    fn from(v: Variable) -> Self {
        Self::Variable(v)
    }
}

impl From<&Variable> for ImmutableTerm {
    fn from(v: &Variable) -> Self {
        Self::Variable(v.clone())
    }
}

impl From<Constant> for ImmutableTerm {
    fn from(c: Constant) -> Self {
        Self::Constant(c)
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

/// Variable term.
pub fn var(name: &str) -> ImmutableTerm {
    ImmutableTerm::Variable(Variable::new(name))
}

/// Integer constant term.
pub fn int(value: i64) -> ImmutableTerm {
    ImmutableTerm::Constant(Constant::Integer(value))
}

/// String constant term.
pub fn string(value: &str) -> ImmutableTerm {
    ImmutableTerm::Constant(Constant::String(value.to_string()))
}

/// IRI constant term.
pub fn iri(value: &str) -> ImmutableTerm {
    ImmutableTerm::Constant(Constant::Iri(value.to_string()))
}

/// Boolean constant term.
pub fn boolean(value: bool) -> ImmutableTerm {
    ImmutableTerm::Constant(Constant::Boolean(value))
}

/// The `NULL` constant term.
pub fn null() -> ImmutableTerm {
    ImmutableTerm::Constant(Constant::Null)
}

/// `EQ(left, right)`
pub fn strict_eq(left: impl Into<ImmutableTerm>, right: impl Into<ImmutableTerm>) -> ImmutableTerm {
    ImmutableTerm::function_unchecked(FunctionSymbol::StrictEq, vec![left.into(), right.into()])
}

/// `NEQ(left, right)`
pub fn strict_neq(left: ImmutableTerm, right: ImmutableTerm) -> ImmutableTerm {
    ImmutableTerm::function_unchecked(FunctionSymbol::StrictNeq, vec![left, right])
}

/// `LT(left, right)`
pub fn less_than(left: ImmutableTerm, right: ImmutableTerm) -> ImmutableTerm {
    ImmutableTerm::function_unchecked(FunctionSymbol::LessThan, vec![left, right])
}

/// `GT(left, right)`
pub fn greater_than(left: ImmutableTerm, right: ImmutableTerm) -> ImmutableTerm {
    ImmutableTerm::function_unchecked(FunctionSymbol::GreaterThan, vec![left, right])
}

/// `NOT(term)`
pub fn not(term: ImmutableTerm) -> ImmutableTerm {
    ImmutableTerm::function_unchecked(FunctionSymbol::Not, vec![term])
}

/// `IS_NULL(term)`
pub fn is_null(term: impl Into<ImmutableTerm>) -> ImmutableTerm {
    ImmutableTerm::function_unchecked(FunctionSymbol::IsNull, vec![term.into()])
}

/// `IS_NOT_NULL(term)`
pub fn is_not_null(term: impl Into<ImmutableTerm>) -> ImmutableTerm {
    ImmutableTerm::function_unchecked(FunctionSymbol::IsNotNull, vec![term.into()])
}

/// `IS_TRUE(term)`
pub fn is_true(term: ImmutableTerm) -> ImmutableTerm {
    ImmutableTerm::function_unchecked(FunctionSymbol::IsTrue, vec![term])
}

/// `IF_ELSE_NULL(condition, value)`
pub fn if_else_null(condition: ImmutableTerm, value: ImmutableTerm) -> ImmutableTerm {
    ImmutableTerm::function_unchecked(FunctionSymbol::IfElseNull, vec![condition, value])
}

/// `COALESCE(terms...)`, `NULL` when empty.
pub fn coalesce(terms: Vec<ImmutableTerm>) -> ImmutableTerm {
    if terms.is_empty() {
        return null();
    }
    ImmutableTerm::function_unchecked(FunctionSymbol::Coalesce, terms)
}

/// `CONCAT(terms...)`, the empty string when empty.
pub fn concat(terms: Vec<ImmutableTerm>) -> ImmutableTerm {
    if terms.is_empty() {
        return string("");
    }
    ImmutableTerm::function_unchecked(FunctionSymbol::Concat, terms)
}

/// IRI built from a template with `{}` placeholders.
pub fn iri_template(
    template: &str,
    args: Vec<ImmutableTerm>,
) -> common_error::QuarryResult<ImmutableTerm> {
    ImmutableTerm::function(FunctionSymbol::IriTemplate(template.to_string()), args)
}

/// `OR(terms...)`, `FALSE` when empty and the term itself for a singleton.
pub fn disjunction(terms: Vec<ImmutableTerm>) -> ImmutableTerm {
    let mut terms = terms;
    match terms.len() {
        0 => boolean(false),
        1 => terms.remove(0),
        _ => ImmutableTerm::function_unchecked(FunctionSymbol::Or, terms),
    }
}

/// `AND` of the given terms with nested conjunctions flattened and
/// duplicates removed. `None` when nothing is left.
pub fn conjunction(terms: impl IntoIterator<Item = ImmutableTerm>) -> Option<ImmutableTerm> {
    let mut flat: Vec<ImmutableTerm> = Vec::new();
    for term in terms {
        for conjunct in term.conjuncts() {
            if !conjunct.is_true() && !flat.contains(&conjunct) {
                flat.push(conjunct);
            }
        }
    }
    match flat.len() {
        0 => None,
        1 => flat.pop(),
        _ => Some(ImmutableTerm::function_unchecked(FunctionSymbol::And, flat)),
    }
}

/// Conjunction of an optional condition with additional conjuncts.
pub fn and_optional(
    condition: Option<&ImmutableTerm>,
    others: impl IntoIterator<Item = ImmutableTerm>,
) -> Option<ImmutableTerm> {
    conjunction(condition.cloned().into_iter().chain(others))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables_and_ground() {
        let t = if_else_null(strict_eq(var("f0"), int(2)), var("gf1"));
        let vars: Vec<_> = t.variables().into_iter().map(|v| v.name().to_string()).collect();
        assert_eq!(vars, vec!["f0", "gf1"]);
        assert!(!t.is_ground());
        assert!(strict_eq(int(1), int(2)).is_ground());
        assert!(t.contains_variable(&Variable::new("gf1")));
    }

    #[test]
    fn test_conjunction_flattens() {
        let c = conjunction(vec![
            conjunction(vec![is_not_null(var("a")), is_not_null(var("b"))]).unwrap(),
            is_not_null(var("a")),
            boolean(true),
        ])
        .unwrap();
        assert_eq!(c.conjuncts().len(), 2);
        assert_eq!(conjunction(vec![boolean(true)]), None);
        assert_eq!(conjunction(vec![var("x")]), Some(var("x")));
    }

    #[test]
    fn test_display() {
        let t = if_else_null(strict_eq(var("f0"), string("two")), var("gf1"));
        assert_eq!(t.to_string(), "IF_ELSE_NULL(EQ(f0,\"two\"),gf1)");
        let iri = iri_template("http://ex.org/{}", vec![var("x")]).unwrap();
        assert_eq!(iri.to_string(), "IRI<http://ex.org/{}>(x)");
    }

    #[test]
    fn test_apply_is_simultaneous() {
        let s = Substitution::from_pairs(vec![
            (Variable::new("x"), var("y")),
            (Variable::new("y"), var("x")),
        ]);
        let t = strict_eq(var("x"), var("y")).apply(&s);
        assert_eq!(t, strict_eq(var("y"), var("x")));
    }
}
