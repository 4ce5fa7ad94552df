//! Typed evaluation and type inference of terms.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use common_error::{QuarryError, QuarryResult};

use super::{fill_iri_template, FunctionSymbol, FunctionalTerm, ImmutableTerm, Variable};
use crate::types::{Constant, DbType, TermType};

/// Assignment of values to variables.
pub type Bindings = BTreeMap<Variable, Constant>;

impl ImmutableTerm {
    /// Evaluate the term under the given bindings, following SQL
    /// three-valued logic. Unbound variables are an `InvalidParameter` error
    /// and ill-typed operations a `TypeError`.
    pub fn evaluate(&self, bindings: &Bindings) -> QuarryResult<Constant> {
        match self {
            Self::Variable(v) => bindings.get(v).cloned().ok_or_else(|| {
                QuarryError::invalid_parameter(format!("variable {v} is not bound"))
            }),
            Self::Constant(c) => Ok(c.clone()),
            Self::Functional(f) => evaluate_function(f, bindings),
        }
    }

    /// Infer the type of the term; variables have no known type.
    pub fn infer_type(&self) -> QuarryResult<Option<TermType>> {
        self.infer_type_with(&|_| None)
    }

    /// Infer the type of the term, looking variable types up in `var_type`.
    ///
    /// Mismatched operand types are a `TypeError`.
    pub fn infer_type_with(
        &self,
        var_type: &dyn Fn(&Variable) -> Option<TermType>,
    ) -> QuarryResult<Option<TermType>> {
        match self {
            Self::Variable(v) => Ok(var_type(v)),
            Self::Constant(c) => Ok(c.term_type()),
            Self::Functional(f) => {
                let arg_types = f
                    .args()
                    .iter()
                    .map(|a| a.infer_type_with(var_type))
                    .collect::<QuarryResult<Vec<_>>>()?;
                infer_function_type(f, &arg_types)
            }
        }
    }
}

fn infer_function_type(
    f: &FunctionalTerm,
    arg_types: &[Option<TermType>],
) -> QuarryResult<Option<TermType>> {
    let symbol = f.symbol();
    match symbol {
        s if s.is_comparison() => {
            if let (Some(a), Some(b)) = (&arg_types[0], &arg_types[1]) {
                if !a.is_comparable_with(b) {
                    common_error::type_err!(
                        "{}: cannot compare {a} with {b} in {f}",
                        s.name()
                    );
                }
            }
            Ok(Some(TermType::BOOLEAN))
        }
        FunctionSymbol::And | FunctionSymbol::Or | FunctionSymbol::Not | FunctionSymbol::IsTrue => {
            for t in arg_types.iter().flatten() {
                if !t.is_boolean() {
                    common_error::type_err!(
                        "{} expects boolean arguments, got {t} in {f}",
                        symbol.name()
                    );
                }
            }
            Ok(Some(TermType::BOOLEAN))
        }
        FunctionSymbol::IsNull | FunctionSymbol::IsNotNull => Ok(Some(TermType::BOOLEAN)),
        FunctionSymbol::IfElseNull => {
            if let Some(t) = &arg_types[0] {
                if !t.is_boolean() {
                    common_error::type_err!(
                        "IF_ELSE_NULL expects a boolean condition, got {t} in {f}"
                    );
                }
            }
            Ok(arg_types[1])
        }
        FunctionSymbol::Coalesce => {
            let mut known = arg_types.iter().flatten();
            let first = known.next().copied();
            if let Some(first) = first {
                if let Some(other) = known.find(|t| !t.is_comparable_with(&first)) {
                    common_error::type_err!(
                        "COALESCE mixes {first} and {other} in {f}"
                    );
                }
            }
            Ok(first)
        }
        FunctionSymbol::Concat => Ok(Some(TermType::Db(DbType::Varchar))),
        FunctionSymbol::IriTemplate(_) => Ok(Some(TermType::Iri)),
        // Comparisons are handled by the guard above.
        _ => Ok(Some(TermType::BOOLEAN)),
    }
}

fn expect_boolean(value: &Constant, symbol: &FunctionSymbol) -> QuarryResult<Option<bool>> {
    match value {
        Constant::Null => Ok(None),
        Constant::Boolean(b) => Ok(Some(*b)),
        other => Err(QuarryError::type_error(format!(
            "{} expects a boolean, got {}",
            symbol.name(),
            other.type_name()
        ))),
    }
}

fn from_three_valued(value: Option<bool>) -> Constant {
    value.map_or(Constant::Null, Constant::Boolean)
}

fn evaluate_function(f: &FunctionalTerm, bindings: &Bindings) -> QuarryResult<Constant> {
    let symbol = f.symbol();
    let args = f.args();
    match symbol {
        FunctionSymbol::IfElseNull => {
            let condition = args[0].evaluate(bindings)?;
            match expect_boolean(&condition, symbol)? {
                Some(true) => args[1].evaluate(bindings),
                _ => Ok(Constant::Null),
            }
        }
        FunctionSymbol::Coalesce => {
            for arg in args {
                let value = arg.evaluate(bindings)?;
                if !value.is_null() {
                    return Ok(value);
                }
            }
            Ok(Constant::Null)
        }
        _ => {
            let values = args
                .iter()
                .map(|a| a.evaluate(bindings))
                .collect::<QuarryResult<Vec<_>>>()?;
            apply_strict_function(symbol, &values)
        }
    }
}

fn apply_strict_function(symbol: &FunctionSymbol, values: &[Constant]) -> QuarryResult<Constant> {
    let compare = |accept: fn(Ordering) -> bool| -> QuarryResult<Constant> {
        Ok(from_three_valued(
            values[0].sql_cmp(&values[1])?.map(accept),
        ))
    };
    match symbol {
        FunctionSymbol::StrictEq => Ok(from_three_valued(values[0].sql_eq(&values[1])?)),
        FunctionSymbol::StrictNeq => Ok(from_three_valued(
            values[0].sql_eq(&values[1])?.map(|b| !b),
        )),
        FunctionSymbol::LessThan => compare(Ordering::is_lt),
        FunctionSymbol::LessThanOrEqual => compare(Ordering::is_le),
        FunctionSymbol::GreaterThan => compare(Ordering::is_gt),
        FunctionSymbol::GreaterThanOrEqual => compare(Ordering::is_ge),
        FunctionSymbol::And => {
            let mut saw_null = false;
            for v in values {
                match expect_boolean(v, symbol)? {
                    Some(false) => return Ok(Constant::FALSE),
                    None => saw_null = true,
                    Some(true) => {}
                }
            }
            Ok(if saw_null { Constant::Null } else { Constant::TRUE })
        }
        FunctionSymbol::Or => {
            let mut saw_null = false;
            for v in values {
                match expect_boolean(v, symbol)? {
                    Some(true) => return Ok(Constant::TRUE),
                    None => saw_null = true,
                    Some(false) => {}
                }
            }
            Ok(if saw_null { Constant::Null } else { Constant::FALSE })
        }
        FunctionSymbol::Not => Ok(from_three_valued(
            expect_boolean(&values[0], symbol)?.map(|b| !b),
        )),
        FunctionSymbol::IsNull => Ok(Constant::Boolean(values[0].is_null())),
        FunctionSymbol::IsNotNull => Ok(Constant::Boolean(!values[0].is_null())),
        FunctionSymbol::IsTrue => Ok(Constant::Boolean(
            expect_boolean(&values[0], symbol)? == Some(true),
        )),
        FunctionSymbol::Concat => {
            let mut out = String::new();
            for v in values {
                match v.lexical_form() {
                    Some(s) => out.push_str(&s),
                    None => return Ok(Constant::Null),
                }
            }
            Ok(Constant::String(out))
        }
        FunctionSymbol::IriTemplate(template) => {
            let mut parts = Vec::with_capacity(values.len());
            for v in values {
                match v.lexical_form() {
                    Some(s) => parts.push(s),
                    None => return Ok(Constant::Null),
                }
            }
            Ok(Constant::Iri(fill_iri_template(template, &parts)))
        }
        FunctionSymbol::IfElseNull | FunctionSymbol::Coalesce => Err(QuarryError::internal(
            format!("{} is not a strict function", symbol.name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::*;

    fn bindings(pairs: &[(&str, Constant)]) -> Bindings {
        pairs
            .iter()
            .map(|(n, c)| (Variable::new(*n), c.clone()))
            .collect()
    }

    #[test]
    fn test_evaluate_three_valued_logic() {
        let b = bindings(&[("x", Constant::Null), ("y", Constant::Integer(1))]);
        let eq = strict_eq(var("x"), var("y"));
        assert_eq!(eq.evaluate(&b).unwrap(), Constant::Null);

        let and = conjunction(vec![eq.clone(), boolean(false)]).unwrap();
        assert_eq!(and.evaluate(&b).unwrap(), Constant::FALSE);

        let or = disjunction(vec![eq.clone(), boolean(true)]);
        assert_eq!(or.evaluate(&b).unwrap(), Constant::TRUE);

        assert_eq!(is_true(eq).evaluate(&b).unwrap(), Constant::FALSE);
    }

    #[test]
    fn test_evaluate_if_else_null() {
        let t = if_else_null(strict_eq(var("f0"), int(2)), var("g"));
        let hit = bindings(&[("f0", Constant::Integer(2)), ("g", "v".into())]);
        let miss = bindings(&[("f0", Constant::Integer(3)), ("g", "v".into())]);
        assert_eq!(t.evaluate(&hit).unwrap(), Constant::from("v"));
        assert_eq!(t.evaluate(&miss).unwrap(), Constant::Null);
    }

    #[test]
    fn test_evaluate_iri_template() {
        let t = iri_template("http://ex.org/{}", vec![var("x")]).unwrap();
        let b = bindings(&[("x", "a b".into())]);
        assert_eq!(
            t.evaluate(&b).unwrap(),
            Constant::Iri("http://ex.org/a%20b".into())
        );
        let b = bindings(&[("x", Constant::Null)]);
        assert_eq!(t.evaluate(&b).unwrap(), Constant::Null);
    }

    #[test]
    fn test_evaluate_errors() {
        let unbound = var("z").evaluate(&Bindings::new()).unwrap_err();
        assert!(matches!(unbound, QuarryError::InvalidParameter(_)));

        let ill_typed = not(int(1)).evaluate(&Bindings::new()).unwrap_err();
        assert!(matches!(ill_typed, QuarryError::TypeError(_)));
    }

    #[test]
    fn test_infer_type() {
        assert_eq!(
            strict_eq(var("x"), int(1)).infer_type().unwrap(),
            Some(TermType::BOOLEAN)
        );
        assert_eq!(
            if_else_null(boolean(true), string("a")).infer_type().unwrap(),
            Some(TermType::Db(DbType::Varchar))
        );
        assert!(strict_eq(int(1), string("a")).infer_type().is_err());
        assert!(conjunction(vec![var("a"), int(3)]).unwrap().infer_type().is_err());
    }

    #[test]
    fn test_infer_type_with_variable_types() {
        let lookup = |v: &Variable| {
            (v.name() == "name").then_some(TermType::Db(DbType::Varchar))
        };
        let t = less_than(var("name"), int(3));
        assert!(t.infer_type_with(&lookup).is_err());
        assert!(t.infer_type().is_ok());
    }
}
