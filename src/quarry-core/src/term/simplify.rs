//! Constant folding and boolean simplification.

use common_error::QuarryResult;

use super::{boolean, null, Bindings, FunctionSymbol, ImmutableTerm};
use crate::types::Constant;

impl ImmutableTerm {
    /// Simplify the term under SQL three-valued logic.
    ///
    /// The result is equivalent to the input in every context. Ground
    /// sub-terms are folded, which may surface a `TypeError`.
    pub fn simplify(&self) -> QuarryResult<Self> {
        match self {
            Self::Variable(_) | Self::Constant(_) => Ok(self.clone()),
            Self::Functional(f) => {
                let args = f
                    .args()
                    .iter()
                    .map(Self::simplify)
                    .collect::<QuarryResult<Vec<_>>>()?;
                simplify_function(f.symbol(), args)
            }
        }
    }

    /// Simplify a term used as a condition (filter, join or `IF_ELSE_NULL`
    /// condition), where `NULL` and `FALSE` are indistinguishable.
    pub fn simplify_as_condition(&self) -> QuarryResult<Self> {
        as_condition(self.simplify()?)
    }
}

fn as_condition(term: ImmutableTerm) -> QuarryResult<ImmutableTerm> {
    let ImmutableTerm::Functional(f) = &term else {
        return Ok(if term.is_null_constant() {
            boolean(false)
        } else {
            term
        });
    };
    let args = f.args();
    match f.symbol() {
        FunctionSymbol::IsTrue => as_condition(args[0].clone()),
        FunctionSymbol::And => {
            let args = args
                .iter()
                .cloned()
                .map(as_condition)
                .collect::<QuarryResult<Vec<_>>>()?;
            simplify_function(&FunctionSymbol::And, args)
        }
        FunctionSymbol::Or => {
            let args = args
                .iter()
                .cloned()
                .map(as_condition)
                .collect::<QuarryResult<Vec<_>>>()?;
            simplify_function(&FunctionSymbol::Or, args)
        }
        FunctionSymbol::StrictEq if args[0] == args[1] => {
            simplify_function(&FunctionSymbol::IsNotNull, vec![args[0].clone()])
        }
        FunctionSymbol::IfElseNull => {
            let condition = as_condition(args[0].clone())?;
            let value = as_condition(args[1].clone())?;
            simplify_function(&FunctionSymbol::And, vec![condition, value])
        }
        FunctionSymbol::IsNotNull => match args[0].as_functional() {
            Some(inner) if *inner.symbol() == FunctionSymbol::IfElseNull => {
                let condition = as_condition(inner.args()[0].clone())?;
                let value_not_null =
                    simplify_function(&FunctionSymbol::IsNotNull, vec![inner.args()[1].clone()])?;
                simplify_function(&FunctionSymbol::And, vec![condition, value_not_null])
            }
            _ => Ok(term.clone()),
        },
        _ => Ok(term.clone()),
    }
}

/// Simplify a function application whose arguments are already simplified.
fn simplify_function(
    symbol: &FunctionSymbol,
    args: Vec<ImmutableTerm>,
) -> QuarryResult<ImmutableTerm> {
    let term = match symbol {
        FunctionSymbol::And => return Ok(simplify_junction(args, true)),
        FunctionSymbol::Or => return Ok(simplify_junction(args, false)),
        FunctionSymbol::Not => {
            if let Some(inner) = args[0].as_functional() {
                if *inner.symbol() == FunctionSymbol::Not {
                    return Ok(inner.args()[0].clone());
                }
            }
            ImmutableTerm::function_unchecked(FunctionSymbol::Not, args)
        }
        FunctionSymbol::IfElseNull => {
            let mut args = args;
            args[0] = as_condition(args[0].clone())?;
            if args[0].is_true() {
                return Ok(args[1].clone());
            }
            if args[0].is_false() || args[0].is_null_constant() || args[1].is_null_constant() {
                return Ok(null());
            }
            ImmutableTerm::function_unchecked(FunctionSymbol::IfElseNull, args)
        }
        FunctionSymbol::Coalesce => return simplify_coalesce(args),
        FunctionSymbol::IsNotNull => {
            if let Some(inner) = args[0].as_functional() {
                match inner.symbol() {
                    FunctionSymbol::IfElseNull
                        if matches!(&inner.args()[1], ImmutableTerm::Constant(c) if !c.is_null()) =>
                    {
                        return simplify_function(
                            &FunctionSymbol::IsTrue,
                            vec![inner.args()[0].clone()],
                        );
                    }
                    FunctionSymbol::Concat | FunctionSymbol::IriTemplate(_) => {
                        let checks = inner
                            .args()
                            .iter()
                            .map(|a| simplify_function(&FunctionSymbol::IsNotNull, vec![a.clone()]))
                            .collect::<QuarryResult<Vec<_>>>()?;
                        return Ok(simplify_junction(checks, true));
                    }
                    FunctionSymbol::IsNull | FunctionSymbol::IsNotNull | FunctionSymbol::IsTrue => {
                        return Ok(boolean(true));
                    }
                    _ => {}
                }
            }
            ImmutableTerm::function_unchecked(FunctionSymbol::IsNotNull, args)
        }
        FunctionSymbol::IsTrue => {
            let never_null = matches!(
                args[0].as_functional().map(|f| f.symbol()),
                Some(FunctionSymbol::IsNull | FunctionSymbol::IsNotNull | FunctionSymbol::IsTrue)
            );
            if never_null {
                return Ok(args[0].clone());
            }
            ImmutableTerm::function_unchecked(FunctionSymbol::IsTrue, args)
        }
        other => ImmutableTerm::function_unchecked(other.clone(), args),
    };
    fold_if_ground(term)
}

fn fold_if_ground(term: ImmutableTerm) -> QuarryResult<ImmutableTerm> {
    let all_constant_args = term
        .as_functional()
        .is_some_and(|f| f.args().iter().all(|a| a.as_constant().is_some()));
    if all_constant_args {
        Ok(ImmutableTerm::Constant(term.evaluate(&Bindings::new())?))
    } else {
        Ok(term)
    }
}

/// Conjunction (`is_and`) or disjunction of simplified arguments.
fn simplify_junction(args: Vec<ImmutableTerm>, is_and: bool) -> ImmutableTerm {
    let (symbol, absorbing) = if is_and {
        (FunctionSymbol::And, false)
    } else {
        (FunctionSymbol::Or, true)
    };
    let mut flat: Vec<ImmutableTerm> = Vec::new();
    let mut saw_null = false;
    let mut stack: Vec<ImmutableTerm> = args.into_iter().rev().collect();
    while let Some(arg) = stack.pop() {
        match &arg {
            ImmutableTerm::Functional(f) if *f.symbol() == symbol => {
                stack.extend(f.args().iter().rev().cloned());
            }
            ImmutableTerm::Constant(Constant::Boolean(b)) => {
                if *b == absorbing {
                    return boolean(absorbing);
                }
            }
            ImmutableTerm::Constant(Constant::Null) => saw_null = true,
            _ => {
                if !flat.contains(&arg) {
                    flat.push(arg.clone());
                }
            }
        }
    }
    if saw_null {
        flat.push(null());
    }
    match flat.len() {
        0 => boolean(!absorbing),
        1 => flat.remove(0),
        _ => ImmutableTerm::function_unchecked(symbol, flat),
    }
}

fn simplify_coalesce(args: Vec<ImmutableTerm>) -> QuarryResult<ImmutableTerm> {
    let mut kept: Vec<ImmutableTerm> = Vec::new();
    for arg in args {
        if arg.is_null_constant() || kept.contains(&arg) {
            continue;
        }
        let stops = arg.as_constant().is_some();
        kept.push(arg);
        if stops {
            break;
        }
    }
    Ok(match kept.len() {
        0 => null(),
        1 => kept.remove(0),
        _ => ImmutableTerm::function_unchecked(FunctionSymbol::Coalesce, kept),
    })
}
