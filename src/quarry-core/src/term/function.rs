//! Function symbols and functional terms.

use std::fmt;

use common_error::{QuarryError, QuarryResult};
use serde::{Deserialize, Serialize};

use super::ImmutableTerm;

/// Function symbol of a functional term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FunctionSymbol {
    /// Strict equality (null if either side is null).
    StrictEq,
    /// Strict inequality.
    StrictNeq,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// Three-valued conjunction, at least two arguments.
    And,
    /// Three-valued disjunction, at least two arguments.
    Or,
    /// Three-valued negation.
    Not,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
    /// True only when the argument is true (never null).
    IsTrue,
    /// `IF_ELSE_NULL(condition, value)`: the value when the condition holds, null otherwise.
    IfElseNull,
    /// First non-null argument.
    Coalesce,
    /// String concatenation, null if any argument is null.
    Concat,
    /// IRI built by filling the `{}` placeholders of the template with
    /// IRI-safe encoded arguments.
    IriTemplate(String),
}

/// Number of arguments a symbol accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` arguments.
    Exact(usize),
    /// At least `n` arguments.
    AtLeast(usize),
}

impl Arity {
    /// Whether `n` arguments are accepted.
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Self::Exact(k) => n == *k,
            Self::AtLeast(k) => n >= *k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(k) => write!(f, "{k}"),
            Self::AtLeast(k) => write!(f, "at least {k}"),
        }
    }
}

impl FunctionSymbol {
    /// Display name of the symbol.
    pub fn name(&self) -> &str {
        match self {
            Self::StrictEq => "EQ",
            Self::StrictNeq => "NEQ",
            Self::LessThan => "LT",
            Self::LessThanOrEqual => "LTE",
            Self::GreaterThan => "GT",
            Self::GreaterThanOrEqual => "GTE",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::IsNull => "IS_NULL",
            Self::IsNotNull => "IS_NOT_NULL",
            Self::IsTrue => "IS_TRUE",
            Self::IfElseNull => "IF_ELSE_NULL",
            Self::Coalesce => "COALESCE",
            Self::Concat => "CONCAT",
            Self::IriTemplate(_) => "IRI",
        }
    }

    /// Accepted number of arguments.
    pub fn arity(&self) -> Arity {
        match self {
            Self::StrictEq
            | Self::StrictNeq
            | Self::LessThan
            | Self::LessThanOrEqual
            | Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::IfElseNull => Arity::Exact(2),
            Self::And | Self::Or => Arity::AtLeast(2),
            Self::Not | Self::IsNull | Self::IsNotNull | Self::IsTrue => Arity::Exact(1),
            Self::Coalesce | Self::Concat => Arity::AtLeast(1),
            Self::IriTemplate(template) => Arity::Exact(template.matches("{}").count()),
        }
    }

    /// Whether the symbol always produces a boolean (or null).
    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            Self::StrictEq
                | Self::StrictNeq
                | Self::LessThan
                | Self::LessThanOrEqual
                | Self::GreaterThan
                | Self::GreaterThanOrEqual
                | Self::And
                | Self::Or
                | Self::Not
                | Self::IsNull
                | Self::IsNotNull
                | Self::IsTrue
        )
    }

    /// Comparison symbols.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::StrictEq
                | Self::StrictNeq
                | Self::LessThan
                | Self::LessThanOrEqual
                | Self::GreaterThan
                | Self::GreaterThanOrEqual
        )
    }

    /// Whether a null argument always makes the result null.
    pub fn is_null_propagating(&self) -> bool {
        self.is_comparison() || matches!(self, Self::Not | Self::Concat | Self::IriTemplate(_))
    }
}

/// A function symbol applied to ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionalTerm {
    symbol: FunctionSymbol,
    args: Vec<ImmutableTerm>,
}

impl FunctionalTerm {
    /// Create a functional term, checking the arity of the symbol.
    pub fn new(symbol: FunctionSymbol, args: Vec<ImmutableTerm>) -> QuarryResult<Self> {
        let arity = symbol.arity();
        if !arity.accepts(args.len()) {
            return Err(QuarryError::invalid_parameter(format!(
                "{} expects {} argument(s), got {}",
                symbol.name(),
                arity,
                args.len()
            )));
        }
        Ok(Self { symbol, args })
    }

    /// Constructor for call sites whose arity is correct by construction.
    pub(crate) fn new_unchecked(symbol: FunctionSymbol, args: Vec<ImmutableTerm>) -> Self {
        debug_assert!(symbol.arity().accepts(args.len()));
        Self { symbol, args }
    }

    /// The function symbol.
    pub fn symbol(&self) -> &FunctionSymbol {
        &self.symbol
    }

    /// The arguments.
    pub fn args(&self) -> &[ImmutableTerm] {
        &self.args
    }

    /// Rebuild the term with the same symbol and new arguments.
    pub fn with_args(&self, args: Vec<ImmutableTerm>) -> Self {
        Self::new_unchecked(self.symbol.clone(), args)
    }
}

impl fmt::Display for FunctionalTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symbol {
            FunctionSymbol::IriTemplate(template) => write!(f, "IRI<{template}>(")?,
            symbol => write!(f, "{}(", symbol.name())?,
        }
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// Percent-encode every basic latin character outside `iunreserved`.
///
/// Characters outside the basic latin block are kept as they are.
pub fn encode_iri_safe(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        let reserved = c.is_ascii()
            && !c.is_ascii_alphanumeric()
            && !matches!(c, '-' | '.' | '_' | '~')
            && (' '..='}').contains(&c);
        if reserved {
            out.push_str(&format!("%{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Fill the `{}` placeholders of an IRI template.
pub fn fill_iri_template(template: &str, values: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut parts = template.split("{}");
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    for (part, value) in parts.zip(values) {
        out.push_str(&encode_iri_safe(value));
        out.push_str(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_checked() {
        let x = ImmutableTerm::from(super::super::Variable::new("x"));
        assert!(FunctionalTerm::new(FunctionSymbol::Not, vec![x.clone()]).is_ok());
        let err = FunctionalTerm::new(FunctionSymbol::And, vec![x]).unwrap_err();
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn test_iri_template_arity() {
        let symbol = FunctionSymbol::IriTemplate("http://ex.org/{}/{}".into());
        assert_eq!(symbol.arity(), Arity::Exact(2));
    }

    #[test]
    fn test_encode_iri_safe() {
        assert_eq!(encode_iri_safe("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_iri_safe("50%"), "50%25");
        assert_eq!(encode_iri_safe("x-y.z_w~"), "x-y.z_w~");
        assert_eq!(encode_iri_safe("é"), "é");
    }

    #[test]
    fn test_fill_iri_template() {
        let iri = fill_iri_template("http://ex.org/person/{}/{}", &["1".into(), "a b".into()]);
        assert_eq!(iri, "http://ex.org/person/1/a%20b");
    }
}
