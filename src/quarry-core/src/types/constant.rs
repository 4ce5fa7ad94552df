//! Ground values appearing in terms.

use std::cmp::Ordering;
use std::fmt;

use common_error::{QuarryError, QuarryResult};
use serde::{Deserialize, Serialize};

use super::{DbType, TermType};

/// A ground value.
///
/// `Null` is the SQL null. `Provenance` is a non-null marker used to detect
/// whether an optional branch matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Constant {
    /// SQL null.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// Character string.
    String(String),
    /// IRI.
    Iri(String),
    /// Provenance marker.
    Provenance,
}

impl Constant {
    /// Boolean true.
    pub const TRUE: Self = Self::Boolean(true);
    /// Boolean false.
    pub const FALSE: Self = Self::Boolean(false);

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The type of this value, `None` for null.
    pub fn term_type(&self) -> Option<TermType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(TermType::Db(DbType::Boolean)),
            Self::Integer(_) => Some(TermType::Db(DbType::BigInt)),
            Self::String(_) => Some(TermType::Db(DbType::Varchar)),
            Self::Iri(_) => Some(TermType::Iri),
            Self::Provenance => Some(TermType::Provenance),
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::String(_) => "String",
            Self::Iri(_) => "Iri",
            Self::Provenance => "Provenance",
        }
    }

    /// Lexical form used by string concatenation and IRI templates.
    pub fn lexical_form(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Boolean(b) => Some(b.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::String(s) | Self::Iri(s) => Some(s.clone()),
            Self::Provenance => Some("true".to_string()),
        }
    }

    /// SQL equality. `Ok(None)` when either side is null.
    pub fn sql_eq(&self, other: &Self) -> QuarryResult<Option<bool>> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => Ok(None),
            (Self::Boolean(a), Self::Boolean(b)) => Ok(Some(a == b)),
            (Self::Integer(a), Self::Integer(b)) => Ok(Some(a == b)),
            (Self::String(a), Self::String(b)) | (Self::Iri(a), Self::Iri(b)) => Ok(Some(a == b)),
            (Self::Provenance, Self::Provenance) => Ok(Some(true)),
            (a, b) => Err(QuarryError::type_error(format!(
                "cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    /// SQL ordering. `Ok(None)` when either side is null.
    pub fn sql_cmp(&self, other: &Self) -> QuarryResult<Option<Ordering>> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => Ok(None),
            (Self::Boolean(a), Self::Boolean(b)) => Ok(Some(a.cmp(b))),
            (Self::Integer(a), Self::Integer(b)) => Ok(Some(a.cmp(b))),
            (Self::String(a), Self::String(b)) => Ok(Some(a.cmp(b))),
            (a, b) => Err(QuarryError::type_error(format!(
                "no ordering between {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(true) => write!(f, "TRUE"),
            Self::Boolean(false) => write!(f, "FALSE"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Iri(s) => write!(f, "<{s}>"),
            Self::Provenance => write!(f, "PROV"),
        }
    }
}

impl From<bool> for Constant {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for Constant {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Constant {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}
