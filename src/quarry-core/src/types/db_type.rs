//! Database value types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type of a relation attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DbType {
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Exact decimal.
    Decimal,
    /// Double precision float.
    Double,
    /// Character string.
    Varchar,
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Timestamp.
    Timestamp,
}

impl DbType {
    /// Check if this type is numeric.
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::BigInt | Self::Decimal | Self::Double)
    }

    /// Check if this type is temporal.
    pub const fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Timestamp)
    }

    /// Whether values of the two types can be compared with `=` or `<`.
    pub fn is_comparable_with(&self, other: &Self) -> bool {
        self == other
            || (self.is_numeric() && other.is_numeric())
            || (self.is_temporal() && other.is_temporal())
    }

    /// SQL name of the type.
    pub const fn sql_name(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Decimal => "DECIMAL",
            Self::Double => "DOUBLE PRECISION",
            Self::Varchar => "VARCHAR",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

/// Type of a term, as inferred from its structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermType {
    /// A database value type.
    Db(DbType),
    /// An IRI built from a template or an IRI constant.
    Iri,
    /// The provenance marker.
    Provenance,
}

impl TermType {
    /// Boolean term type.
    pub const BOOLEAN: Self = Self::Db(DbType::Boolean);

    /// Whether values of the two types can be compared.
    pub fn is_comparable_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Db(a), Self::Db(b)) => a.is_comparable_with(b),
            (a, b) => a == b,
        }
    }

    /// Whether this is the boolean type.
    pub fn is_boolean(&self) -> bool {
        *self == Self::BOOLEAN
    }
}

impl fmt::Display for TermType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Db(t) => write!(f, "{t}"),
            Self::Iri => write!(f, "IRI"),
            Self::Provenance => write!(f, "PROVENANCE"),
        }
    }
}
