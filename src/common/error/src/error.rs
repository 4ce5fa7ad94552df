//! Core error types for Quarry.

use thiserror::Error;

/// Result type alias using `QuarryError`.
pub type QuarryResult<T> = std::result::Result<T, QuarryError>;

/// Core error type for Quarry operations.
///
/// `EmptyQuery` is not a fault: it signals that a query provably yields no
/// rows and callers are expected to answer with an empty result.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuarryError {
    /// The query provably yields no rows.
    #[error("EmptyQuery: the query has no answer")]
    EmptyQuery,

    /// A tree invariant was violated (bug in an earlier pass or in a producer).
    #[error("MalformedTree: {0}")]
    MalformedTree(String),

    /// A relation is absent from the metadata provider.
    #[error("UnknownRelation: {0}")]
    UnknownRelation(String),

    /// Fatal typing error raised by the term evaluator.
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Invalid parameter provided.
    #[error("InvalidParameter: {0}")]
    InvalidParameter(String),

    /// The fixed-point loop exhausted its iteration budget.
    #[error("NotConverged: optimizer did not reach a fixpoint after {iterations} iterations")]
    NotConverged {
        /// Number of iterations performed.
        iterations: usize,
    },

    /// Invalid configuration.
    #[error("ConfigError: {0}")]
    ConfigError(String),

    /// Internal error (bug in Quarry).
    #[error("InternalError: {0}")]
    InternalError(String),

    /// IO error.
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl QuarryError {
    /// Create a new `MalformedTree` error.
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedTree(msg.into())
    }

    /// Create a new `UnknownRelation` error.
    pub fn unknown_relation<S: Into<String>>(relation: S) -> Self {
        Self::UnknownRelation(relation.into())
    }

    /// Create a new `TypeError`.
    pub fn type_error<S: Into<String>>(msg: S) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a new `InvalidParameter` error.
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a new `ConfigError`.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new `InternalError`.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into())
    }

    /// Whether this error is the empty-result sentinel.
    pub fn is_empty_query(&self) -> bool {
        matches!(self, Self::EmptyQuery)
    }

    /// Whether this error denotes a defect rather than a user-facing condition.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Self::MalformedTree(_) | Self::InternalError(_) | Self::NotConverged { .. }
        )
    }
}

/// Ensure a condition holds, returning a `MalformedTree` error if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::QuarryError::$variant(format!($($msg)*)));
        }
    };
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::QuarryError::MalformedTree($msg.to_string()));
        }
    };
}

/// Return early with a `MalformedTree` error.
#[macro_export]
macro_rules! malformed_err {
    ($($arg:tt)*) => {
        return Err($crate::QuarryError::MalformedTree(format!($($arg)*)))
    };
}

/// Return early with a `TypeError`.
#[macro_export]
macro_rules! type_err {
    ($($arg:tt)*) => {
        return Err($crate::QuarryError::TypeError(format!($($arg)*)))
    };
}
