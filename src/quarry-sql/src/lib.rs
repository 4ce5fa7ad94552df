//! SQL generation and extraction for optimized Quarry queries.
//!
//! [`NativeQueryGenerator`] rewrites an optimized [`IQ`](quarry_iq::IQ) into its
//! executable shape, a root construction node over a single native leaf.
//! [`extract_sql`] then hands out the SQL string and the ordered output
//! signature.
//!
//! # Example
//!
//! ```rust
//! use quarry_core::term::{is_not_null, var};
//! use quarry_core::testing::nullable_unique_metadata;
//! use quarry_core::{ProjectionAtom, Variable};
//! use quarry_iq::{IQTree, IQ};
//! use quarry_sql::{extract_sql, NativeQueryGenerator};
//!
//! let tree = IQTree::filter(
//!     is_not_null(var("a")),
//!     IQTree::extensional("TABLE1", [(0, var("a"))]).unwrap(),
//! );
//! let iq = IQ::new(ProjectionAtom::new("ans", vec![Variable::new("a")]).unwrap(), tree).unwrap();
//!
//! let metadata = nullable_unique_metadata();
//! let generated = NativeQueryGenerator::new(&metadata).generate(iq).unwrap();
//! let extracted = extract_sql(&generated).unwrap();
//! assert!(extracted.sql.starts_with("SELECT"));
//! ```

mod extraction;
pub mod sql_ast;
pub mod sql_string;
mod translation;

pub use extraction::{extract_root_construction, extract_signature, extract_sql, ExtractedSql};
pub use translation::NativeQueryGenerator;
