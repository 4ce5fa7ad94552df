//! Type system for Quarry terms.
//!
//! `Constant` is the value domain of terms and `DbType` the type information
//! carried by relation attributes. `TermType` is what type inference returns.

mod constant;
mod db_type;

pub use constant::Constant;
pub use db_type::{DbType, TermType};
