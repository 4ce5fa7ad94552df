//! Error types and result aliases for Quarry.
//!
//! Every crate of the workspace reports failures through [`QuarryError`].

mod error;

pub use error::{QuarryError, QuarryResult};
