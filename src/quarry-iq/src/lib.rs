//! Intermediate query trees for Quarry.
//!
//! `quarry-iq` provides the immutable tree representation of a relational
//! query and the machinery the optimizer builds on.
//!
//! # Overview
//!
//! - **Nodes**: extensional, native, empty and true leaves; construction,
//!   filter, left join, inner join and union operators
//! - **IQ**: a projection atom over a tree
//! - **Transformers**: kind-dispatched structural rewrites
//! - **Nullability**: bottom-up derivation of nullable variables
//! - **Validation**: structural and metadata-aware checks
//!
//! # Example
//!
//! ```rust
//! use quarry_core::term::{is_not_null, var};
//! use quarry_core::{ProjectionAtom, Variable};
//! use quarry_iq::{IQTree, IQ};
//!
//! let tree = IQTree::filter(
//!     is_not_null(var("a")),
//!     IQTree::extensional("TABLE1", [(0, var("a")), (2, var("e"))]).unwrap(),
//! );
//! let answer = ProjectionAtom::new("ans", vec![Variable::new("a"), Variable::new("e")]).unwrap();
//! let iq = IQ::new(answer, tree).unwrap().normalize_for_optimization().unwrap();
//! println!("{}", iq.explain());
//! ```

mod builder;
mod display;
mod iq;
pub mod node;
mod nullability;
mod renaming;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transform;
pub mod validation;

pub use iq::IQ;
pub use node::{
    ConstructionNode, EmptyNode, ExtensionalDataNode, FilterNode, IQTree, InnerJoinNode,
    LeftJoinNode, NativeNode, UnionNode,
};
pub use transform::{ChildTransformer, FnTransformer, IQTreeTransformer};
pub use validation::{validate_iq, IQValidator, ValidationError};
