//! Display and visualization utilities for Quarry.
//!
//! Provides the indented tree rendering behind `IQ::explain`.

mod tree;

pub use tree::{DisplayTree, TreeNode};

/// Truncate a string for display, appending `...` when it was cut.
///
/// Cuts on a character boundary so multi-byte text never panics.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
