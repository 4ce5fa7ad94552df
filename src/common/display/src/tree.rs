//! Tree display utilities for query trees.

use std::fmt;

/// A node in a display tree.
pub trait TreeNode {
    /// Get the display name of this node.
    fn name(&self) -> &str;

    /// Get child nodes.
    fn children(&self) -> Vec<&dyn TreeNode>;

    /// Get additional details to display.
    fn details(&self) -> Option<String> {
        None
    }
}

/// Helper for displaying tree structures.
pub struct DisplayTree<'a> {
    root: &'a dyn TreeNode,
}

impl<'a> DisplayTree<'a> {
    /// Create a new display tree.
    pub fn new(root: &'a dyn TreeNode) -> Self {
        Self { root }
    }

    fn fmt_line(f: &mut fmt::Formatter<'_>, node: &dyn TreeNode) -> fmt::Result {
        write!(f, "{}", node.name())?;
        if let Some(details) = node.details() {
            write!(f, " {details}")?;
        }
        writeln!(f)
    }

    fn fmt_node(
        f: &mut fmt::Formatter<'_>,
        node: &dyn TreeNode,
        prefix: &str,
        is_last: bool,
    ) -> fmt::Result {
        let connector = if is_last { "└─ " } else { "├─ " };
        write!(f, "{prefix}{connector}")?;
        Self::fmt_line(f, node)?;

        let children = node.children();
        let child_prefix = format!("{prefix}{}", if is_last { "   " } else { "│  " });

        for (i, child) in children.iter().enumerate() {
            let is_last_child = i == children.len() - 1;
            Self::fmt_node(f, *child, &child_prefix, is_last_child)?;
        }

        Ok(())
    }
}

impl fmt::Display for DisplayTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Self::fmt_line(f, self.root)?;

        let children = self.root.children();
        for (i, child) in children.iter().enumerate() {
            let is_last = i == children.len() - 1;
            Self::fmt_node(f, *child, "", is_last)?;
        }

        Ok(())
    }
}
