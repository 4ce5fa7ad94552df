//! Tree rendering for `explain`.

use common_display::{DisplayTree, TreeNode, truncate_string};

use crate::node::IQTree;

const MAX_SQL_DISPLAY: usize = 60;

impl TreeNode for IQTree {
    fn name(&self) -> &str {
        self.kind_name()
    }

    fn children(&self) -> Vec<&dyn TreeNode> {
        IQTree::children(self)
            .into_iter()
            .map(|c| c as &dyn TreeNode)
            .collect()
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::ExtensionalData(n) => Some(n.to_string()),
            Self::Native(n) => {
                let vars: Vec<&str> = n.signature().iter().map(|v| v.name()).collect();
                Some(format!(
                    "[{}] {}",
                    vars.join(","),
                    truncate_string(n.sql(), MAX_SQL_DISPLAY)
                ))
            }
            Self::Empty(n) => {
                let vars: Vec<&str> = n.variables().iter().map(|v| v.name()).collect();
                Some(format!("[{}]", vars.join(",")))
            }
            Self::True => None,
            Self::Construction { node, .. } => Some(node.to_string()),
            Self::Filter { node, .. } => Some(node.condition().to_string()),
            Self::LeftJoin { node, .. } => node.condition().map(ToString::to_string),
            Self::InnerJoin { node, .. } => node.condition().map(ToString::to_string),
            Self::Union { node, .. } => {
                let vars: Vec<&str> = node.projected().iter().map(|v| v.name()).collect();
                Some(format!("[{}]", vars.join(",")))
            }
        }
    }
}

impl IQTree {
    /// Indented rendering of the tree, one node per line.
    pub fn explain(&self) -> String {
        DisplayTree::new(self).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::term::{is_not_null, var};

    #[test]
    fn test_explain() {
        let tree = IQTree::filter(
            is_not_null(var("a")),
            IQTree::left_join(
                IQTree::extensional("T1", [(0, var("a"))]).unwrap(),
                IQTree::extensional("T2", [(0, var("a")), (1, var("b"))]).unwrap(),
            ),
        );
        let text = tree.explain();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "FILTER IS_NOT_NULL(a)");
        assert_eq!(lines[1], "└─ LJ");
        assert_eq!(lines[2], "   ├─ EXTENSIONAL T1{0:a}");
        assert_eq!(lines[3], "   └─ EXTENSIONAL T2{0:a,1:b}");
    }
}
