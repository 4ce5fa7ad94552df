//! Variable renaming through a subtree.

use std::collections::BTreeSet;

use common_error::{QuarryError, QuarryResult};
use quarry_core::{ImmutableTerm, Substitution, Variable};

use crate::node::{
    ConstructionNode, EmptyNode, FilterNode, IQTree, InnerJoinNode, LeftJoinNode, NativeNode,
    UnionNode,
};

impl IQTree {
    /// Rename the variables of the whole subtree, projected or not.
    ///
    /// `renaming` must be injective and map variables to variables. Targets
    /// are expected to be fresh for the subtree.
    pub fn apply_renaming(&self, renaming: &Substitution) -> QuarryResult<IQTree> {
        if !renaming.is_renaming() {
            return Err(QuarryError::invalid_parameter(format!(
                "{renaming} is not a renaming"
            )));
        }
        if renaming.is_empty() {
            return Ok(self.clone());
        }
        rename(self, renaming)
    }
}

fn rename_set(vars: &BTreeSet<Variable>, renaming: &Substitution) -> QuarryResult<BTreeSet<Variable>> {
    vars.iter().map(|v| renaming.rename_variable(v)).collect()
}

fn rename(tree: &IQTree, renaming: &Substitution) -> QuarryResult<IQTree> {
    Ok(match tree {
        IQTree::ExtensionalData(n) => IQTree::ExtensionalData(
            n.with_arguments(
                n.arguments()
                    .iter()
                    .map(|(p, t)| (*p, t.apply(renaming)))
                    .collect(),
            )?,
        ),
        IQTree::Native(n) => IQTree::Native(NativeNode::new(
            n.sql(),
            n.signature()
                .iter()
                .map(|v| renaming.rename_variable(v))
                .collect::<QuarryResult<_>>()?,
        )?),
        IQTree::Empty(n) => IQTree::Empty(EmptyNode::new(rename_set(n.variables(), renaming)?)),
        IQTree::True => IQTree::True,
        IQTree::Construction { node, child } => {
            let substitution = node
                .substitution()
                .iter()
                .map(|(v, t)| -> QuarryResult<(Variable, ImmutableTerm)> {
                    Ok((renaming.rename_variable(v)?, t.apply(renaming)))
                })
                .collect::<QuarryResult<Substitution>>()?;
            IQTree::Construction {
                node: ConstructionNode::new(rename_set(node.projected(), renaming)?, substitution)?,
                child: Box::new(rename(child, renaming)?),
            }
        }
        IQTree::Filter { node, child } => IQTree::Filter {
            node: FilterNode::new(node.condition().apply(renaming)),
            child: Box::new(rename(child, renaming)?),
        },
        IQTree::LeftJoin { node, left, right } => IQTree::LeftJoin {
            node: LeftJoinNode::new(node.condition().map(|c| c.apply(renaming))),
            left: Box::new(rename(left, renaming)?),
            right: Box::new(rename(right, renaming)?),
        },
        IQTree::InnerJoin { node, children } => IQTree::InnerJoin {
            node: InnerJoinNode::new(node.condition().map(|c| c.apply(renaming))),
            children: children
                .iter()
                .map(|c| rename(c, renaming))
                .collect::<QuarryResult<_>>()?,
        },
        IQTree::Union { node, children } => IQTree::Union {
            node: UnionNode::new(rename_set(node.projected(), renaming)?),
            children: children
                .iter()
                .map(|c| rename(c, renaming))
                .collect::<QuarryResult<_>>()?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::term::{int, is_not_null, var};

    fn v(name: &str) -> Variable {
        Variable::new(name)
    }

    #[test]
    fn test_renaming_reaches_hidden_variables() {
        let tree = IQTree::construction(
            BTreeSet::from([v("a"), v("g")]),
            Substitution::singleton(v("g"), var("gf1")),
            IQTree::filter(
                is_not_null(var("a")),
                IQTree::extensional("T1", [(0, var("a")), (1, int(2)), (2, var("gf1"))]).unwrap(),
            ),
        )
        .unwrap();
        let renaming = Substitution::renaming([(v("a"), v("a1")), (v("gf1"), v("h"))]);
        let renamed = tree.apply_renaming(&renaming).unwrap();
        assert_eq!(renamed.variables(), BTreeSet::from([v("a1"), v("g")]));
        assert_eq!(
            renamed.all_variables(),
            BTreeSet::from([v("a1"), v("g"), v("h")])
        );
    }

    #[test]
    fn test_rejects_non_renaming() {
        let tree = IQTree::extensional("T1", [(0, var("a"))]).unwrap();
        let s = Substitution::singleton(v("a"), int(1));
        assert!(tree.apply_renaming(&s).is_err());
    }
}
