//! Bottom-up derivation of the variables a tree may project as null.

use std::collections::{BTreeMap, BTreeSet};

use common_error::QuarryResult;
use quarry_core::{MetadataProvider, Variable};

use crate::node::{ExtensionalDataNode, IQTree};

impl IQTree {
    /// Projected variables that may be null in some answer.
    ///
    /// The result over-approximates: a variable absent from the set is
    /// guaranteed non-null on every instance satisfying the constraints.
    pub fn nullable_variables(
        &self,
        metadata: &dyn MetadataProvider,
    ) -> QuarryResult<BTreeSet<Variable>> {
        Ok(match self {
            Self::ExtensionalData(n) => extensional_nullable(n, metadata)?,
            Self::Native(n) => n.variables(),
            Self::Empty(_) | Self::True => BTreeSet::new(),
            Self::Construction { node, child } => {
                let child_nullable = child.nullable_variables(metadata)?;
                let substitution = node.substitution();
                node.projected()
                    .iter()
                    .filter(|v| match substitution.get(v) {
                        Some(term) => term.is_nullable(&child_nullable),
                        None => child_nullable.contains(*v),
                    })
                    .cloned()
                    .collect()
            }
            Self::Filter { node, child } => {
                let rejected = node.condition().null_rejected_variables();
                child
                    .nullable_variables(metadata)?
                    .difference(&rejected)
                    .cloned()
                    .collect()
            }
            Self::InnerJoin { node, children } => {
                let mut occurrences: BTreeMap<Variable, usize> = BTreeMap::new();
                let mut nullable = BTreeSet::new();
                for child in children {
                    for v in child.variables() {
                        *occurrences.entry(v).or_default() += 1;
                    }
                    nullable.extend(child.nullable_variables(metadata)?);
                }
                // Natural join equalities reject nulls on shared variables.
                nullable.retain(|v| occurrences.get(v).copied().unwrap_or(0) < 2);
                if let Some(condition) = node.condition() {
                    let rejected = condition.null_rejected_variables();
                    nullable.retain(|v| !rejected.contains(v));
                }
                nullable
            }
            Self::LeftJoin { left, right, .. } => {
                let left_vars = left.variables();
                let mut nullable = left.nullable_variables(metadata)?;
                nullable.extend(
                    right
                        .variables()
                        .into_iter()
                        .filter(|v| !left_vars.contains(v)),
                );
                nullable
            }
            Self::Union { children, .. } => {
                let mut nullable = BTreeSet::new();
                for child in children {
                    nullable.extend(child.nullable_variables(metadata)?);
                }
                nullable
            }
        })
    }
}

/// A variable is nullable when it occurs once, at a nullable attribute.
/// Repeated occurrences are equalities and reject nulls.
fn extensional_nullable(
    node: &ExtensionalDataNode,
    metadata: &dyn MetadataProvider,
) -> QuarryResult<BTreeSet<Variable>> {
    let relation = metadata.require_relation(node.relation())?;
    Ok(node
        .variables()
        .iter()
        .filter(|v| match node.positions_of(v).as_slice() {
            [position] => relation.is_nullable(*position),
            _ => false,
        })
        .cloned()
        .collect())
}
