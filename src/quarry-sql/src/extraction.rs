//! Extraction of the executable SQL from a generated query.

use std::collections::BTreeSet;

use common_error::{QuarryError, QuarryResult};
use log::error;
use quarry_core::{ImmutableTerm, Substitution, Variable};
use quarry_iq::{ConstructionNode, IQTree, NativeNode, IQ};
use serde::{Deserialize, Serialize};

/// SQL ready to run together with what is needed to build the answers.
///
/// `columns` names the result columns of `sql` in order. `definitions` gives
/// the answer variables computed on top of them by the root construction
/// node. `signature` lists the answer variables in projection-atom order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedSql {
    pub sql: String,
    pub columns: Vec<Variable>,
    pub definitions: Substitution,
    pub signature: Vec<Variable>,
}

impl ExtractedSql {
    /// Term computing an answer variable from the result columns.
    pub fn answer_term(&self, variable: &Variable) -> ImmutableTerm {
        self.definitions.apply_to_variable(variable)
    }
}

fn malformed(iq: &IQ, reason: &str) -> QuarryError {
    error!("Cannot extract SQL, {}:\n{}", reason, iq.explain());
    QuarryError::malformed(format!("cannot extract SQL, {reason}"))
}

/// The root construction node and the native leaf below it.
///
/// Fails with `EmptyQuery` on a declared-empty query and with
/// `MalformedTree` on any other shape.
pub fn extract_root_construction(iq: &IQ) -> QuarryResult<(&ConstructionNode, &NativeNode)> {
    if iq.is_declared_empty() {
        return Err(QuarryError::EmptyQuery);
    }
    let IQTree::Construction { node, child } = iq.tree() else {
        return Err(malformed(iq, "the root is not a construction node"));
    };
    match &**child {
        IQTree::Native(native) => Ok((node, native)),
        other => Err(malformed(
            iq,
            &format!("expected one native leaf below the root, found {}", other.kind_name()),
        )),
    }
}

/// Output variables of the query in projection-atom order.
pub fn extract_signature(iq: &IQ) -> QuarryResult<Vec<Variable>> {
    let (node, _) = extract_root_construction(iq)?;
    let answer = iq.projection().variables();
    if let Some(missing) = answer.iter().find(|v| !node.projected().contains(*v)) {
        return Err(malformed(iq, &format!("answer variable {missing} is not projected")));
    }
    Ok(answer.to_vec())
}

pub fn extract_sql(iq: &IQ) -> QuarryResult<ExtractedSql> {
    let (node, native) = extract_root_construction(iq)?;
    if native.sql().trim().is_empty() {
        return Err(QuarryError::EmptyQuery);
    }
    let signature = extract_signature(iq)?;
    let answer: BTreeSet<Variable> = signature.iter().cloned().collect();
    let definitions = node.substitution().restrict_domain_to(&answer);
    if let Some(undefined) = signature
        .iter()
        .find(|v| !definitions.contains(v) && !native.signature().contains(v))
    {
        return Err(malformed(
            iq,
            &format!("answer variable {undefined} is neither a column nor defined"),
        ));
    }
    Ok(ExtractedSql {
        sql: native.sql().to_string(),
        columns: native.signature().to_vec(),
        definitions,
        signature,
    })
}
