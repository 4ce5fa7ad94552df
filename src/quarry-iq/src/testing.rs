//! Testing utilities for Quarry.
//!
//! A reference evaluator computing the bag of answers of a tree over an
//! in-memory database. It follows SQL semantics: natural joins and repeated
//! variables never match on null, conditions keep a tuple only when they
//! evaluate to true.

use std::collections::BTreeMap;

use common_error::{QuarryError, QuarryResult};
use quarry_core::{Bindings, Constant, ImmutableTerm, RelationId};

use crate::iq::IQ;
use crate::node::{ExtensionalDataNode, IQTree};

/// A stored tuple, one value per attribute.
pub type Row = Vec<Constant>;

/// In-memory database instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Database {
    tables: BTreeMap<RelationId, Vec<Row>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rows to a relation.
    #[must_use]
    pub fn with_rows(mut self, relation: &str, rows: Vec<Row>) -> Self {
        self.tables.entry(relation.into()).or_default().extend(rows);
        self
    }

    /// Rows of a relation; unknown relations are empty.
    pub fn rows(&self, relation: &RelationId) -> &[Row] {
        self.tables.get(relation).map_or(&[], Vec::as_slice)
    }
}

/// Integer row helper: `None` is `NULL`.
pub fn int_row(values: &[Option<i64>]) -> Row {
    values
        .iter()
        .map(|v| v.map_or(Constant::Null, Constant::Integer))
        .collect()
}

/// Evaluate a tree under bag semantics.
pub fn evaluate(tree: &IQTree, db: &Database) -> QuarryResult<Vec<Bindings>> {
    match tree {
        IQTree::ExtensionalData(n) => scan(n, db),
        IQTree::Native(_) => Err(QuarryError::invalid_parameter(
            "native nodes cannot be evaluated in memory",
        )),
        IQTree::Empty(_) => Ok(Vec::new()),
        IQTree::True => Ok(vec![Bindings::new()]),
        IQTree::Construction { node, child } => evaluate(child, db)?
            .into_iter()
            .map(|row| {
                node.projected()
                    .iter()
                    .map(|v| {
                        let value = match node.substitution().get(v) {
                            Some(term) => term.evaluate(&row)?,
                            None => lookup(&row, v)?,
                        };
                        Ok((v.clone(), value))
                    })
                    .collect::<QuarryResult<Bindings>>()
            })
            .collect(),
        IQTree::Filter { node, child } => {
            let mut out = Vec::new();
            for row in evaluate(child, db)? {
                if holds(node.condition(), &row)? {
                    out.push(row);
                }
            }
            Ok(out)
        }
        IQTree::InnerJoin { node, children } => {
            let mut acc = vec![Bindings::new()];
            for child in children {
                let rows = evaluate(child, db)?;
                let mut next = Vec::new();
                for left in &acc {
                    for right in &rows {
                        if let Some(merged) = natural_merge(left, right)? {
                            next.push(merged);
                        }
                    }
                }
                acc = next;
            }
            match node.condition() {
                None => Ok(acc),
                Some(condition) => {
                    let mut out = Vec::new();
                    for row in acc {
                        if holds(condition, &row)? {
                            out.push(row);
                        }
                    }
                    Ok(out)
                }
            }
        }
        IQTree::LeftJoin { node, left, right } => {
            let left_vars = left.variables();
            let right_only: Vec<_> = right
                .variables()
                .into_iter()
                .filter(|v| !left_vars.contains(v))
                .collect();
            let right_rows = evaluate(right, db)?;
            let mut out = Vec::new();
            for l in evaluate(left, db)? {
                let mut matched = false;
                for r in &right_rows {
                    let Some(merged) = natural_merge(&l, r)? else {
                        continue;
                    };
                    let accepted = match node.condition() {
                        Some(condition) => holds(condition, &merged)?,
                        None => true,
                    };
                    if accepted {
                        matched = true;
                        out.push(merged);
                    }
                }
                if !matched {
                    let mut padded = l.clone();
                    for v in &right_only {
                        padded.insert(v.clone(), Constant::Null);
                    }
                    out.push(padded);
                }
            }
            Ok(out)
        }
        IQTree::Union { node, children } => {
            let mut out = Vec::new();
            for child in children {
                for row in evaluate(child, db)? {
                    out.push(
                        node.projected()
                            .iter()
                            .map(|v| Ok((v.clone(), lookup(&row, v)?)))
                            .collect::<QuarryResult<Bindings>>()?,
                    );
                }
            }
            Ok(out)
        }
    }
}

/// Answers of a query in projection order, sorted.
pub fn answers(iq: &IQ, db: &Database) -> QuarryResult<Vec<Vec<Constant>>> {
    let mut rows = evaluate(iq.tree(), db)?
        .into_iter()
        .map(|row| {
            iq.projection()
                .variables()
                .iter()
                .map(|v| lookup(&row, v))
                .collect::<QuarryResult<Vec<_>>>()
        })
        .collect::<QuarryResult<Vec<_>>>()?;
    rows.sort();
    Ok(rows)
}

fn lookup(row: &Bindings, v: &quarry_core::Variable) -> QuarryResult<Constant> {
    row.get(v)
        .cloned()
        .ok_or_else(|| QuarryError::malformed(format!("{v} is not bound by the child")))
}

fn holds(condition: &ImmutableTerm, row: &Bindings) -> QuarryResult<bool> {
    Ok(condition.evaluate(row)? == Constant::TRUE)
}

fn scan(node: &ExtensionalDataNode, db: &Database) -> QuarryResult<Vec<Bindings>> {
    let mut out = Vec::new();
    'rows: for row in db.rows(node.relation()) {
        let mut bindings = Bindings::new();
        for (position, term) in node.arguments() {
            let value = row.get(*position).ok_or_else(|| {
                QuarryError::malformed(format!("{node}: no value at position {position}"))
            })?;
            match term {
                ImmutableTerm::Variable(v) => match bindings.get(v) {
                    Some(existing) => {
                        if existing.sql_eq(value)? != Some(true) {
                            continue 'rows;
                        }
                    }
                    None => {
                        bindings.insert(v.clone(), value.clone());
                    }
                },
                ImmutableTerm::Constant(c) => {
                    if c.sql_eq(value)? != Some(true) {
                        continue 'rows;
                    }
                }
                ImmutableTerm::Functional(_) => {
                    return Err(QuarryError::malformed(format!(
                        "{node} holds a functional term"
                    )))
                }
            }
        }
        out.push(bindings);
    }
    Ok(out)
}

/// Merge two tuples agreeing, non-null, on their shared variables.
fn natural_merge(left: &Bindings, right: &Bindings) -> QuarryResult<Option<Bindings>> {
    let mut merged = left.clone();
    for (v, value) in right {
        match left.get(v) {
            Some(existing) => {
                if existing.sql_eq(value)? != Some(true) {
                    return Ok(None);
                }
            }
            None => {
                merged.insert(v.clone(), value.clone());
            }
        }
    }
    Ok(Some(merged))
}
