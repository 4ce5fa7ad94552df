//! Optimization rule trait and framework.
//!
//! This module defines the core abstraction for optimization passes and the
//! result types the optimizer reports.

use common_error::QuarryResult;
use quarry_iq::IQ;

use crate::context::OptimizationContext;

/// A single optimization pass over an intermediate query.
///
/// A pass is legal when, on every database instance satisfying the
/// metadata constraints, the rewritten query returns the same bag of
/// answers. Passes keep the projection atom and leave the root a
/// construction node projecting the answer variables (or an `Empty` leaf).
pub trait OptimizationRule: Send + Sync {
    /// Get the name of this rule.
    fn name(&self) -> &'static str;

    /// Get a description of what this rule does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Apply this rule to the query.
    ///
    /// Returns the query unchanged (`changed == false`) when the rule does
    /// not apply.
    fn apply(&self, iq: IQ, context: &mut OptimizationContext<'_>) -> QuarryResult<Transformed>;
}

/// The result of applying an optimization rule.
#[derive(Debug, Clone)]
pub struct Transformed {
    /// The (potentially transformed) query.
    pub iq: IQ,
    /// Whether the tree is structurally different.
    pub changed: bool,
}

impl Transformed {
    /// The query was changed.
    pub fn yes(iq: IQ) -> Self {
        Self { iq, changed: true }
    }

    /// The query was left unchanged.
    pub fn no(iq: IQ) -> Self {
        Self { iq, changed: false }
    }
}

impl From<IQ> for Transformed {
    fn from(iq: IQ) -> Self {
        Self::no(iq)
    }
}

/// A trace entry for a single rule application.
#[derive(Debug, Clone)]
pub struct RuleTrace {
    /// The name of the rule that was applied.
    pub rule_name: String,
    /// The query before the rule was applied (as explain string).
    pub before: String,
    /// The query after the rule was applied (as explain string).
    pub after: String,
    /// Whether the rule actually changed the query.
    pub changed: bool,
}

impl RuleTrace {
    pub fn new(
        rule_name: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
        changed: bool,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            before: before.into(),
            after: after.into(),
            changed,
        }
    }
}

/// The result of optimization with optional trace information.
#[derive(Debug, Clone)]
pub struct OptimizedIQ {
    /// The final query.
    pub iq: IQ,
    /// Number of fixed-point iterations performed.
    pub iterations: usize,
    /// Number of rule applications that changed the query.
    pub rules_applied: usize,
    /// Whether the last iteration changed nothing.
    pub converged: bool,
    /// Detailed trace of rule applications (if tracing was enabled).
    pub trace: Vec<RuleTrace>,
}

impl OptimizedIQ {
    pub fn new(iq: IQ) -> Self {
        Self {
            iq,
            iterations: 0,
            rules_applied: 0,
            converged: false,
            trace: Vec::new(),
        }
    }

    /// Format the trace as a human-readable string.
    pub fn format_trace(&self) -> String {
        let mut output = format!(
            "Optimization completed in {} iterations, {} rules applied\n",
            self.iterations, self.rules_applied
        );

        if self.trace.is_empty() {
            output.push_str("  (no trace available)\n");
        } else {
            for (i, entry) in self.trace.iter().filter(|t| t.changed).enumerate() {
                output.push_str(&format!(
                    "\n--- Rule {} applied: {} ---\n",
                    i + 1,
                    entry.rule_name
                ));
                output.push_str("Before:\n");
                output.push_str(&entry.before);
                output.push_str("\nAfter:\n");
                output.push_str(&entry.after);
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::term::var;
    use quarry_core::{ProjectionAtom, Variable};
    use quarry_iq::IQTree;

    fn iq() -> IQ {
        IQ::new(
            ProjectionAtom::new("ans", vec![Variable::new("a")]).unwrap(),
            IQTree::extensional("TABLE1", [(0, var("a"))]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_transformed() {
        let unchanged = Transformed::no(iq());
        assert!(!unchanged.changed);

        let changed = Transformed::yes(iq());
        assert!(changed.changed);

        assert!(!Transformed::from(iq()).changed);
    }

    #[test]
    fn test_rule_trace() {
        let trace = RuleTrace::new("TestRule", "before", "after", true);
        assert_eq!(trace.rule_name, "TestRule");
        assert!(trace.changed);
    }

    #[test]
    fn test_format_trace() {
        let mut result = OptimizedIQ::new(iq());
        assert!(result.format_trace().contains("(no trace available)"));

        result.iterations = 2;
        result.rules_applied = 1;
        result.trace.push(RuleTrace::new("Normalization", "x", "y", true));
        let text = result.format_trace();
        assert!(text.starts_with("Optimization completed in 2 iterations, 1 rules applied"));
        assert!(text.contains("--- Rule 1 applied: Normalization ---"));
    }
}
