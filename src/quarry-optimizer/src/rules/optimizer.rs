//! The optimizer that applies passes to intermediate queries.
//!
//! The optimizer runs its passes in order, repeatedly, until an iteration
//! changes nothing or the iteration bound is reached.

use common_config::OptimizerSettings;
use common_error::{QuarryError, QuarryResult};
use log::{debug, error, warn};
use quarry_core::MetadataProvider;
use quarry_iq::IQ;

use super::rule::{OptimizationRule, OptimizedIQ, RuleTrace};
use super::rule_for;
use crate::context::OptimizationContext;

/// Configuration for the optimizer.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Maximum number of iterations before stopping.
    pub max_iterations: usize,
    /// Whether to enable detailed tracing.
    pub enable_trace: bool,
    /// Validate the query after every pass that changed it.
    pub validate_after_each_pass: bool,
    /// Report `NotConverged` instead of returning the last query.
    pub fail_on_non_convergence: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::from(&OptimizerSettings::default())
    }
}

impl From<&OptimizerSettings> for OptimizerConfig {
    fn from(settings: &OptimizerSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            enable_trace: settings.enable_trace,
            validate_after_each_pass: settings.validate_after_each_pass,
            fail_on_non_convergence: settings.fail_on_non_convergence,
        }
    }
}

impl OptimizerConfig {
    /// Create a new config with the given max iterations.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Enable or disable tracing.
    pub fn with_trace(mut self, enable: bool) -> Self {
        self.enable_trace = enable;
        self
    }

    /// Enable or disable validation after each pass.
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.validate_after_each_pass = enable;
        self
    }

    /// Enable or disable strict convergence.
    pub fn with_strict_convergence(mut self, enable: bool) -> Self {
        self.fail_on_non_convergence = enable;
        self
    }
}

/// The optimizer that applies passes to intermediate queries.
///
/// # Pass Ordering
///
/// The default pipeline is:
///
/// 1. Normalization
/// 2. Union flattening
/// 3. Projection shrinking
/// 4. Self-join elimination
/// 5. Left-join elimination
/// 6. Boolean pull-out
/// 7. Binding lift
/// 8. Boolean push-up
///
/// The whole pipeline is repeated until a fixpoint is reached.
///
/// # Termination
///
/// Every pass reaches a local fixpoint on its own. The outer loop is bounded
/// by `max_iterations`.
pub struct Optimizer {
    /// The rules to apply (in order).
    rules: Vec<Box<dyn OptimizationRule>>,
    /// Configuration.
    config: OptimizerConfig,
}

impl Optimizer {
    /// Create a new optimizer with the given rules.
    pub fn new(rules: Vec<Box<dyn OptimizationRule>>) -> Self {
        Self {
            rules,
            config: OptimizerConfig::default(),
        }
    }

    /// Create a new optimizer with custom config.
    pub fn with_config(rules: Vec<Box<dyn OptimizationRule>>, config: OptimizerConfig) -> Self {
        Self { rules, config }
    }

    /// Create the optimizer described by `settings`.
    pub fn from_settings(settings: &OptimizerSettings) -> Self {
        Self::with_config(
            settings.passes.iter().map(|pass| rule_for(*pass)).collect(),
            OptimizerConfig::from(settings),
        )
    }

    /// Add a rule to the optimizer.
    pub fn add_rule<R: OptimizationRule + 'static>(&mut self, rule: R) {
        self.rules.push(Box::new(rule));
    }

    /// Names of the scheduled rules, in order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize a query.
    ///
    /// Applies the rules in fixed-point iteration until no changes occur.
    pub fn optimize(&self, iq: IQ, metadata: &dyn MetadataProvider) -> QuarryResult<OptimizedIQ> {
        let mut current = iq.normalize_for_optimization()?;
        let mut context = OptimizationContext::for_iq(&current, metadata);
        let mut iterations = 0;
        let mut total_rules_applied = 0;
        let mut converged = false;
        let mut trace = Vec::new();

        loop {
            if iterations >= self.config.max_iterations {
                warn!(
                    "Optimizer reached max iterations ({}), stopping",
                    self.config.max_iterations
                );
                if self.config.fail_on_non_convergence {
                    return Err(QuarryError::NotConverged { iterations });
                }
                break;
            }

            iterations += 1;
            let mut changed_this_iteration = false;

            for rule in &self.rules {
                let (next, changed) = self.apply_rule(
                    rule.as_ref(),
                    current,
                    &mut context,
                    metadata,
                    &mut trace,
                )?;
                if changed {
                    changed_this_iteration = true;
                    total_rules_applied += 1;
                    debug!("Rule '{}' applied in iteration {}", rule.name(), iterations);
                }
                current = next;
            }

            if !changed_this_iteration {
                debug!("No changes in iteration {}, reached fixpoint", iterations);
                converged = true;
                break;
            }
        }

        Ok(OptimizedIQ {
            iq: current,
            iterations,
            rules_applied: total_rules_applied,
            converged,
            trace,
        })
    }

    /// Optimize with a single pass (no fixpoint iteration).
    pub fn optimize_once(
        &self,
        iq: IQ,
        metadata: &dyn MetadataProvider,
    ) -> QuarryResult<OptimizedIQ> {
        let mut current = iq.normalize_for_optimization()?;
        let mut context = OptimizationContext::for_iq(&current, metadata);
        let mut rules_applied = 0;
        let mut trace = Vec::new();

        for rule in &self.rules {
            let (next, changed) =
                self.apply_rule(rule.as_ref(), current, &mut context, metadata, &mut trace)?;
            if changed {
                rules_applied += 1;
            }
            current = next;
        }

        Ok(OptimizedIQ {
            iq: current,
            iterations: 1,
            rules_applied,
            converged: rules_applied == 0,
            trace,
        })
    }

    fn apply_rule(
        &self,
        rule: &dyn OptimizationRule,
        iq: IQ,
        context: &mut OptimizationContext<'_>,
        metadata: &dyn MetadataProvider,
        trace: &mut Vec<RuleTrace>,
    ) -> QuarryResult<(IQ, bool)> {
        let before = self.snapshot(&iq);
        let result = rule.apply(iq, context).inspect_err(|e| {
            if e.is_defect() {
                match &before {
                    Some(tree) => error!("Rule '{}' failed: {e}\n{tree}", rule.name()),
                    None => error!("Rule '{}' failed: {e}", rule.name()),
                }
            }
        })?;
        if !result.changed {
            return Ok((result.iq, false));
        }
        if self.config.validate_after_each_pass {
            result.iq.validate_with_metadata(metadata).inspect_err(|e| {
                error!(
                    "Rule '{}' produced an invalid query: {e}\n{}",
                    rule.name(),
                    result.iq.explain()
                );
            })?;
        }
        if let Some(before) = before {
            trace.push(RuleTrace::new(
                rule.name(),
                before,
                result.iq.explain(),
                true,
            ));
        }
        Ok((result.iq, true))
    }

    /// Rendered query for the trace, only when tracing is enabled.
    fn snapshot(&self, iq: &IQ) -> Option<String> {
        self.config.enable_trace.then(|| iq.explain())
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::from_settings(&OptimizerSettings::default())
    }
}
