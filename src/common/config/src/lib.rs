//! Configuration management for Quarry.
//!
//! Provides the settings of the optimizer pipeline and of SQL generation.

use std::path::Path;

use common_error::{QuarryError, QuarryResult};
use serde::{Deserialize, Serialize};

/// Global Quarry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QuarryConfig {
    /// Optimizer configuration.
    pub optimizer: OptimizerSettings,
    /// SQL generation configuration.
    pub sql: SqlSettings,
}

impl QuarryConfig {
    /// Parse a configuration from a JSON document.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> QuarryResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| QuarryError::config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> QuarryResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Check the cross-field constraints of the configuration.
    pub fn validate(&self) -> QuarryResult<()> {
        if self.optimizer.max_iterations == 0 {
            return Err(QuarryError::config("optimizer.max_iterations must be > 0"));
        }
        if self.optimizer.passes.is_empty() {
            return Err(QuarryError::config("optimizer.passes must not be empty"));
        }
        if self.sql.identifier_quote.is_alphanumeric() {
            return Err(QuarryError::config(format!(
                "sql.identifier_quote '{}' is not a quoting character",
                self.sql.identifier_quote
            )));
        }
        Ok(())
    }
}

/// The optimization passes that can be scheduled in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Constant conditions, absorbing `Empty`/`True` nodes.
    Normalization,
    /// Union-of-unions merge and empty branch removal.
    UnionFlattening,
    /// Removal of unused bindings, positions and join children.
    ProjectionShrinking,
    /// Self-join elimination on inner joins.
    SelfJoinElimination,
    /// Self-join elimination on left joins.
    LeftJoinElimination,
    /// Explicit equalities for conflicting bindings inside joins.
    BooleanPullOut,
    /// Substitution lifting toward the root.
    BindingLift,
    /// Filter merging and lifting.
    BooleanPushUp,
}

impl PassKind {
    /// The default pipeline order.
    pub fn default_pipeline() -> Vec<Self> {
        vec![
            Self::Normalization,
            Self::UnionFlattening,
            Self::ProjectionShrinking,
            Self::SelfJoinElimination,
            Self::LeftJoinElimination,
            Self::BooleanPullOut,
            Self::BindingLift,
            Self::BooleanPushUp,
        ]
    }
}

/// Optimizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Maximum number of fixed-point iterations.
    pub max_iterations: usize,
    /// Record a before/after trace of every applied pass.
    pub enable_trace: bool,
    /// Validate the tree after every pass.
    pub validate_after_each_pass: bool,
    /// Fail instead of stopping silently when the iteration bound is reached.
    pub fail_on_non_convergence: bool,
    /// Passes to run, in order, at every iteration.
    pub passes: Vec<PassKind>,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            enable_trace: false,
            validate_after_each_pass: false,
            fail_on_non_convergence: false,
            passes: PassKind::default_pipeline(),
        }
    }
}

impl OptimizerSettings {
    /// Set the maximum number of iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Enable or disable tracing.
    #[must_use]
    pub fn with_trace(mut self, enable: bool) -> Self {
        self.enable_trace = enable;
        self
    }

    /// Enable or disable validation after each pass.
    #[must_use]
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.validate_after_each_pass = enable;
        self
    }

    /// Enable or disable strict convergence.
    #[must_use]
    pub fn with_strict_convergence(mut self, enable: bool) -> Self {
        self.fail_on_non_convergence = enable;
        self
    }

    /// Replace the pass list.
    #[must_use]
    pub fn with_passes(mut self, passes: Vec<PassKind>) -> Self {
        self.passes = passes;
        self
    }
}

/// SQL generation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlSettings {
    /// Character used to quote identifiers.
    pub identifier_quote: char,
    /// Put every clause on its own line.
    pub pretty: bool,
}

impl Default for SqlSettings {
    fn default() -> Self {
        Self {
            identifier_quote: '"',
            pretty: false,
        }
    }
}
