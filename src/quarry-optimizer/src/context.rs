//! Per-query optimization context.

use quarry_core::{MetadataProvider, Variable, VariableGenerator};
use quarry_iq::IQ;

/// State shared by the passes while optimizing one query: the relation
/// metadata and the generator of fresh variables.
pub struct OptimizationContext<'a> {
    metadata: &'a dyn MetadataProvider,
    variable_generator: VariableGenerator,
}

impl<'a> OptimizationContext<'a> {
    pub fn new(metadata: &'a dyn MetadataProvider, variable_generator: VariableGenerator) -> Self {
        Self {
            metadata,
            variable_generator,
        }
    }

    /// Context whose generator knows every variable of `iq`.
    pub fn for_iq(iq: &IQ, metadata: &'a dyn MetadataProvider) -> Self {
        Self::new(metadata, iq.variable_generator())
    }

    pub fn metadata(&self) -> &'a dyn MetadataProvider {
        self.metadata
    }

    pub fn variable_generator(&mut self) -> &mut VariableGenerator {
        &mut self.variable_generator
    }

    /// A variable unused so far in the query.
    pub fn fresh_variable(&mut self) -> Variable {
        self.variable_generator.generate_new_variable()
    }

    /// A fresh variable named after `v`.
    pub fn fresh_variable_from(&mut self, v: &Variable) -> Variable {
        self.variable_generator.generate_new_variable_from(v)
    }
}
