//! Fresh variable generation.

use std::collections::BTreeSet;

use crate::term::Variable;

/// Produces variables disjoint from every variable it knows of.
///
/// One generator is created per query and threaded explicitly through the
/// passes that need fresh names. Both naming forms share one counter.
#[derive(Debug, Clone, Default)]
pub struct VariableGenerator {
    known: BTreeSet<Variable>,
    count: usize,
}

impl VariableGenerator {
    /// Create a generator that avoids the given variables.
    pub fn new(known: impl IntoIterator<Item = Variable>) -> Self {
        Self {
            known: known.into_iter().collect(),
            count: 0,
        }
    }

    /// Make the generator avoid more variables.
    pub fn register(&mut self, variables: impl IntoIterator<Item = Variable>) {
        self.known.extend(variables);
    }

    /// A fresh variable named `f<n>`.
    pub fn generate_new_variable(&mut self) -> Variable {
        self.generate_with_prefix("")
    }

    /// A fresh variable named `<v>f<n>`.
    pub fn generate_new_variable_from(&mut self, variable: &Variable) -> Variable {
        self.generate_with_prefix(variable.name())
    }

    fn generate_with_prefix(&mut self, prefix: &str) -> Variable {
        loop {
            let candidate = Variable::new(format!("{prefix}f{}", self.count));
            self.count += 1;
            if self.known.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}
