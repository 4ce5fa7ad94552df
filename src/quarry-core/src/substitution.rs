//! Immutable variable substitutions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use common_error::{QuarryError, QuarryResult};
use serde::{Deserialize, Serialize};

use crate::term::{ImmutableTerm, Variable};

/// A finite map from variables to terms.
///
/// Identity bindings (`x/x`) are never stored. Application replaces every
/// domain variable simultaneously.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Substitution {
    map: BTreeMap<Variable, ImmutableTerm>,
}

impl Substitution {
    /// The empty substitution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a substitution from pairs. Later pairs override earlier ones and
    /// identity pairs are dropped.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Variable, ImmutableTerm)>) -> Self {
        let map = pairs
            .into_iter()
            .filter(|(v, t)| t.as_variable() != Some(v))
            .collect();
        Self { map }
    }

    /// A substitution with a single binding.
    pub fn singleton(variable: Variable, term: impl Into<ImmutableTerm>) -> Self {
        Self::from_pairs([(variable, term.into())])
    }

    /// A renaming built from variable pairs.
    pub fn renaming(pairs: impl IntoIterator<Item = (Variable, Variable)>) -> Self {
        Self::from_pairs(pairs.into_iter().map(|(v, w)| (v, ImmutableTerm::Variable(w))))
    }

    /// Term bound to `variable`, if any.
    pub fn get(&self, variable: &Variable) -> Option<&ImmutableTerm> {
        self.map.get(variable)
    }

    /// Whether `variable` is in the domain.
    pub fn contains(&self, variable: &Variable) -> bool {
        self.map.contains_key(variable)
    }

    /// Check if the substitution is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Iterate the bindings in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &ImmutableTerm)> {
        self.map.iter()
    }

    /// The domain.
    pub fn domain(&self) -> BTreeSet<Variable> {
        self.map.keys().cloned().collect()
    }

    /// Variables occurring in the range.
    pub fn range_variables(&self) -> BTreeSet<Variable> {
        let mut vars = BTreeSet::new();
        self.map.values().for_each(|t| t.collect_variables(&mut vars));
        vars
    }

    /// Whether no domain variable occurs in the range.
    pub fn is_idempotent(&self) -> bool {
        let range = self.range_variables();
        self.map.keys().all(|v| !range.contains(v))
    }

    /// Whether the substitution maps variables injectively to variables.
    pub fn is_renaming(&self) -> bool {
        let mut targets = BTreeSet::new();
        self.map
            .values()
            .all(|t| t.as_variable().is_some_and(|v| targets.insert(v.clone())))
    }

    /// Apply the substitution to a term.
    pub fn apply(&self, term: &ImmutableTerm) -> ImmutableTerm {
        term.apply(self)
    }

    /// Image of a variable.
    pub fn apply_to_variable(&self, variable: &Variable) -> ImmutableTerm {
        self.map
            .get(variable)
            .cloned()
            .unwrap_or_else(|| ImmutableTerm::Variable(variable.clone()))
    }

    /// Image of a variable that must stay a variable (renamings).
    pub fn rename_variable(&self, variable: &Variable) -> QuarryResult<Variable> {
        match self.apply_to_variable(variable) {
            ImmutableTerm::Variable(v) => Ok(v),
            other => Err(QuarryError::invalid_parameter(format!(
                "{variable} is mapped to the non-variable term {other}"
            ))),
        }
    }

    /// Composition `self ∘ other`: applying the result equals applying
    /// `other` first and then `self`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        let mut pairs: Vec<(Variable, ImmutableTerm)> = other
            .map
            .iter()
            .map(|(v, t)| (v.clone(), t.apply(self)))
            .collect();
        pairs.extend(
            self.map
                .iter()
                .filter(|(v, _)| !other.contains(v))
                .map(|(v, t)| (v.clone(), t.clone())),
        );
        Self::from_pairs(pairs)
    }

    /// Keep only the bindings of the given variables.
    #[must_use]
    pub fn restrict_domain_to(&self, variables: &BTreeSet<Variable>) -> Self {
        Self {
            map: self
                .map
                .iter()
                .filter(|(v, _)| variables.contains(v))
                .map(|(v, t)| (v.clone(), t.clone()))
                .collect(),
        }
    }

    /// Remove the binding of `variable`.
    #[must_use]
    pub fn remove(&self, variable: &Variable) -> Self {
        let mut map = self.map.clone();
        map.remove(variable);
        Self { map }
    }

    /// Add or replace one binding.
    #[must_use]
    pub fn with(&self, variable: Variable, term: ImmutableTerm) -> Self {
        let mut pairs: Vec<_> = self.map.clone().into_iter().collect();
        pairs.push((variable, term));
        Self::from_pairs(pairs)
    }

    /// Union of two substitutions. A variable bound to different terms is an
    /// `InvalidParameter` error.
    pub fn union(&self, other: &Self) -> QuarryResult<Self> {
        let mut map = self.map.clone();
        for (v, t) in &other.map {
            match map.get(v) {
                Some(existing) if existing != t => {
                    return Err(QuarryError::invalid_parameter(format!(
                        "conflicting bindings for {v}: {existing} and {t}"
                    )));
                }
                _ => {
                    map.insert(v.clone(), t.clone());
                }
            }
        }
        Ok(Self { map })
    }

    /// Apply `f` to every bound term.
    #[must_use]
    pub fn transform_terms(&self, f: impl Fn(&ImmutableTerm) -> ImmutableTerm) -> Self {
        Self::from_pairs(self.map.iter().map(|(v, t)| (v.clone(), f(t))))
    }
}

impl FromIterator<(Variable, ImmutableTerm)> for Substitution {
    fn from_iter<I: IntoIterator<Item = (Variable, ImmutableTerm)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (v, t)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}/{t}")?;
        }
        write!(f, "}}")
    }
}
