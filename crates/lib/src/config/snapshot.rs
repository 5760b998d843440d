//! The immutable result of variable resolution.

use std::collections::BTreeMap;

use serde::Serialize;

use super::expand::{self, Resolver};
use super::types::{ConfigError, Source, Variable};

/// Every resolved variable of one invocation.
///
/// Built once by [`resolve`](super::resolve::resolve) and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigurationSnapshot {
  variables: BTreeMap<String, Variable>,
  #[serde(skip)]
  cli: BTreeMap<String, String>,
}

impl ConfigurationSnapshot {
  pub(crate) fn new(variables: BTreeMap<String, Variable>, cli: BTreeMap<String, String>) -> Self {
    Self { variables, cli }
  }

  /// The resolved value, or `None` if no layer defines the variable.
  pub fn get(&self, name: &str) -> Option<&str> {
    self.variables.get(name).map(|v| v.value.as_str())
  }

  /// The resolved value, empty when undefined.
  pub fn value(&self, name: &str) -> &str {
    self.get(name).unwrap_or_default()
  }

  pub fn variable(&self, name: &str) -> Option<&Variable> {
    self.variables.get(name)
  }

  pub fn variables(&self) -> impl Iterator<Item = &Variable> {
    self.variables.values()
  }

  pub fn source_of(&self, name: &str) -> Option<Source> {
    self.variables.get(name).map(|v| v.source)
  }

  pub fn is_exported(&self, name: &str) -> bool {
    self.variables.get(name).is_some_and(|v| v.exported)
  }

  /// Name/value pairs of the export set, sorted by name.
  pub fn exported(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .variables
      .values()
      .filter(|v| v.exported)
      .map(|v| (v.name.as_str(), v.value.as_str()))
  }

  /// The raw value given on the command line, bypassing every operator.
  ///
  /// One-shot variables such as `B=1` only count when typed by the user.
  pub fn cli_value(&self, name: &str) -> Option<&str> {
    self.cli.get(name).map(String::as_str)
  }

  /// Expand `$(NAME)` references in arbitrary text against this snapshot.
  pub fn expand(&self, text: &str) -> Result<String, ConfigError> {
    let mut lookup = Lookup(self);
    expand::expand(text, &mut lookup)
  }
}

struct Lookup<'a>(&'a ConfigurationSnapshot);

impl Resolver for Lookup<'_> {
  fn resolve(&mut self, name: &str) -> Result<String, ConfigError> {
    Ok(self.0.value(name).to_string())
  }
}
