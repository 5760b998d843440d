//! Types shared by the configuration sources and the resolution engine.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Where a definition came from.
///
/// Variants are declared in precedence order: `Cli` beats everything,
/// `Default` loses to everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
  Cli,
  Env,
  Initenv,
  Cfg,
  Default,
}

impl Source {
  pub fn as_str(&self) -> &'static str {
    match self {
      Source::Cli => "cli",
      Source::Env => "env",
      Source::Initenv => "initenv",
      Source::Cfg => "cfg",
      Source::Default => "default",
    }
  }
}

impl fmt::Display for Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// How a definition combines with the definitions of other layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
  /// `NAME = value`: first layer in precedence order wins.
  Set,
  /// `NAME += value`: suffix added to the resolved base.
  Append,
  /// `override NAME = value`: wins over plain definitions of any layer.
  Override,
  /// `reset NAME = value`: discards every lower-precedence definition.
  Reset,
  /// `NAME ?= value`: fallback when nothing else defines the variable.
  Default,
}

impl Operator {
  /// Operators that beat plain definitions regardless of layer.
  pub fn is_forcing(&self) -> bool {
    matches!(self, Operator::Override | Operator::Reset)
  }
}

/// A single `NAME <op> value` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
  pub name: String,
  pub value: String,
  pub operator: Operator,
  /// Declared with `:=`: the value is expanded once, against what is
  /// declared before it.
  pub immediate: bool,
}

impl Definition {
  pub fn new(name: impl Into<String>, value: impl Into<String>, operator: Operator) -> Self {
    Self {
      name: name.into(),
      value: value.into(),
      operator,
      immediate: false,
    }
  }

  /// A `NAME := value` definition.
  pub fn immediate(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      immediate: true,
      ..Self::set(name, value)
    }
  }

  pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self::new(name, value, Operator::Set)
  }
}

/// All definitions contributed by one source, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
  pub source: Source,
  pub definitions: Vec<Definition>,
}

impl Layer {
  pub fn new(source: Source) -> Self {
    Self {
      source,
      definitions: Vec::new(),
    }
  }

  /// Build a layer of plain `SET` definitions.
  pub fn from_pairs<I, K, V>(source: Source, pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      source,
      definitions: pairs.into_iter().map(|(k, v)| Definition::set(k, v)).collect(),
    }
  }

  pub fn push(&mut self, definition: Definition) {
    self.definitions.push(definition);
  }

  pub fn with(mut self, definition: Definition) -> Self {
    self.push(definition);
    self
  }

  pub fn extend(&mut self, definitions: impl IntoIterator<Item = Definition>) {
    self.definitions.extend(definitions);
  }

  pub fn defines(&self, name: &str) -> bool {
    self.definitions.iter().any(|d| d.name == name)
  }
}

/// A resolved variable as seen by consumers of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
  pub name: String,
  pub value: String,
  /// Layer of the definition that provided the base value.
  pub source: Source,
  /// Operator of that definition.
  pub operator: Operator,
  pub exported: bool,
}

/// Errors raised while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("{}:{line}: {message}", file.display())]
  Syntax {
    file: PathBuf,
    line: usize,
    message: String,
  },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("failed to write {}: {source}", path.display())]
  Write { path: PathBuf, source: std::io::Error },

  #[error("Configuration file not found.")]
  NotConfigured,

  #[error("{0} is not set")]
  Missing(&'static str),

  #[error("unknown configuration target: {0}")]
  UnknownDefconfig(String),

  #[error("{name} must be an absolute path: {value}")]
  NotAbsolute { name: &'static str, value: String },

  #[error("invalid value for {name}: '{value}' (expected {expected})")]
  InvalidValue {
    name: &'static str,
    value: String,
    expected: &'static str,
  },

  #[error("recursive variable reference: {}", chain.join(" -> "))]
  Recursive { chain: Vec<String> },

  #[error("unclosed variable reference at position {position} in '{input}'")]
  Unclosed { input: String, position: usize },

  #[error("initenv script {} failed: {message}", script.display())]
  Initenv { script: PathBuf, message: String },
}
