//! The variable resolution engine.
//!
//! [`resolve`] turns a stack of layers into an immutable
//! [`ConfigurationSnapshot`]. It is a pure function: the same layers always
//! produce the same snapshot, whatever order they are passed in.
//!
//! Per variable:
//! - the base value comes from the highest-precedence `override`/`reset`
//!   definition if there is one, otherwise from the highest-precedence plain
//!   definition, otherwise from the highest-precedence `?=` fallback;
//! - inside one layer the last declaration wins;
//! - appends are added on top of the base, lowest layer first, except those
//!   below a winning `reset`;
//! - `$(NAME)` references are expanded recursively once the raw values are
//!   known.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;

use crate::consts::vars;

use super::expand::{self, Resolver};
use super::snapshot::ConfigurationSnapshot;
use super::sources::escape;
use super::types::{ConfigError, Definition, Layer, Operator, Source, Variable};

/// Join an appended suffix onto a base value.
///
/// An empty base yields the suffix alone, otherwise the two are separated by
/// one space.
pub fn append_value(base: &str, suffix: &str) -> String {
  if base.is_empty() {
    suffix.to_string()
  } else {
    format!("{base} {suffix}")
  }
}

/// Raw (unexpanded) contributions to one variable.
#[derive(Debug)]
struct RawVariable<'a> {
  base: Option<(Source, &'a Definition)>,
  appends: Vec<(Source, &'a Definition)>,
}

impl RawVariable<'_> {
  fn origin(&self) -> (Source, Operator) {
    match (&self.base, self.appends.first()) {
      (Some((source, def)), _) => (*source, def.operator),
      (None, Some((source, def))) => (*source, def.operator),
      (None, None) => (Source::Default, Operator::Set),
    }
  }
}

/// Resolve a stack of layers into a snapshot.
///
/// # Errors
///
/// Returns an error if a value contains an unclosed reference or if
/// variables reference each other in a cycle.
pub fn resolve(layers: &[Layer]) -> Result<ConfigurationSnapshot, ConfigError> {
  // Highest precedence first; stable so equal sources keep their order.
  let mut ordered: Vec<&Layer> = layers.iter().collect();
  ordered.sort_by_key(|layer| layer.source);

  if ordered.iter().any(|layer| layer.definitions.iter().any(|d| d.immediate)) {
    let expanded = expand_immediate(&ordered)?;
    return resolve(&expanded);
  }

  let names: BTreeSet<&str> = ordered
    .iter()
    .flat_map(|layer| layer.definitions.iter().map(|d| d.name.as_str()))
    .collect();

  let raw: BTreeMap<&str, RawVariable<'_>> = names
    .iter()
    .map(|name| (*name, collect_raw(&ordered, name)))
    .collect();

  let mut expander = Expander {
    raw: &raw,
    cache: HashMap::new(),
    stack: Vec::new(),
  };

  let mut values = BTreeMap::new();
  for name in raw.keys() {
    let value = expander.resolve(name)?;
    values.insert(name.to_string(), value);
  }

  let cli: BTreeMap<String, String> = ordered
    .iter()
    .filter(|layer| layer.source == Source::Cli)
    .flat_map(|layer| layer.definitions.iter())
    .map(|d| (d.name.clone(), d.value.clone()))
    .collect();

  let mut exported: BTreeSet<String> = ordered
    .iter()
    .filter(|layer| matches!(layer.source, Source::Cli | Source::Initenv))
    .flat_map(|layer| layer.definitions.iter().map(|d| d.name.clone()))
    .collect();
  if let Some(directive) = values.get(vars::EXPORT) {
    exported.extend(directive.split_whitespace().map(str::to_string));
  }

  let variables = values
    .into_iter()
    .map(|(name, value)| {
      let (source, operator) = raw[name.as_str()].origin();
      let variable = Variable {
        exported: exported.contains(&name),
        name: name.clone(),
        value,
        source,
        operator,
      };
      (name, variable)
    })
    .collect();

  Ok(ConfigurationSnapshot::new(variables, cli))
}

/// Replace every `:=` value by its expansion against the definitions
/// declared before it: lower layers, then earlier lines of its own layer.
fn expand_immediate(ordered: &[&Layer]) -> Result<Vec<Layer>, ConfigError> {
  let mut done: Vec<Layer> = Vec::with_capacity(ordered.len());

  for layer in ordered.iter().rev() {
    let mut current = Layer::new(layer.source);
    for definition in &layer.definitions {
      let mut definition = definition.clone();
      if definition.immediate {
        let mut before = done.clone();
        before.push(current.clone());
        let value = resolve(&before)?.expand(&definition.value)?;
        trace!(name = %definition.name, value = %value, "expanded immediate definition");
        definition.value = escape(&value);
        definition.immediate = false;
      }
      current.push(definition);
    }
    done.push(current);
  }

  done.reverse();
  Ok(done)
}

fn collect_raw<'a>(ordered: &[&'a Layer], name: &str) -> RawVariable<'a> {
  // Every definition of `name`, highest precedence first, and inside a layer
  // last declaration first.
  let defs: Vec<(Source, &'a Definition)> = ordered
    .iter()
    .flat_map(|layer| {
      layer
        .definitions
        .iter()
        .rev()
        .filter(move |d| d.name == name)
        .map(move |d| (layer.source, d))
    })
    .collect();

  let forcing = defs.iter().position(|(_, d)| d.operator.is_forcing());

  let base = match forcing {
    Some(index) => Some(defs[index]),
    None => defs
      .iter()
      .find(|(_, d)| d.operator == Operator::Set)
      .or_else(|| defs.iter().find(|(_, d)| d.operator == Operator::Default))
      .copied(),
  };

  // A reset hides every append declared below it.
  let visible = match forcing {
    Some(index) if defs[index].1.operator == Operator::Reset => &defs[..index],
    _ => &defs[..],
  };

  let appends = visible
    .iter()
    .rev()
    .filter(|(_, d)| d.operator == Operator::Append)
    .copied()
    .collect();

  RawVariable { base, appends }
}

/// Expands raw values with memoization and cycle detection.
struct Expander<'r, 'a> {
  raw: &'r BTreeMap<&'a str, RawVariable<'a>>,
  cache: HashMap<String, String>,
  stack: Vec<String>,
}

impl Resolver for Expander<'_, '_> {
  fn resolve(&mut self, name: &str) -> Result<String, ConfigError> {
    if let Some(value) = self.cache.get(name) {
      return Ok(value.clone());
    }

    if self.stack.iter().any(|n| n == name) {
      let mut chain = self.stack.clone();
      chain.push(name.to_string());
      return Err(ConfigError::Recursive { chain });
    }

    let Some(raw) = self.raw.get(name) else {
      return Ok(String::new());
    };

    self.stack.push(name.to_string());

    let mut value = match raw.base {
      Some((_, def)) => expand::expand(&def.value, self)?,
      None => String::new(),
    };
    for (_, def) in &raw.appends {
      let suffix = expand::expand(&def.value, self)?;
      value = append_value(&value, &suffix);
    }

    self.stack.pop();
    trace!(name, value = %value, "resolved variable");
    self.cache.insert(name.to_string(), value.clone());
    Ok(value)
  }
}
