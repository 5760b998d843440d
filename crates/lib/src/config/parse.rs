//! Parser for the line-oriented config language.
//!
//! The project file, defconfigs and the persisted `.config` share one syntax:
//!
//! ```text
//! # comment
//! NAME = value            # SET (also `:=`)
//! NAME += value           # APPEND
//! NAME ?= value           # DEFAULT
//! override NAME = value   # OVERRIDE
//! reset NAME = value      # RESET
//! export NAME OTHER       # add names to OB_EXPORT
//! export NAME = value     # SET and export
//!
//! target: prerequisite
//! 	command one
//! 	command two
//! ```
//!
//! A trailing `\` joins a line with the next one.

use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::vars;

use super::types::{ConfigError, Definition, Operator};

/// A target declared in a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
  pub name: String,
  pub prerequisites: Vec<String>,
  pub commands: Vec<String>,
}

/// The parsed content of one config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
  pub definitions: Vec<Definition>,
  pub targets: Vec<Target>,
}

impl ConfigFile {
  /// Read and parse a config file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
      path: path.to_path_buf(),
      source: e,
    })?;
    parse(&content, path)
  }

  /// Read and parse a config file, returning `None` if it does not exist.
  pub fn load_optional(path: &Path) -> Result<Option<Self>, ConfigError> {
    if !path.is_file() {
      return Ok(None);
    }
    Self::load(path).map(Some)
  }

  pub fn target(&self, name: &str) -> Option<&Target> {
    self.targets.iter().rev().find(|t| t.name == name)
  }

  /// Merge another file on top of this one; its targets replace same-named ones.
  pub fn merge(&mut self, other: ConfigFile) {
    self.definitions.extend(other.definitions);
    for target in other.targets {
      self.targets.retain(|t| t.name != target.name);
      self.targets.push(target);
    }
  }
}

/// Returns true for names usable as variables or targets.
pub fn is_valid_name(name: &str) -> bool {
  !name.is_empty()
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Parse config file content. `file` is only used in error messages.
pub fn parse(content: &str, file: &Path) -> Result<ConfigFile, ConfigError> {
  let mut config = ConfigFile::default();
  let mut current: Option<Target> = None;

  for (line_no, line) in logical_lines(content) {
    let err = |message: String| ConfigError::Syntax {
      file: PathBuf::from(file),
      line: line_no,
      message,
    };

    let indented = line.starts_with('\t') || line.starts_with(' ');
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with('#') {
      continue;
    }

    if indented && current.is_some() {
      if let Some(target) = current.as_mut() {
        target.commands.push(trimmed.to_string());
      }
      continue;
    }

    if let Some(target) = current.take() {
      config.targets.push(target);
    }

    if let Some(rest) = keyword(trimmed, "export") {
      config.definitions.extend(parse_export(rest).map_err(err)?);
      continue;
    }

    if let Some(rest) = keyword(trimmed, "override") {
      let mut definition = parse_assignment(rest).map_err(err)?;
      if definition.operator != Operator::Append {
        definition.operator = Operator::Override;
      }
      config.definitions.push(definition);
      continue;
    }

    if let Some(rest) = keyword(trimmed, "reset") {
      let mut definition = parse_assignment(rest).map_err(err)?;
      definition.operator = Operator::Reset;
      config.definitions.push(definition);
      continue;
    }

    if trimmed.contains('=') {
      config.definitions.push(parse_assignment(trimmed).map_err(err)?);
      continue;
    }

    if let Some((name, prerequisites)) = trimmed.split_once(':') {
      let name = name.trim();
      if !is_valid_name(name) {
        return Err(err(format!("invalid target name '{name}'")));
      }
      current = Some(Target {
        name: name.to_string(),
        prerequisites: prerequisites.split_whitespace().map(str::to_string).collect(),
        commands: Vec::new(),
      });
      continue;
    }

    return Err(err(format!("expected an assignment or a target, found '{trimmed}'")));
  }

  if let Some(target) = current {
    config.targets.push(target);
  }

  Ok(config)
}

/// Join continuation lines, keeping the number of the first physical line.
fn logical_lines(content: &str) -> Vec<(usize, String)> {
  let mut lines = Vec::new();
  let mut pending: Option<(usize, String)> = None;

  for (index, raw) in content.lines().enumerate() {
    let (start, mut text) = match pending.take() {
      Some((start, mut text)) => {
        text.push(' ');
        text.push_str(raw.trim_start());
        (start, text)
      }
      None => (index + 1, raw.to_string()),
    };

    if text.ends_with('\\') {
      text.pop();
      pending = Some((start, text.trim_end().to_string()));
    } else {
      lines.push((start, text));
    }
  }

  if let Some(line) = pending {
    lines.push(line);
  }

  lines
}

/// Strip a leading keyword followed by whitespace.
fn keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
  let rest = line.strip_prefix(keyword)?;
  if rest.starts_with(char::is_whitespace) {
    Some(rest.trim_start())
  } else {
    None
  }
}

fn parse_assignment(text: &str) -> Result<Definition, String> {
  let eq = text
    .find('=')
    .ok_or_else(|| format!("expected an assignment, found '{text}'"))?;

  let (lhs, operator, immediate) = match text[..eq].chars().last() {
    Some('+') => (&text[..eq - 1], Operator::Append, false),
    Some('?') => (&text[..eq - 1], Operator::Default, false),
    Some(':') => (&text[..eq - 1], Operator::Set, true),
    _ => (&text[..eq], Operator::Set, false),
  };

  let name = lhs.trim();
  if !is_valid_name(name) {
    return Err(format!("invalid variable name '{name}'"));
  }

  let mut definition = Definition::new(name, strip_comment(&text[eq + 1..]), operator);
  definition.immediate = immediate;
  Ok(definition)
}

/// Cut a trailing `# comment`; `\#` is a literal `#`.
fn strip_comment(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  let mut chars = text.chars().peekable();
  while let Some(c) = chars.next() {
    match c {
      '\\' if chars.peek() == Some(&'#') => {
        out.push('#');
        chars.next();
      }
      '#' => break,
      c => out.push(c),
    }
  }
  out.trim().to_string()
}

fn parse_export(rest: &str) -> Result<Vec<Definition>, String> {
  if rest.contains('=') {
    let definition = parse_assignment(rest)?;
    let export = Definition::new(vars::EXPORT, definition.name.clone(), Operator::Append);
    return Ok(vec![definition, export]);
  }

  let rest = strip_comment(rest);
  let names: Vec<&str> = rest.split_whitespace().collect();
  if let Some(bad) = names.iter().find(|n| !is_valid_name(n)) {
    return Err(format!("invalid variable name '{bad}'"));
  }
  if names.is_empty() {
    return Err("export needs at least one name".to_string());
  }

  Ok(vec![Definition::new(vars::EXPORT, names.join(" "), Operator::Append)])
}
