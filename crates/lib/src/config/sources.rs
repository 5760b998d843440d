//! Configuration sources: command line, process environment, built-in
//! defaults, defconfigs and the persisted `.config`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::consts::{
  CONFIG_FILENAME, DEFAULT_ENGINE, DEFAULT_PROFILE, DEFAULT_REGISTRY_PREFIX, DEFCONFIG_SUFFIX, PROJECT_FILENAME, vars,
};

use super::parse::{ConfigFile, is_valid_name};
use super::types::{ConfigError, Definition, Layer, Operator, Source};

/// Command-line tokens split into `KEY=value` overrides and targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
  pub overrides: Vec<(String, String)>,
  pub targets: Vec<String>,
}

impl CliArgs {
  /// Split raw tokens. The shell has already removed the quoting, so a value
  /// is kept verbatim, spaces included.
  pub fn parse<I, S>(tokens: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut args = Self::default();
    for token in tokens {
      let token = token.into();
      match token.split_once('=') {
        Some((key, value)) if is_valid_name(key) => args.overrides.push((key.to_string(), value.to_string())),
        _ => args.targets.push(token),
      }
    }
    args
  }

  /// The CLI layer. `O=` and `V=` also set the variables they stand for.
  pub fn layer(&self, root_dir: &Path) -> Layer {
    let mut layer = Layer::from_pairs(Source::Cli, self.overrides.iter().cloned());

    if let Some(dir) = self.value(vars::ONE_SHOT_BUILD_DIR) {
      let dir = root_dir.join(dir);
      layer.push(Definition::set(vars::BUILD_DIR, escape(&dir.to_string_lossy())));
    }
    if let Some(verbose) = self.value(vars::ONE_SHOT_VERBOSE) {
      layer.push(Definition::set(vars::VERBOSE, verbose));
    }

    layer
  }

  /// Last value given for `key`.
  pub fn value(&self, key: &str) -> Option<&str> {
    self
      .overrides
      .iter()
      .rev()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }
}

/// Escape `$` so a value is taken literally by the expander.
pub fn escape(value: &str) -> String {
  value.replace('$', "$$")
}

/// Build a layer whose values are literal text, never expanded.
pub fn literal_layer<I>(source: Source, vars: I) -> Layer
where
  I: IntoIterator<Item = (String, String)>,
{
  Layer::from_pairs(
    source,
    vars
      .into_iter()
      .filter(|(name, _)| is_valid_name(name))
      .map(|(name, value)| (name, escape(&value))),
  )
}

/// The ENV layer from the current process environment.
pub fn env_layer() -> Layer {
  literal_layer(Source::Env, std::env::vars())
}

/// Keep ENV precedence only for the `named` variables.
///
/// Every other environment variable becomes a `?=` fallback, so the
/// initenv script, `.config` and the project file can still set it.
pub fn scope_env(env: &Layer, named: &BTreeSet<String>) -> Layer {
  let mut scoped = Layer::new(env.source);
  for definition in &env.definitions {
    let mut definition = definition.clone();
    if definition.operator == Operator::Set && !named.contains(&definition.name) {
      definition.operator = Operator::Default;
    }
    scoped.push(definition);
  }
  scoped
}

/// Built-in declarations, evaluated before the project file.
pub fn builtin_layer(root_dir: &Path) -> Layer {
  let project_id = root_dir
    .file_name()
    .map(|name| name.to_string_lossy().to_lowercase())
    .unwrap_or_default();

  let fallback = |name: &str, value: &str| Definition::new(name, value, Operator::Default);

  Layer::new(Source::Default)
    .with(fallback(vars::ROOT_DIR, &escape(&root_dir.to_string_lossy())))
    .with(fallback(vars::BUILD_DIR, "$(OB_ROOT_DIR)/build"))
    .with(fallback(vars::PROJECT_ID, &escape(&project_id)))
    .with(fallback(vars::TYPE, "simple"))
    .with(fallback(vars::VERBOSE, "0"))
    .with(fallback(vars::DEFCONFIG_DIR, "$(OB_ROOT_DIR)/configs"))
    .with(fallback(vars::CONTAINER, DEFAULT_PROFILE))
    .with(fallback(vars::CONTAINER_ENGINE, DEFAULT_ENGINE))
    .with(fallback(vars::CONTAINER_TAG, "digest"))
    .with(fallback(vars::CONTAINER_REGISTRY, DEFAULT_REGISTRY_PREFIX))
    .with(Definition::new(vars::EXPORT, vars::CORE_EXPORTS.join(" "), Operator::Append))
}

/// Load `openbar.mk` from the root directory, if present.
pub fn load_project(root_dir: &Path) -> Result<ConfigFile, ConfigError> {
  let path = root_dir.join(PROJECT_FILENAME);
  let project = ConfigFile::load_optional(&path)?.unwrap_or_default();
  debug!(path = %path.display(), definitions = project.definitions.len(), "loaded project file");
  Ok(project)
}

/// Load the persisted `.config`, returning `None` when the project is not
/// configured yet.
pub fn load_persisted(root_dir: &Path) -> Result<Option<ConfigFile>, ConfigError> {
  ConfigFile::load_optional(&persisted_path(root_dir))
}

pub fn persisted_path(root_dir: &Path) -> PathBuf {
  root_dir.join(CONFIG_FILENAME)
}

/// A defconfig file found in the defconfig directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defconfig {
  /// File name, which is also the configuration target (`hello_defconfig`).
  pub name: String,
  pub path: PathBuf,
}

/// Returns true if `target` names a configuration target.
pub fn is_defconfig_target(target: &str) -> bool {
  target.len() > DEFCONFIG_SUFFIX.len() && target.ends_with(DEFCONFIG_SUFFIX)
}

/// List the defconfigs of a directory, sorted by name. A missing directory
/// has none.
pub fn list_defconfigs(dir: &Path) -> Result<Vec<Defconfig>, ConfigError> {
  if !dir.is_dir() {
    return Ok(Vec::new());
  }

  let mut defconfigs = Vec::new();
  for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|e| ConfigError::Read {
      path: dir.to_path_buf(),
      source: e.into(),
    })?;
    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_file() && is_defconfig_target(&name) {
      defconfigs.push(Defconfig {
        name: name.into_owned(),
        path: entry.path().to_path_buf(),
      });
    }
  }

  Ok(defconfigs)
}

/// Copy a defconfig to `.config` in the root directory.
pub fn select_defconfig(defconfig_dir: &Path, root_dir: &Path, name: &str) -> Result<PathBuf, ConfigError> {
  let source = defconfig_dir.join(name);
  if !is_defconfig_target(name) || !source.is_file() {
    return Err(ConfigError::UnknownDefconfig(name.to_string()));
  }

  // Reject broken defconfigs before they become the persisted config.
  ConfigFile::load(&source)?;

  let dest = persisted_path(root_dir);
  fs::copy(&source, &dest).map_err(|e| ConfigError::Write {
    path: dest.clone(),
    source: e,
  })?;

  info!(defconfig = name, path = %dest.display(), "selected defconfig");
  Ok(dest)
}
