//! Project layout derived from the resolved variables.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::config::{ConfigError, ConfigurationSnapshot, Source};
use crate::consts::vars;

/// How the build environment is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
  /// No initialization.
  Simple,
  /// `OB_INITENV_SCRIPT` is sourced before running targets.
  Initenv,
  /// Like `Initenv`, with the build directory passed to the script.
  Yocto,
}

impl ProjectType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProjectType::Simple => "simple",
      ProjectType::Initenv => "initenv",
      ProjectType::Yocto => "yocto",
    }
  }

  pub fn uses_initenv(&self) -> bool {
    matches!(self, ProjectType::Initenv | ProjectType::Yocto)
  }
}

impl FromStr for ProjectType {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "simple" => Ok(ProjectType::Simple),
      "initenv" => Ok(ProjectType::Initenv),
      "yocto" => Ok(ProjectType::Yocto),
      other => Err(ConfigError::InvalidValue {
        name: vars::TYPE,
        value: other.to_string(),
        expected: "simple, initenv or yocto",
      }),
    }
  }
}

impl fmt::Display for ProjectType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Directories and identity of the project being built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectContext {
  pub root_dir: PathBuf,
  pub build_dir: PathBuf,
  pub project_id: String,
  pub defconfig_dir: PathBuf,
  /// Directory holding one subdirectory per container profile.
  pub container_dir: Option<PathBuf>,
  pub project_type: ProjectType,
  pub initenv_script: Option<PathBuf>,
}

impl ProjectContext {
  /// Validate and collect the project variables.
  pub fn from_snapshot(snapshot: &ConfigurationSnapshot) -> Result<Self, ConfigError> {
    let root_dir = required(snapshot, vars::ROOT_DIR)?;
    let root_dir = PathBuf::from(root_dir);
    if !root_dir.is_absolute() {
      return Err(ConfigError::NotAbsolute {
        name: vars::ROOT_DIR,
        value: root_dir.display().to_string(),
      });
    }

    // Only the environment value must be absolute; others are root-relative.
    let build_dir = PathBuf::from(required(snapshot, vars::BUILD_DIR)?);
    let build_dir = match snapshot.source_of(vars::BUILD_DIR) {
      _ if build_dir.is_absolute() => build_dir,
      Some(Source::Env) => {
        return Err(ConfigError::NotAbsolute {
          name: vars::BUILD_DIR,
          value: build_dir.display().to_string(),
        });
      }
      _ => root_dir.join(build_dir),
    };

    let project_id = required(snapshot, vars::PROJECT_ID)?.to_string();
    let project_type: ProjectType = snapshot.value(vars::TYPE).trim().parse()?;

    let defconfig_dir = root_dir.join(snapshot.value(vars::DEFCONFIG_DIR).trim());
    let container_dir = optional_path(&root_dir, snapshot.value(vars::CONTAINER_DIR));

    let initenv_script = optional_path(&root_dir, snapshot.value(vars::INITENV_SCRIPT));
    if project_type.uses_initenv() && initenv_script.is_none() {
      return Err(ConfigError::Missing(vars::INITENV_SCRIPT));
    }

    Ok(Self {
      root_dir,
      build_dir,
      project_id,
      defconfig_dir,
      container_dir,
      project_type,
      initenv_script,
    })
  }

  /// Arguments given to the initenv script.
  pub fn initenv_args(&self) -> Vec<String> {
    match self.project_type {
      ProjectType::Yocto => vec![self.build_dir.to_string_lossy().into_owned()],
      _ => Vec::new(),
    }
  }
}

fn required<'a>(snapshot: &'a ConfigurationSnapshot, name: &'static str) -> Result<&'a str, ConfigError> {
  match snapshot.value(name).trim() {
    "" => Err(ConfigError::Missing(name)),
    value => Ok(value),
  }
}

fn optional_path(root_dir: &Path, value: &str) -> Option<PathBuf> {
  match value.trim() {
    "" => None,
    value => Some(root_dir.join(value)),
  }
}
