//! Build/pull decisions.
//!
//! [`decide`] is a pure function of the one-shot flag (`B=`/`P=` on the
//! command line), the force flag (`OB_CONTAINER_FORCE_BUILD`/`_PULL`), the
//! policy mode (`OB_CONTAINER_POLICY`) and the state of the image. Earlier
//! inputs win: one-shot, then force, then mode. Without any signal the mode
//! is `missing`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, ConfigurationSnapshot};
use crate::consts::vars;

/// Named strategy for when to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
  Always,
  Newer,
  #[default]
  Missing,
  Never,
}

impl FromStr for PolicyMode {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "always" => Ok(PolicyMode::Always),
      "newer" => Ok(PolicyMode::Newer),
      "missing" => Ok(PolicyMode::Missing),
      "never" => Ok(PolicyMode::Never),
      other => Err(ConfigError::InvalidValue {
        name: vars::CONTAINER_POLICY,
        value: other.to_string(),
        expected: "always, newer, missing or never",
      }),
    }
  }
}

/// What the image store holds under the current tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageState {
  Missing,
  Present,
  /// Present, but built from other content.
  Stale,
}

/// The lifecycle action a profile uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
  Build,
  Pull,
}

impl Action {
  pub fn as_str(&self) -> &'static str {
    match self {
      Action::Build => "build",
      Action::Pull => "pull",
    }
  }

  fn one_shot_var(&self) -> &'static str {
    match self {
      Action::Build => vars::ONE_SHOT_BUILD,
      Action::Pull => vars::ONE_SHOT_PULL,
    }
  }

  fn force_var(&self) -> &'static str {
    match self {
      Action::Build => vars::CONTAINER_FORCE_BUILD,
      Action::Pull => vars::CONTAINER_FORCE_PULL,
    }
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyDecision {
  Build,
  Pull,
  Skip,
  /// Skip was chosen but the image does not exist.
  Error,
}

/// The policy signals of one invocation, parsed once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyInputs {
  pub one_shot: Option<bool>,
  pub force: Option<bool>,
  pub mode: Option<PolicyMode>,
}

impl PolicyInputs {
  /// Read the signals for `action`. One-shot flags only count when given on
  /// the command line.
  pub fn from_snapshot(snapshot: &ConfigurationSnapshot, action: Action) -> Result<Self, ConfigError> {
    let one_shot_var = action.one_shot_var();
    let one_shot = match snapshot.cli_value(one_shot_var) {
      Some(value) => parse_flag(one_shot_var, value)?,
      None => None,
    };

    let force_var = action.force_var();
    let force = parse_flag(force_var, snapshot.value(force_var))?;

    let mode = match snapshot.value(vars::CONTAINER_POLICY).trim() {
      "" => None,
      value => Some(value.parse()?),
    };

    Ok(Self { one_shot, force, mode })
  }
}

fn parse_flag(name: &'static str, value: &str) -> Result<Option<bool>, ConfigError> {
  match value.trim() {
    "" => Ok(None),
    "1" => Ok(Some(true)),
    "0" => Ok(Some(false)),
    other => Err(ConfigError::InvalidValue {
      name,
      value: other.to_string(),
      expected: "0 or 1",
    }),
  }
}

/// Decide what to do for `action` given the signals and the image state.
pub fn decide(action: Action, inputs: &PolicyInputs, state: ImageState) -> PolicyDecision {
  let act = match (inputs.one_shot, inputs.force) {
    (Some(flag), _) | (None, Some(flag)) => flag,
    (None, None) => match inputs.mode.unwrap_or_default() {
      PolicyMode::Always => true,
      PolicyMode::Never => false,
      PolicyMode::Missing => state == ImageState::Missing,
      PolicyMode::Newer => state != ImageState::Present,
    },
  };

  match (act, action, state) {
    (true, Action::Build, _) => PolicyDecision::Build,
    (true, Action::Pull, _) => PolicyDecision::Pull,
    (false, _, ImageState::Missing) => PolicyDecision::Error,
    (false, _, _) => PolicyDecision::Skip,
  }
}

#[derive(Debug, Error)]
pub enum PolicyError {
  #[error("container image '{tag}' does not exist and the policy forbids to {action} it")]
  MissingImage { tag: String, action: Action },
}
