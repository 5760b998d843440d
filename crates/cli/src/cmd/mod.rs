//! Target dispatch.
//!
//! Targets are handled left to right. Consecutive project targets run as one
//! batch; built-in targets run on their own. The session is reloaded before
//! each step so a configuration target takes effect for the targets after it.

mod clean;
mod containers;
mod defconfig;
mod env;
mod foreach;
mod help;
mod image_rm;
mod run;
mod shell;

use std::path::Path;

use anyhow::Result;

use openbar_lib::config::sources::{is_defconfig_target, list_defconfigs};
use openbar_lib::config::{CliArgs, ConfigError};
use openbar_lib::container::CliEngine;
use openbar_lib::orchestrator::ALL_TARGET;
use openbar_lib::session::Session;

use crate::output::OutputFormat;

pub use clean::cmd_clean;
pub use containers::cmd_containers;
pub use defconfig::cmd_defconfig;
pub use env::cmd_env;
pub use foreach::cmd_foreach;
pub use help::cmd_help;
pub use image_rm::cmd_image_rm;
pub use run::cmd_run;
pub use shell::cmd_shell;

/// Targets implemented by the tool itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Builtin {
  Help,
  Shell,
  Env,
  Foreach,
  Clean,
  ImageRm,
  Containers,
  Defconfig(String),
}

impl Builtin {
  pub fn parse(target: &str) -> Option<Self> {
    match target {
      "help" => Some(Builtin::Help),
      "shell" => Some(Builtin::Shell),
      "env" => Some(Builtin::Env),
      "foreach" => Some(Builtin::Foreach),
      "clean" => Some(Builtin::Clean),
      "image-rm" => Some(Builtin::ImageRm),
      "containers" => Some(Builtin::Containers),
      t if is_defconfig_target(t) => Some(Builtin::Defconfig(t.to_string())),
      _ => None,
    }
  }
}

pub async fn dispatch(root_dir: &Path, args: CliArgs, format: OutputFormat) -> Result<()> {
  let mut targets = args.targets.clone();
  if targets.is_empty() {
    targets.push(ALL_TARGET.to_string());
  }

  let mut pending = Vec::new();
  let mut targets = targets.into_iter();

  while let Some(target) = targets.next() {
    let Some(builtin) = Builtin::parse(&target) else {
      pending.push(target);
      continue;
    };

    if !pending.is_empty() {
      cmd_run(root_dir, &args, &std::mem::take(&mut pending)).await?;
    }

    match builtin {
      Builtin::Help => cmd_help(root_dir, &args).await?,
      Builtin::Shell => cmd_shell(root_dir, &args).await?,
      Builtin::Env => cmd_env(root_dir, &args, format).await?,
      Builtin::Clean => cmd_clean(root_dir, &args).await?,
      Builtin::ImageRm => cmd_image_rm(root_dir, &args).await?,
      Builtin::Containers => cmd_containers(root_dir, &args, format).await?,
      Builtin::Defconfig(name) => cmd_defconfig(root_dir, &args, &name).await?,
      Builtin::Foreach => {
        let rest: Vec<String> = targets.by_ref().collect();
        cmd_foreach(root_dir, &args, &rest).await?;
      }
    }
  }

  if !pending.is_empty() {
    cmd_run(root_dir, &args, &pending).await?;
  }

  Ok(())
}

/// Load a session that must have a `.config`.
///
/// An unconfigured project prints the configuration targets and fails.
pub async fn load_configured(root_dir: &Path, args: &CliArgs, initenv: bool) -> Result<Session> {
  let session = Session::load(root_dir, args.clone(), initenv).await?;
  if !session.configured {
    println!("Please use one of the following configuration targets:");
    for defconfig in list_defconfigs(&session.project.defconfig_dir)? {
      println!("  {}", defconfig.name);
    }
    return Err(ConfigError::NotConfigured.into());
  }
  Ok(session)
}

pub fn engine(session: &Session) -> CliEngine {
  CliEngine::new(session.engine_name(), session.verbose())
}
