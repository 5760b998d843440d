use std::path::Path;

use anyhow::Result;

use openbar_lib::config::CliArgs;
use openbar_lib::config::sources::list_defconfigs;
use openbar_lib::orchestrator::ALL_TARGET;
use openbar_lib::session::Session;

use super::{cmd_defconfig, cmd_run};
use crate::output::print_info;

/// Configure every defconfig in turn and run `targets` (default `all`) for each.
pub async fn cmd_foreach(root_dir: &Path, args: &CliArgs, targets: &[String]) -> Result<()> {
  let session = Session::load(root_dir, args.clone(), false).await?;
  let defconfigs = list_defconfigs(&session.project.defconfig_dir)?;

  if defconfigs.is_empty() {
    print_info(&format!(
      "No defconfig found in {}",
      session.project.defconfig_dir.display()
    ));
    return Ok(());
  }

  let targets = if targets.is_empty() {
    vec![ALL_TARGET.to_string()]
  } else {
    targets.to_vec()
  };

  for defconfig in defconfigs {
    cmd_defconfig(root_dir, args, &defconfig.name).await?;
    cmd_run(root_dir, args, &targets).await?;
  }

  Ok(())
}
