use std::path::Path;

use anyhow::Result;
use tracing::debug;

use openbar_lib::config::CliArgs;
use openbar_lib::config::sources::select_defconfig;
use openbar_lib::session::Session;

/// Select a defconfig as the persisted configuration.
pub async fn cmd_defconfig(root_dir: &Path, args: &CliArgs, name: &str) -> Result<()> {
  let session = Session::load(root_dir, args.clone(), false).await?;
  let project = &session.project;

  let path = select_defconfig(&project.defconfig_dir, &project.root_dir, name)?;
  debug!(path = %path.display(), "wrote configuration");

  println!("Build configured for {name}");
  Ok(())
}
