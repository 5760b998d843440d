use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use openbar_lib::config::CliArgs;
use openbar_lib::session::Session;

use crate::output::print_success;

/// Remove the build directory.
pub async fn cmd_clean(root_dir: &Path, args: &CliArgs) -> Result<()> {
  let session = Session::load(root_dir, args.clone(), false).await?;
  let build_dir = &session.project.build_dir;

  if !build_dir.exists() {
    debug!(path = %build_dir.display(), "build directory already absent");
    return Ok(());
  }

  fs::remove_dir_all(build_dir).with_context(|| format!("Failed to remove {}", build_dir.display()))?;
  print_success(&format!("Removed {}", build_dir.display()));
  Ok(())
}
