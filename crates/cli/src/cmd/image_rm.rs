use std::path::Path;

use anyhow::Result;

use openbar_lib::config::CliArgs;
use openbar_lib::orchestrator::Orchestrator;

use super::{engine, load_configured};
use crate::output::{print_info, print_success};

/// Remove the image of the selected container profile.
pub async fn cmd_image_rm(root_dir: &Path, args: &CliArgs) -> Result<()> {
  let session = load_configured(root_dir, args, false).await?;
  let engine = engine(&session);
  let orchestrator = Orchestrator::new(
    &engine,
    &session.snapshot,
    &session.project,
    &session.config,
    session.verbose(),
  )?;

  let tag = orchestrator.source().tag().to_string();
  if orchestrator.remove_image().await? {
    print_success(&format!("Removed image '{tag}'"));
  } else {
    print_info(&format!("No image '{tag}'"));
  }
  Ok(())
}
