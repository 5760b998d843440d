use std::path::Path;

use anyhow::Result;

use openbar_lib::config::CliArgs;
use openbar_lib::orchestrator::Orchestrator;

use super::{engine, load_configured};

/// Run project targets (and `all`) inside the container.
pub async fn cmd_run(root_dir: &Path, args: &CliArgs, targets: &[String]) -> Result<()> {
  let session = load_configured(root_dir, args, true).await?;
  let engine = engine(&session);
  let orchestrator = Orchestrator::new(
    &engine,
    &session.snapshot,
    &session.project,
    &session.config,
    session.verbose(),
  )?;

  orchestrator.run(targets).await?;
  Ok(())
}
