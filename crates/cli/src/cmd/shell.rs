use std::path::Path;

use anyhow::Result;

use openbar_lib::config::CliArgs;
use openbar_lib::orchestrator::Orchestrator;

use super::{engine, load_configured};

/// Open an interactive shell in the project container.
pub async fn cmd_shell(root_dir: &Path, args: &CliArgs) -> Result<()> {
  let session = load_configured(root_dir, args, true).await?;
  let engine = engine(&session);
  let orchestrator = Orchestrator::new(
    &engine,
    &session.snapshot,
    &session.project,
    &session.config,
    session.verbose(),
  )?;

  orchestrator.shell().await?;
  Ok(())
}
