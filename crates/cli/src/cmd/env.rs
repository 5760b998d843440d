use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

use openbar_lib::config::CliArgs;

use super::load_configured;
use crate::output::{OutputFormat, print_json};

/// Print the environment exported to targets.
pub async fn cmd_env(root_dir: &Path, args: &CliArgs, format: OutputFormat) -> Result<()> {
  let session = load_configured(root_dir, args, true).await?;

  if format.is_json() {
    let exported: BTreeMap<&str, &str> = session.snapshot.exported().collect();
    print_json(&exported)?;
  } else {
    for (name, value) in session.snapshot.exported() {
      println!("{name}={value}");
    }
  }

  Ok(())
}
