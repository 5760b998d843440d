use std::path::Path;

use anyhow::Result;

use openbar_lib::config::CliArgs;
use openbar_lib::config::sources::list_defconfigs;
use openbar_lib::consts::vars;
use openbar_lib::session::Session;

use crate::output::{print_entry, print_header};

const USEFUL_TARGETS: &[(&str, &str)] = &[
  ("all", "Run the default targets"),
  ("shell", "Open a shell in the container"),
  ("env", "Print the exported environment"),
  ("foreach", "Run targets for every defconfig"),
  ("clean", "Remove the build directory"),
  ("image-rm", "Remove the container image"),
  ("containers", "List container profiles"),
  ("help", "Show this help"),
];

/// List configured, configuration and built-in targets.
pub async fn cmd_help(root_dir: &Path, args: &CliArgs) -> Result<()> {
  let session = Session::load(root_dir, args.clone(), false).await?;
  let defaults: Vec<&str> = session.snapshot.value(vars::ALL_TARGETS).split_whitespace().collect();

  if session.configured && !session.config.targets.is_empty() {
    print_header("Configured targets:");
    for target in &session.config.targets {
      print_entry(&target.name, defaults.contains(&target.name.as_str()), None);
    }
    println!();
  }

  let defconfigs = list_defconfigs(&session.project.defconfig_dir)?;
  if !defconfigs.is_empty() {
    print_header("Configuration targets:");
    for defconfig in &defconfigs {
      print_entry(&defconfig.name, false, None);
    }
    println!();
  }

  print_header("Useful targets:");
  for (name, description) in USEFUL_TARGETS {
    print_entry(name, false, Some(description));
  }

  Ok(())
}
