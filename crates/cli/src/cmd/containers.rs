use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use openbar_lib::config::CliArgs;
use openbar_lib::consts::vars;
use openbar_lib::container::TagScheme;
use openbar_lib::container::profile;
use openbar_lib::session::Session;

use crate::output::{OutputFormat, print_entry, print_header, print_info, print_json, truncate_hash};

#[derive(Serialize)]
struct ProfileEntry {
  name: String,
  tag: String,
  digest: String,
  selected: bool,
}

/// List container profiles with the tag each one builds.
pub async fn cmd_containers(root_dir: &Path, args: &CliArgs, format: OutputFormat) -> Result<()> {
  let session = Session::load(root_dir, args.clone(), false).await?;
  let snapshot = &session.snapshot;

  let Some(container_dir) = &session.project.container_dir else {
    if format.is_json() {
      print_json(&Vec::<ProfileEntry>::new())?;
    } else {
      print_info("No container directory configured");
    }
    return Ok(());
  };

  let scheme: TagScheme = snapshot.value(vars::CONTAINER_TAG).trim().parse()?;
  let registry = snapshot.value(vars::CONTAINER_REGISTRY).trim();
  let selected = snapshot.value(vars::CONTAINER).trim();

  let entries: Vec<ProfileEntry> = profile::discover(container_dir)?
    .into_iter()
    .map(|context| ProfileEntry {
      tag: context.tag(scheme, &session.project.project_id, registry).to_string(),
      digest: context.digest.to_string(),
      selected: context.profile == selected,
      name: context.profile,
    })
    .collect();

  if format.is_json() {
    return print_json(&entries);
  }

  print_header("Container profiles:");
  for entry in &entries {
    let description = format!("{} ({})", entry.tag, truncate_hash(&entry.digest));
    print_entry(&entry.name, entry.selected, Some(&description));
  }
  Ok(())
}
