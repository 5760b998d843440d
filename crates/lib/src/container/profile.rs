//! Discovery of the container profiles of a project.

use std::path::Path;

use walkdir::WalkDir;

use crate::consts::CONTEXT_FILENAME;

use super::tag::{BuildContextDescriptor, TagError};

/// Every subdirectory of `container_dir` holding a `Dockerfile`, sorted by
/// profile name. A missing directory has no profiles.
pub fn discover(container_dir: &Path) -> Result<Vec<BuildContextDescriptor>, TagError> {
  if !container_dir.is_dir() {
    return Ok(Vec::new());
  }

  let mut profiles = Vec::new();
  for entry in WalkDir::new(container_dir).min_depth(1).max_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|e| TagError::Read {
      path: container_dir.to_path_buf(),
      source: e.into(),
    })?;

    if !entry.file_type().is_dir() || !entry.path().join(CONTEXT_FILENAME).is_file() {
      continue;
    }

    let name = entry.file_name().to_string_lossy();
    profiles.push(BuildContextDescriptor::load(container_dir, &name)?);
  }

  Ok(profiles)
}
