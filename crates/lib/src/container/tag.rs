//! Content-derived image identity.
//!
//! A container profile is a directory holding a `Dockerfile`. The SHA-256 of
//! that file identifies the build context, so an image tag derived from it is
//! a cache key: the tag exists in the image store iff content-identical input
//! has already been built.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::ConfigError;
use crate::consts::{CONTEXT_FILENAME, DIGEST_LABEL, IMAGE_NAMESPACE, vars};

/// A full 64-character SHA-256 of a build-context file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ContentDigest(pub String);

impl fmt::Display for ContentDigest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub fn digest_bytes(data: &[u8]) -> ContentDigest {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentDigest(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Error)]
pub enum TagError {
  #[error("container profile '{profile}' not found: {} does not exist", path.display())]
  MissingContext { profile: String, path: PathBuf },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },
}

/// Which tag shape identifies built images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagScheme {
  /// `openbar/<digest>:latest`
  #[default]
  Digest,
  /// `<registry>openbar/<project>/<profile>:latest`, labelled with the digest.
  Project,
}

impl FromStr for TagScheme {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "" | "digest" => Ok(TagScheme::Digest),
      "project" => Ok(TagScheme::Project),
      other => Err(ConfigError::InvalidValue {
        name: vars::CONTAINER_TAG,
        value: other.to_string(),
        expected: "digest or project",
      }),
    }
  }
}

/// An image reference plus the form shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageTag {
  pub reference: String,
  pub display: String,
}

impl ImageTag {
  /// A reference shown as is.
  pub fn plain(reference: impl Into<String>) -> Self {
    let reference = reference.into();
    Self {
      display: reference.clone(),
      reference,
    }
  }
}

impl fmt::Display for ImageTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.display)
  }
}

/// A container profile directory and the digest of its `Dockerfile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildContextDescriptor {
  pub profile: String,
  pub dir: PathBuf,
  pub file: PathBuf,
  pub digest: ContentDigest,
}

impl BuildContextDescriptor {
  /// Read the profile `profile` from a container directory.
  pub fn load(container_dir: &Path, profile: &str) -> Result<Self, TagError> {
    let dir = container_dir.join(profile);
    let file = dir.join(CONTEXT_FILENAME);
    if !file.is_file() {
      return Err(TagError::MissingContext {
        profile: profile.to_string(),
        path: file,
      });
    }

    let bytes = fs::read(&file).map_err(|e| TagError::Read {
      path: file.clone(),
      source: e,
    })?;

    Ok(Self {
      profile: profile.to_string(),
      digest: digest_bytes(&bytes),
      dir,
      file,
    })
  }

  /// The tag images of this context are built under.
  pub fn tag(&self, scheme: TagScheme, project_id: &str, registry: &str) -> ImageTag {
    match scheme {
      TagScheme::Digest => ImageTag::plain(format!("{IMAGE_NAMESPACE}/{}:latest", self.digest)),
      TagScheme::Project => {
        let display = format!(
          "{IMAGE_NAMESPACE}/{}/{}:latest",
          project_id.to_lowercase(),
          self.profile.to_lowercase()
        );
        ImageTag {
          reference: format!("{registry}{display}"),
          display,
        }
      }
    }
  }

  /// Labels attached to built images.
  pub fn labels(&self) -> Vec<(String, String)> {
    vec![(DIGEST_LABEL.to_string(), self.digest.to_string())]
  }
}
