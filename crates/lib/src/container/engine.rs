//! The container runtime collaborator.
//!
//! [`ContainerEngine`] is the contract the orchestrator depends on.
//! [`CliEngine`] implements it by driving the `docker` or `podman` command
//! line.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;

use crate::config::ConfigError;
use crate::consts::{CONTAINER_HOME, vars};
use crate::process::{self, Invocation, OutputMode, ProcessError, ProcessOutput};

use super::tag::{BuildContextDescriptor, ImageTag};

/// A `host[:container[:mode]]` volume mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
  pub host: PathBuf,
  pub container: PathBuf,
  pub mode: Option<String>,
}

impl Mount {
  /// Mount a host path at the same path in the container.
  pub fn same_path(path: impl Into<PathBuf>) -> Self {
    let host = path.into();
    Self {
      container: host.clone(),
      host,
      mode: None,
    }
  }

  pub fn to_arg(&self) -> String {
    let mut arg = format!("{}:{}", self.host.display(), self.container.display());
    if let Some(mode) = &self.mode {
      arg.push(':');
      arg.push_str(mode);
    }
    arg
  }
}

impl FromStr for Mount {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || ConfigError::InvalidValue {
      name: vars::CONTAINER_VOLUMES,
      value: s.to_string(),
      expected: "host[:container[:mode]]",
    };

    let mut parts = s.splitn(3, ':');
    let host = parts.next().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
    let container = match parts.next() {
      Some("") => return Err(invalid()),
      Some(container) => container,
      None => host,
    };
    let mode = match parts.next() {
      Some("") => return Err(invalid()),
      mode => mode.map(str::to_string),
    };

    Ok(Self {
      host: PathBuf::from(host),
      container: PathBuf::from(container),
      mode,
    })
  }
}

/// Parse a space-separated list of mount specs.
pub fn parse_volumes(value: &str) -> Result<Vec<Mount>, ConfigError> {
  value.split_whitespace().map(str::parse).collect()
}

/// Numeric uid and gid of the invoking user.
#[cfg(unix)]
pub fn current_user() -> Option<(u32, u32)> {
  Some((
    rustix::process::getuid().as_raw(),
    rustix::process::getgid().as_raw(),
  ))
}

#[cfg(not(unix))]
pub fn current_user() -> Option<(u32, u32)> {
  None
}

/// Everything needed to run a command inside an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
  pub image: String,
  pub workdir: PathBuf,
  pub mounts: Vec<Mount>,
  /// Numeric uid and gid passed through to the container.
  pub user: Option<(u32, u32)>,
  pub home: String,
  /// Exported variables, in name order.
  pub env: Vec<(String, String)>,
  pub command: Vec<String>,
  /// Attach a terminal instead of collecting output.
  pub interactive: bool,
}

impl RunSpec {
  pub fn new(image: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
    Self {
      image: image.into(),
      workdir: workdir.into(),
      mounts: Vec::new(),
      user: current_user(),
      home: CONTAINER_HOME.to_string(),
      env: Vec::new(),
      command: Vec::new(),
      interactive: false,
    }
  }
}

/// Operations the orchestrator needs from a container runtime.
///
/// Each call blocks until the runtime is done and fails with the captured
/// output of the runtime.
#[allow(async_fn_in_trait)]
pub trait ContainerEngine {
  /// Short name used in messages (`docker`, `podman`).
  fn name(&self) -> &str;

  async fn image_exists(&self, reference: &str) -> Result<bool, ProcessError>;

  /// Value of an image label, `None` when the image or the label is missing.
  async fn image_label(&self, reference: &str, label: &str) -> Result<Option<String>, ProcessError>;

  async fn build(
    &self,
    context: &BuildContextDescriptor,
    tag: &ImageTag,
    labels: &[(String, String)],
  ) -> Result<(), ProcessError>;

  async fn pull(&self, reference: &str) -> Result<(), ProcessError>;

  async fn remove(&self, reference: &str) -> Result<(), ProcessError>;

  /// Run a command; a non-zero exit is a [`ProcessError::Failed`].
  async fn run(&self, spec: &RunSpec) -> Result<ProcessOutput, ProcessError>;
}

/// A `docker`-compatible command-line engine.
#[derive(Debug, Clone)]
pub struct CliEngine {
  program: String,
  verbose: bool,
}

impl CliEngine {
  pub fn new(program: impl Into<String>, verbose: bool) -> Self {
    Self {
      program: program.into(),
      verbose,
    }
  }

  fn invocation(&self) -> Invocation {
    Invocation::new(&self.program)
  }

  pub fn inspect_invocation(&self, reference: &str, format: &str) -> Invocation {
    self.invocation().args(["image", "inspect", "--format", format, reference])
  }

  pub fn build_invocation(
    &self,
    context: &BuildContextDescriptor,
    tag: &ImageTag,
    labels: &[(String, String)],
  ) -> Invocation {
    let mut invocation = self
      .invocation()
      .args(["build", "--tag", tag.reference.as_str()])
      .args(["--file".to_string(), context.file.to_string_lossy().into_owned()]);
    for (key, value) in labels {
      invocation = invocation.arg("--label").arg(format!("{key}={value}"));
    }
    invocation.arg(context.dir.to_string_lossy())
  }

  pub fn run_invocation(&self, spec: &RunSpec) -> Invocation {
    let mut invocation = self.invocation().args(["run", "--rm"]);
    if spec.interactive {
      invocation = invocation.arg("--interactive").arg("--tty");
    }
    if let Some((uid, gid)) = spec.user {
      invocation = invocation.arg("--user").arg(format!("{uid}:{gid}"));
    }
    invocation = invocation
      .arg("--workdir")
      .arg(spec.workdir.to_string_lossy())
      .arg("--env")
      .arg(format!("HOME={}", spec.home));
    for mount in &spec.mounts {
      invocation = invocation.arg("--volume").arg(mount.to_arg());
    }
    // Values travel through the engine's environment, never the command line.
    for (name, value) in &spec.env {
      invocation = invocation.arg("--env").arg(name.clone()).env(name.clone(), value.clone());
    }
    invocation.arg(&spec.image).args(spec.command.iter().cloned())
  }

  fn output_mode(&self) -> OutputMode {
    if self.verbose {
      OutputMode::Stream
    } else {
      OutputMode::Capture
    }
  }

  fn echo(&self, invocation: &Invocation) {
    if self.verbose {
      println!("{invocation}");
    }
  }
}

impl ContainerEngine for CliEngine {
  fn name(&self) -> &str {
    &self.program
  }

  async fn image_exists(&self, reference: &str) -> Result<bool, ProcessError> {
    let invocation = self.inspect_invocation(reference, "{{.Id}}");
    let output = process::execute(&invocation, OutputMode::Capture).await?;
    debug!(image = reference, exists = output.success(), "inspected image");
    Ok(output.success())
  }

  async fn image_label(&self, reference: &str, label: &str) -> Result<Option<String>, ProcessError> {
    let format = format!("{{{{ index .Config.Labels \"{label}\" }}}}");
    let output = process::execute(&self.inspect_invocation(reference, &format), OutputMode::Capture).await?;
    if !output.success() {
      return Ok(None);
    }
    let value = output.stdout().trim().to_string();
    Ok(match value.as_str() {
      "" | "<no value>" => None,
      _ => Some(value),
    })
  }

  async fn build(
    &self,
    context: &BuildContextDescriptor,
    tag: &ImageTag,
    labels: &[(String, String)],
  ) -> Result<(), ProcessError> {
    let invocation = self.build_invocation(context, tag, labels);
    self.echo(&invocation);
    process::run(&invocation, self.output_mode()).await?;
    Ok(())
  }

  async fn pull(&self, reference: &str) -> Result<(), ProcessError> {
    let invocation = self.invocation().args(["pull", reference]);
    self.echo(&invocation);
    process::run(&invocation, self.output_mode()).await?;
    Ok(())
  }

  async fn remove(&self, reference: &str) -> Result<(), ProcessError> {
    let invocation = self.invocation().args(["image", "rm", "--force", reference]);
    self.echo(&invocation);
    process::run(&invocation, self.output_mode()).await?;
    Ok(())
  }

  async fn run(&self, spec: &RunSpec) -> Result<ProcessOutput, ProcessError> {
    let invocation = self.run_invocation(spec);
    self.echo(&invocation);
    let mode = if spec.interactive {
      OutputMode::Inherit
    } else {
      OutputMode::Stream
    };
    process::run(&invocation, mode).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::container::tag::digest_bytes;
  use std::path::Path;

  #[test]
  fn parses_mount_specs() {
    let mounts = parse_volumes("/data /src:/work /cache:/cache:ro").unwrap();
    assert_eq!(mounts[0], Mount::same_path("/data"));
    assert_eq!(mounts[1].to_arg(), "/src:/work");
    assert_eq!(mounts[2].mode.as_deref(), Some("ro"));
    assert_eq!(mounts[2].to_arg(), "/cache:/cache:ro");
    assert!(parse_volumes("").unwrap().is_empty());
  }

  #[test]
  fn rejects_malformed_mounts() {
    assert!(":/x".parse::<Mount>().is_err());
    assert!("/x:".parse::<Mount>().is_err());
    assert!("/x:/y:".parse::<Mount>().is_err());
  }

  #[test]
  fn run_invocation_is_structured() {
    let engine = CliEngine::new("podman", false);
    let mut spec = RunSpec::new("openbar/abc:latest", "/project");
    spec.user = Some((1000, 100));
    spec.mounts = vec![Mount::same_path("/project"), "/cache:/cache:ro".parse().unwrap()];
    spec.env = vec![("GREETING".to_string(), "hello  world ".to_string())];
    spec.command = vec!["sh".to_string(), "-c".to_string(), "echo $GREETING".to_string()];

    let invocation = engine.run_invocation(&spec);
    assert_eq!(invocation.program, "podman");
    assert_eq!(
      invocation.args,
      vec![
        "run",
        "--rm",
        "--user",
        "1000:100",
        "--workdir",
        "/project",
        "--env",
        "HOME=/home/container",
        "--volume",
        "/project:/project",
        "--volume",
        "/cache:/cache:ro",
        "--env",
        "GREETING",
        "openbar/abc:latest",
        "sh",
        "-c",
        "echo $GREETING",
      ]
    );
    assert_eq!(invocation.env, vec![("GREETING".to_string(), "hello  world ".to_string())]);
  }

  #[test]
  fn interactive_run_attaches_a_terminal() {
    let engine = CliEngine::new("docker", false);
    let mut spec = RunSpec::new("img", "/p");
    spec.interactive = true;
    spec.user = None;
    let args = engine.run_invocation(&spec).args;
    assert_eq!(&args[..4], &["run", "--rm", "--interactive", "--tty"]);
  }

  #[test]
  fn build_invocation_tags_and_labels() {
    let engine = CliEngine::new("docker", false);
    let context = BuildContextDescriptor {
      profile: "default".to_string(),
      dir: Path::new("/c/default").to_path_buf(),
      file: Path::new("/c/default/Dockerfile").to_path_buf(),
      digest: digest_bytes(b"FROM scratch\n"),
    };
    let tag = ImageTag::plain("openbar/x:latest");
    let invocation = engine.build_invocation(&context, &tag, &[("openbar.digest".to_string(), "x".to_string())]);
    assert_eq!(
      invocation.args,
      vec![
        "build",
        "--tag",
        "openbar/x:latest",
        "--file",
        "/c/default/Dockerfile",
        "--label",
        "openbar.digest=x",
        "/c/default",
      ]
    );
  }

  #[cfg(unix)]
  #[test]
  fn current_user_matches_process_ids() {
    let (uid, gid) = current_user().unwrap();
    assert_eq!(uid, rustix::process::getuid().as_raw());
    assert_eq!(gid, rustix::process::getgid().as_raw());
  }
}
