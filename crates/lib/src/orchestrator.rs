//! Execution of targets inside the project container.
//!
//! The [`Orchestrator`] prepares the image according to the policy decision,
//! then runs each requested target (prerequisites first) as one
//! `sh -c` invocation inside the image, with the export set as environment.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ConfigFile, ConfigurationSnapshot, Target};
use crate::consts::{DEFAULT_IMAGE, DIGEST_LABEL, vars};
use crate::container::engine::{self, ContainerEngine, Mount, RunSpec};
use crate::container::policy::{Action, ImageState, PolicyDecision, PolicyError, PolicyInputs, decide};
use crate::container::tag::{BuildContextDescriptor, ImageTag, TagError, TagScheme};
use crate::process::{ProcessError, ProcessOutput};
use crate::project::ProjectContext;

/// The built-in target running `OB_ALL_TARGETS`.
pub const ALL_TARGET: &str = "all";

#[derive(Debug, Error)]
pub enum RunError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Policy(#[from] PolicyError),

  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error(transparent)]
  Tag(#[from] TagError),

  #[error("no rule to make target '{0}'")]
  UnknownTarget(String),

  #[error("failed to create {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: std::io::Error },
}

impl RunError {
  pub fn is_interrupted(&self) -> bool {
    matches!(self, RunError::Process(ProcessError::Interrupted { .. }))
  }
}

/// Where the image of this run comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
  /// Built locally from a container profile.
  Build {
    context: BuildContextDescriptor,
    scheme: TagScheme,
    tag: ImageTag,
  },
  /// Pulled from a fixed reference.
  Pull { reference: ImageTag },
}

impl ImageSource {
  /// Pick the image source: an explicit `OB_CONTAINER_IMAGE` is pulled, a
  /// container directory is built, otherwise the default image is pulled.
  pub fn from_project(project: &ProjectContext, snapshot: &ConfigurationSnapshot) -> Result<Self, RunError> {
    let image = snapshot.value(vars::CONTAINER_IMAGE).trim();
    if !image.is_empty() {
      return Ok(ImageSource::Pull {
        reference: ImageTag::plain(image),
      });
    }

    let Some(container_dir) = &project.container_dir else {
      return Ok(ImageSource::Pull {
        reference: ImageTag::plain(DEFAULT_IMAGE),
      });
    };

    let profile = snapshot.value(vars::CONTAINER).trim();
    let context = BuildContextDescriptor::load(container_dir, profile)?;
    let scheme: TagScheme = snapshot.value(vars::CONTAINER_TAG).trim().parse()?;
    let tag = context.tag(scheme, &project.project_id, snapshot.value(vars::CONTAINER_REGISTRY).trim());

    Ok(ImageSource::Build { context, scheme, tag })
  }

  pub fn action(&self) -> Action {
    match self {
      ImageSource::Build { .. } => Action::Build,
      ImageSource::Pull { .. } => Action::Pull,
    }
  }

  pub fn tag(&self) -> &ImageTag {
    match self {
      ImageSource::Build { tag, .. } => tag,
      ImageSource::Pull { reference } => reference,
    }
  }
}

/// The line printed before a lifecycle action.
pub fn announcement(engine: &str, decision: PolicyDecision, tag: &ImageTag) -> Option<String> {
  match decision {
    PolicyDecision::Build => Some(format!("Building {engine} image '{tag}'")),
    PolicyDecision::Pull => Some(format!("Pulling {engine} image '{tag}'")),
    PolicyDecision::Skip | PolicyDecision::Error => None,
  }
}

pub struct Orchestrator<'a, E> {
  engine: &'a E,
  snapshot: &'a ConfigurationSnapshot,
  project: &'a ProjectContext,
  config: &'a ConfigFile,
  source: ImageSource,
  verbose: bool,
}

impl<'a, E: ContainerEngine> Orchestrator<'a, E> {
  pub fn new(
    engine: &'a E,
    snapshot: &'a ConfigurationSnapshot,
    project: &'a ProjectContext,
    config: &'a ConfigFile,
    verbose: bool,
  ) -> Result<Self, RunError> {
    let source = ImageSource::from_project(project, snapshot)?;
    debug!(image = %source.tag(), action = %source.action(), "selected image source");
    Ok(Self {
      engine,
      snapshot,
      project,
      config,
      source,
      verbose,
    })
  }

  pub fn source(&self) -> &ImageSource {
    &self.source
  }

  /// What the image store holds under the current tag.
  pub async fn image_state(&self) -> Result<ImageState, ProcessError> {
    let reference = &self.source.tag().reference;
    if !self.engine.image_exists(reference).await? {
      return Ok(ImageState::Missing);
    }

    if let ImageSource::Build {
      context,
      scheme: TagScheme::Project,
      ..
    } = &self.source
    {
      let label = self.engine.image_label(reference, DIGEST_LABEL).await?;
      if label.as_deref() != Some(context.digest.0.as_str()) {
        return Ok(ImageState::Stale);
      }
    }

    Ok(ImageState::Present)
  }

  /// Evaluate the policy and build or pull the image if it says so.
  pub async fn prepare_image(&self) -> Result<PolicyDecision, RunError> {
    let action = self.source.action();
    let inputs = PolicyInputs::from_snapshot(self.snapshot, action)?;
    let state = self.image_state().await?;
    let decision = decide(action, &inputs, state);
    let tag = self.source.tag();
    debug!(?inputs, ?state, ?decision, image = %tag, "policy decision");

    if let Some(line) = announcement(self.engine.name(), decision, tag) {
      println!("{line}");
    }

    match (&self.source, decision) {
      (ImageSource::Build { context, .. }, PolicyDecision::Build) => {
        self.engine.build(context, tag, &context.labels()).await?;
        info!(image = %tag, "built image");
      }
      (ImageSource::Pull { reference }, PolicyDecision::Pull) => {
        self.engine.pull(&reference.reference).await?;
        info!(image = %tag, "pulled image");
      }
      (_, PolicyDecision::Error) => {
        return Err(
          PolicyError::MissingImage {
            tag: tag.to_string(),
            action,
          }
          .into(),
        );
      }
      _ => {}
    }

    Ok(decision)
  }

  /// Prepare the image, then run `names` and their prerequisites.
  pub async fn run(&self, names: &[String]) -> Result<PolicyDecision, RunError> {
    let plan = self.plan(names)?;
    let decision = self.prepare_image().await?;
    self.create_build_dir()?;

    for target in plan {
      self.run_target(target).await?;
    }

    Ok(decision)
  }

  /// Prepare the image, then open an interactive shell in it.
  pub async fn shell(&self) -> Result<(), RunError> {
    self.prepare_image().await?;
    self.create_build_dir()?;

    let mut spec = self.run_spec()?;
    spec.interactive = true;
    spec.command = vec![
      "sh".to_string(),
      "-c".to_string(),
      "command -v bash >/dev/null && exec bash || exec sh".to_string(),
    ];
    self.engine.run(&spec).await?;
    Ok(())
  }

  /// Remove the image of the selected profile. Returns false when there was
  /// nothing to remove.
  pub async fn remove_image(&self) -> Result<bool, RunError> {
    let reference = &self.source.tag().reference;
    if !self.engine.image_exists(reference).await? {
      return Ok(false);
    }
    self.engine.remove(reference).await?;
    info!(image = %self.source.tag(), "removed image");
    Ok(true)
  }

  /// Targets to run, prerequisites first, each one once.
  pub fn plan(&self, names: &[String]) -> Result<Vec<&'a Target>, RunError> {
    let mut plan = Vec::new();
    let mut done = HashSet::new();
    let mut visiting = Vec::new();
    for name in names {
      self.visit(name, &mut plan, &mut done, &mut visiting)?;
    }
    Ok(plan)
  }

  fn visit(
    &self,
    name: &str,
    plan: &mut Vec<&'a Target>,
    done: &mut HashSet<String>,
    visiting: &mut Vec<String>,
  ) -> Result<(), RunError> {
    if done.contains(name) {
      return Ok(());
    }
    if visiting.iter().any(|n| n == name) {
      warn!(target = name, "circular dependency dropped");
      return Ok(());
    }

    visiting.push(name.to_string());
    match self.config.target(name) {
      Some(target) => {
        for prerequisite in &target.prerequisites {
          self.visit(prerequisite, plan, done, visiting)?;
        }
        plan.push(target);
      }
      None if name == ALL_TARGET => {
        let all = self.snapshot.value(vars::ALL_TARGETS).to_string();
        for name in all.split_whitespace() {
          self.visit(name, plan, done, visiting)?;
        }
      }
      None => return Err(RunError::UnknownTarget(name.to_string())),
    }
    visiting.pop();

    done.insert(name.to_string());
    Ok(())
  }

  async fn run_target(&self, target: &Target) -> Result<Option<ProcessOutput>, RunError> {
    let commands = target
      .commands
      .iter()
      .map(|command| self.snapshot.expand(command))
      .collect::<Result<Vec<_>, _>>()?;

    if commands.is_empty() {
      return Ok(None);
    }

    if self.verbose {
      for command in &commands {
        println!("{command}");
      }
    }

    let mut spec = self.run_spec()?;
    spec.command = vec!["sh".to_string(), "-c".to_string(), target_script(&commands)];

    info!(target = %target.name, "running target");
    let output = self.engine.run(&spec).await?;
    Ok(Some(output))
  }

  /// The run invocation shared by targets and the shell.
  pub fn run_spec(&self) -> Result<RunSpec, RunError> {
    let root = &self.project.root_dir;
    let mut spec = RunSpec::new(&self.source.tag().reference, root);

    spec.mounts.push(Mount::same_path(root));
    if self.project.build_dir != *root {
      spec.mounts.push(Mount::same_path(&self.project.build_dir));
    }
    spec
      .mounts
      .extend(engine::parse_volumes(self.snapshot.value(vars::CONTAINER_VOLUMES))?);

    spec.env = self
      .snapshot
      .exported()
      .map(|(name, value)| (name.to_string(), value.to_string()))
      .collect();

    Ok(spec)
  }

  fn create_build_dir(&self) -> Result<(), RunError> {
    let path = &self.project.build_dir;
    fs::create_dir_all(path).map_err(|e| RunError::CreateDir {
      path: path.clone(),
      source: e,
    })
  }
}

/// One shell script per target; the first failing command stops it.
pub fn target_script(commands: &[String]) -> String {
  let mut script = String::from("set -e\n");
  script.push_str(&commands.join("\n"));
  script
}
