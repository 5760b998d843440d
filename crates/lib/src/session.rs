//! One invocation's configuration, built once from every source.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::initenv;
use crate::config::sources::{builtin_layer, env_layer, load_persisted, load_project, scope_env};
use crate::config::{CliArgs, ConfigError, ConfigFile, ConfigurationSnapshot, Layer, Source, resolve};
use crate::consts::vars;
use crate::project::ProjectContext;

/// The resolved state of one invocation.
#[derive(Debug, Clone)]
pub struct Session {
  pub args: CliArgs,
  pub snapshot: ConfigurationSnapshot,
  pub project: ProjectContext,
  /// Targets of the project file and the persisted config.
  pub config: ConfigFile,
  /// Whether a `.config` exists.
  pub configured: bool,
}

impl Session {
  /// Load a session for `root_dir` using the process environment.
  ///
  /// With `initenv` set, projects of type `initenv` and `yocto` source
  /// their script and get an INITENV layer.
  pub async fn load(root_dir: &Path, args: CliArgs, initenv: bool) -> Result<Self, ConfigError> {
    Self::load_with_env(root_dir, args, env_layer(), initenv).await
  }

  pub async fn load_with_env(
    root_dir: &Path,
    args: CliArgs,
    env: Layer,
    initenv: bool,
  ) -> Result<Self, ConfigError> {
    // OB_ROOT_DIR may itself come from the command line or the environment.
    let bootstrap = resolve(&[args.layer(root_dir), env.clone(), builtin_layer(root_dir)])?;
    let root = PathBuf::from(bootstrap.value(vars::ROOT_DIR));
    debug!(root = %root.display(), "resolved root directory");

    let project_file = load_project(&root)?;
    let persisted = load_persisted(&root)?;
    let configured = persisted.is_some();

    let mut defaults = builtin_layer(&root);
    defaults.extend(project_file.definitions.iter().cloned());

    let mut cfg = Layer::new(Source::Cfg);
    let mut config = project_file;
    if let Some(persisted) = persisted {
      cfg.extend(persisted.definitions.iter().cloned());
      config.merge(persisted);
    }

    // Only environment variables named on the command line or by the export
    // directive keep ENV precedence.
    let unscoped = resolve(&[args.layer(&root), scope_env(&env, &BTreeSet::new()), cfg.clone(), defaults.clone()])?;
    let named: BTreeSet<String> = args
      .overrides
      .iter()
      .map(|(name, _)| name.clone())
      .chain(unscoped.value(vars::EXPORT).split_whitespace().map(str::to_string))
      .collect();
    debug!(named = named.len(), "scoped environment");

    let mut layers = vec![args.layer(&root), scope_env(&env, &named), cfg, defaults];
    let mut snapshot = resolve(&layers)?;
    let mut project = ProjectContext::from_snapshot(&snapshot)?;

    let script = project
      .initenv_script
      .clone()
      .filter(|_| initenv && project.project_type.uses_initenv());
    if let Some(script) = script {
      // The script starts from the host environment plus the export set.
      let mut script_env: Vec<(String, String)> = env
        .definitions
        .iter()
        .filter_map(|d| snapshot.get(&d.name).map(|value| (d.name.clone(), value.to_string())))
        .collect();
      script_env.extend(
        snapshot
          .exported()
          .map(|(name, value)| (name.to_string(), value.to_string())),
      );
      let layer = initenv::capture(&script, &project.initenv_args(), &script_env, &project.root_dir).await?;
      layers.push(layer);
      snapshot = resolve(&layers)?;
      project = ProjectContext::from_snapshot(&snapshot)?;
    }

    Ok(Self {
      args,
      snapshot,
      project,
      config,
      configured,
    })
  }

  pub fn verbose(&self) -> bool {
    self.snapshot.value(vars::VERBOSE).trim() == "1"
  }

  pub fn engine_name(&self) -> &str {
    self.snapshot.value(vars::CONTAINER_ENGINE).trim()
  }
}
