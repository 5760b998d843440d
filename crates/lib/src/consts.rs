/// Application name, used as image namespace and in messages.
pub const APP_NAME: &str = "openbar";

/// Persisted configuration written when a defconfig is selected.
pub const CONFIG_FILENAME: &str = ".config";

/// Project declaration file, read from the root directory.
pub const PROJECT_FILENAME: &str = "openbar.mk";

/// Suffix identifying defconfig files and configuration targets.
pub const DEFCONFIG_SUFFIX: &str = "_defconfig";

/// Authoritative build-context file inside a container profile directory.
pub const CONTEXT_FILENAME: &str = "Dockerfile";

/// Image namespace for locally built images.
pub const IMAGE_NAMESPACE: &str = APP_NAME;

/// Registry prefix some engines (podman) put in front of local images.
pub const DEFAULT_REGISTRY_PREFIX: &str = "localhost/";

/// Image pulled when the project declares neither a container directory nor an image.
pub const DEFAULT_IMAGE: &str = "ghcr.io/openbar/openbar:latest";

/// Image label carrying the content digest of a project-scoped build.
pub const DIGEST_LABEL: &str = "openbar.digest";

/// Home directory inside the container.
pub const CONTAINER_HOME: &str = "/home/container";

pub const DEFAULT_ENGINE: &str = "docker";
pub const DEFAULT_PROFILE: &str = "default";

/// Names of the variables the tool itself reads.
pub mod vars {
  pub const ROOT_DIR: &str = "OB_ROOT_DIR";
  pub const BUILD_DIR: &str = "OB_BUILD_DIR";
  pub const PROJECT_ID: &str = "OB_PROJECT_ID";
  pub const TYPE: &str = "OB_TYPE";
  pub const VERBOSE: &str = "OB_VERBOSE";
  pub const EXPORT: &str = "OB_EXPORT";
  pub const DEFCONFIG_DIR: &str = "OB_DEFCONFIG_DIR";
  pub const INITENV_SCRIPT: &str = "OB_INITENV_SCRIPT";
  pub const ALL_TARGETS: &str = "OB_ALL_TARGETS";
  pub const CONTAINER: &str = "OB_CONTAINER";
  pub const CONTAINER_DIR: &str = "OB_CONTAINER_DIR";
  pub const CONTAINER_ENGINE: &str = "OB_CONTAINER_ENGINE";
  pub const CONTAINER_IMAGE: &str = "OB_CONTAINER_IMAGE";
  pub const CONTAINER_POLICY: &str = "OB_CONTAINER_POLICY";
  pub const CONTAINER_FORCE_BUILD: &str = "OB_CONTAINER_FORCE_BUILD";
  pub const CONTAINER_FORCE_PULL: &str = "OB_CONTAINER_FORCE_PULL";
  pub const CONTAINER_VOLUMES: &str = "OB_CONTAINER_VOLUMES";
  pub const CONTAINER_TAG: &str = "OB_CONTAINER_TAG";
  pub const CONTAINER_REGISTRY: &str = "OB_CONTAINER_REGISTRY";

  /// One-shot command-line variables.
  pub const ONE_SHOT_BUILD: &str = "B";
  pub const ONE_SHOT_PULL: &str = "P";
  pub const ONE_SHOT_VERBOSE: &str = "V";
  pub const ONE_SHOT_BUILD_DIR: &str = "O";

  /// Variables always present in the export directive.
  pub const CORE_EXPORTS: &[&str] = &[ROOT_DIR, BUILD_DIR, PROJECT_ID, TYPE, VERBOSE, CONTAINER];
}
