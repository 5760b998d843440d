//! Shared test helpers for CLI integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Project file with two targets, `hello` as the default.
pub const HELLO_PROJECT: &str = "\
OB_ALL_TARGETS = hello
OB_CONTAINER_DIR = containers

hello:
\techo Hello World

foo:
\techo $(FOO_MESSAGE)
";

/// Isolated test environment.
///
/// Each test gets its own project directory plus a fake `docker` on `PATH`
/// whose image store and call log live next to the project.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// An empty project.
  pub fn empty() -> Self {
    let env = Self { temp: TempDir::new().unwrap() };
    std::fs::create_dir_all(env.project_path()).unwrap();

    let docker = env.bin_path().join("docker");
    std::fs::create_dir_all(env.bin_path()).unwrap();
    std::fs::write(&docker, fixture_content("docker.sh")).unwrap();
    std::fs::set_permissions(&docker, std::fs::Permissions::from_mode(0o755)).unwrap();

    env
  }

  /// A project with a `default` container profile and two defconfigs.
  pub fn hello() -> Self {
    let env = Self::empty();
    env.write_file("openbar.mk", HELLO_PROJECT);
    env.write_file("containers/default/Dockerfile", "FROM debian:stable\n");
    env.write_file("configs/hello_defconfig", "FOO_MESSAGE = hello from defconfig\n");
    env.write_file("configs/other_defconfig", "FOO_MESSAGE = other message\n");
    env
  }

  /// A configured [`TestEnv::hello`] project.
  pub fn configured() -> Self {
    let env = Self::hello();
    env.ob().arg("hello_defconfig").assert().success();
    env
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.project_path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn project_path(&self) -> PathBuf {
    let p = self.temp.path().join("project");
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn bin_path(&self) -> PathBuf {
    self.temp.path().join("bin")
  }

  pub fn store_path(&self) -> PathBuf {
    self.temp.path().join("images")
  }

  pub fn log_path(&self) -> PathBuf {
    self.temp.path().join("engine.log")
  }

  /// Calls made to the fake engine so far.
  pub fn engine_calls(&self) -> Vec<String> {
    std::fs::read_to_string(self.log_path())
      .unwrap_or_default()
      .lines()
      .map(String::from)
      .collect()
  }

  /// Whether the fake engine holds any image.
  pub fn image_count(&self) -> usize {
    std::fs::read_dir(self.store_path()).map(|dir| dir.count()).unwrap_or(0)
  }

  /// Get a pre-configured Command for the `ob` binary.
  ///
  /// Runs in the project directory with the fake engine first on `PATH` and
  /// `OB_*` variables of the outer environment removed.
  pub fn ob(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("ob");
    let path = std::env::var("PATH").unwrap_or_default();
    cmd.current_dir(self.project_path());
    cmd.env("PATH", format!("{}:{}", self.bin_path().display(), path));
    cmd.env("FAKE_ENGINE_STORE", self.store_path());
    cmd.env("FAKE_ENGINE_LOG", self.log_path());
    for (name, _) in std::env::vars().filter(|(name, _)| name.starts_with("OB_")) {
      cmd.env_remove(name);
    }
    cmd
  }
}
