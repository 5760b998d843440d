//! Configuration target and precedence tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn unconfigured_project_lists_defconfigs() {
  let env = TestEnv::hello();

  env
    .ob()
    .assert()
    .code(2)
    .stdout(predicate::str::contains(
      "Please use one of the following configuration targets:",
    ))
    .stdout(predicate::str::contains("hello_defconfig"))
    .stdout(predicate::str::contains("other_defconfig"))
    .stderr(predicate::str::contains("Configuration file not found."));

  assert!(env.engine_calls().is_empty());
}

#[test]
fn defconfig_writes_config() {
  let env = TestEnv::hello();

  env
    .ob()
    .arg("hello_defconfig")
    .assert()
    .success()
    .stdout("Build configured for hello_defconfig\n");

  let config = std::fs::read_to_string(env.project_path().join(".config")).unwrap();
  assert!(config.contains("hello from defconfig"));
}

#[test]
fn unknown_defconfig_fails() {
  let env = TestEnv::hello();

  env
    .ob()
    .arg("missing_defconfig")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("missing_defconfig"));

  assert!(!env.project_path().join(".config").exists());
}

#[test]
fn env_prints_exported_variables() {
  let env = TestEnv::configured();
  let root = env.project_path();

  env
    .ob()
    .arg("env")
    .assert()
    .success()
    .stdout(predicate::str::contains(format!("OB_ROOT_DIR={}\n", root.display())))
    .stdout(predicate::str::contains(format!("OB_BUILD_DIR={}/build\n", root.display())))
    .stdout(predicate::str::contains("OB_CONTAINER=default\n"))
    .stdout(predicate::str::contains("FOO_MESSAGE").not());
}

#[test]
fn cli_override_is_exported() {
  let env = TestEnv::configured();

  env
    .ob()
    .args(["FOO_MESSAGE=from the command line", "env"])
    .assert()
    .success()
    .stdout(predicate::str::contains("FOO_MESSAGE=from the command line\n"));
}

#[test]
fn export_directive_in_config() {
  let env = TestEnv::hello();
  env.write_file("configs/hello_defconfig", "export FOO_MESSAGE = exported value\n");
  env.ob().arg("hello_defconfig").assert().success();

  env
    .ob()
    .arg("env")
    .assert()
    .success()
    .stdout(predicate::str::contains("FOO_MESSAGE=exported value\n"));
}

#[test]
fn env_json_output() {
  let env = TestEnv::configured();

  let output = env.ob().args(["--format", "json", "env"]).output().unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["OB_TYPE"], "simple");
  assert_eq!(json["OB_PROJECT_ID"], "project");
}

#[test]
fn environment_overrides_config() {
  let env = TestEnv::hello();
  env.write_file("configs/hello_defconfig", "OB_CONTAINER = other\n");
  env.ob().arg("hello_defconfig").assert().success();

  env
    .ob()
    .env("OB_CONTAINER", "from-env")
    .arg("env")
    .assert()
    .success()
    .stdout(predicate::str::contains("OB_CONTAINER=from-env\n"));

  env
    .ob()
    .env("OB_CONTAINER", "from-env")
    .args(["OB_CONTAINER=from-cli", "env"])
    .assert()
    .success()
    .stdout(predicate::str::contains("OB_CONTAINER=from-cli\n"));
}

#[test]
fn relative_build_dir_from_environment_fails() {
  let env = TestEnv::configured();

  env
    .ob()
    .env("OB_BUILD_DIR", "relative/build")
    .arg("env")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("OB_BUILD_DIR must be an absolute path"));
}

#[test]
fn relative_build_dir_from_config_is_under_root() {
  let env = TestEnv::configured();
  env.write_file(".config", "OB_BUILD_DIR = out # local builds\n");

  env
    .ob()
    .arg("env")
    .assert()
    .success()
    .stdout(predicate::str::is_match(r"(?m)^OB_BUILD_DIR=/.*/out$").unwrap());
}

#[test]
fn help_lists_targets() {
  let env = TestEnv::configured();

  env
    .ob()
    .arg("help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Configured targets:"))
    .stdout(predicate::str::contains("* hello"))
    .stdout(predicate::str::contains("  foo"))
    .stdout(predicate::str::contains("Configuration targets:"))
    .stdout(predicate::str::contains("other_defconfig"))
    .stdout(predicate::str::contains("Useful targets:"));
}

#[test]
fn help_works_unconfigured() {
  let env = TestEnv::hello();

  env
    .ob()
    .arg("help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Configuration targets:"))
    .stdout(predicate::str::contains("Configured targets:").not());
}

#[test]
fn initenv_script_variables_reach_targets() {
  let env = TestEnv::hello();
  env.write_file(
    "openbar.mk",
    "\
OB_TYPE = initenv
OB_INITENV_SCRIPT = init.sh
OB_CONTAINER_DIR = containers
export TOOLCHAIN

show:
\techo toolchain=$$TOOLCHAIN
",
  );
  env.write_file("init.sh", "TOOLCHAIN=arm-none\nexport TOOLCHAIN\necho sourcing\n");
  env.ob().arg("hello_defconfig").assert().success();

  env
    .ob()
    .arg("show")
    .assert()
    .success()
    .stdout(predicate::str::contains("toolchain=arm-none\n"))
    .stdout(predicate::str::contains("sourcing").not());
}
