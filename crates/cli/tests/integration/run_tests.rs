//! Target execution tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn default_target_builds_then_runs() {
  let env = TestEnv::configured();

  env
    .ob()
    .assert()
    .success()
    .stdout(predicate::str::is_match(r"^Building docker image 'openbar/[0-9a-f]{64}:latest'\nHello World\n$").unwrap());

  assert_eq!(env.image_count(), 1);
  assert!(env.project_path().join("build").is_dir());
}

#[test]
fn second_run_skips_build() {
  let env = TestEnv::configured();
  env.ob().arg("all").assert().success();

  env
    .ob()
    .arg("all")
    .assert()
    .success()
    .stdout("Hello World\n");

  let builds = env.engine_calls().iter().filter(|call| call.starts_with("build")).count();
  assert_eq!(builds, 1);
}

#[test]
fn one_shot_build_in_quiet_mode() {
  let env = TestEnv::configured();
  env.ob().arg("all").assert().success();

  let output = env.ob().args(["B=1", "foo"]).output().unwrap();
  assert!(output.status.success());

  let stdout = String::from_utf8(output.stdout).unwrap();
  let lines: Vec<&str> = stdout.lines().collect();
  assert_eq!(lines.len(), 2, "{stdout}");
  assert!(lines[0].starts_with("Building docker image 'openbar/"));
  assert_eq!(lines[1], "hello from defconfig");
}

#[test]
fn verbose_echoes_commands() {
  let env = TestEnv::configured();

  env
    .ob()
    .args(["V=1", "foo"])
    .assert()
    .success()
    .stdout(predicate::str::contains("docker build --tag"))
    .stdout(predicate::str::contains("STEP 1/1"))
    .stdout(predicate::str::contains("docker run --rm"))
    .stdout(predicate::str::contains("echo hello from defconfig\n"))
    .stdout(predicate::str::contains("\nhello from defconfig\n"));
}

#[test]
fn cli_value_with_whitespace_reaches_target() {
  let env = TestEnv::configured();

  env
    .ob()
    .args(["FOO_MESSAGE=a  b   c", "foo"])
    .assert()
    .success()
    .stdout(predicate::str::contains("a b c\n"));
}

#[test]
fn exported_variables_in_target_environment() {
  let env = TestEnv::configured();
  env.write_file(
    "openbar.mk",
    "\
OB_CONTAINER_DIR = containers
QUOTED = it's $$HOME \"quoted\"
export QUOTED

show:
\tprintf '%s\\n' \"$$QUOTED\" \"$$OB_PROJECT_ID\"
",
  );

  env
    .ob()
    .arg("show")
    .assert()
    .success()
    .stdout(predicate::str::contains("it's $HOME \"quoted\"\nproject\n"));
}

#[test]
fn build_dir_override_is_relative_to_root() {
  let env = TestEnv::configured();

  env.ob().args(["O=out/debug", "hello"]).assert().success();

  assert!(env.project_path().join("out/debug").is_dir());
  assert!(!env.project_path().join("build").exists());
}

#[test]
fn failing_target_stops_the_run() {
  let env = TestEnv::configured();
  env.write_file(
    "openbar.mk",
    "\
OB_CONTAINER_DIR = containers

broken:
\tfalse
\techo unreachable
",
  );

  env
    .ob()
    .arg("broken")
    .assert()
    .code(2)
    .stdout(predicate::str::contains("unreachable").not());
}

#[test]
fn prerequisites_run_first() {
  let env = TestEnv::configured();
  env.write_file(
    "openbar.mk",
    "\
OB_CONTAINER_DIR = containers

first:
\techo first

second: first
\techo second
",
  );

  env
    .ob()
    .arg("second")
    .assert()
    .success()
    .stdout(predicate::str::ends_with("first\nsecond\n"));
}

#[test]
fn unknown_target_fails() {
  let env = TestEnv::configured();

  env
    .ob()
    .arg("nope")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("no rule to make target 'nope'"));
}

#[test]
fn foreach_runs_every_defconfig() {
  let env = TestEnv::hello();

  env
    .ob()
    .args(["foreach", "foo"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Build configured for hello_defconfig\n"))
    .stdout(predicate::str::contains("hello from defconfig\n"))
    .stdout(predicate::str::contains("Build configured for other_defconfig\n"))
    .stdout(predicate::str::ends_with("other message\n"));
}

#[test]
fn clean_removes_build_dir() {
  let env = TestEnv::configured();
  env.ob().assert().success();
  assert!(env.project_path().join("build").is_dir());

  env.ob().arg("clean").assert().success();
  assert!(!env.project_path().join("build").exists());
}

#[test]
fn defconfig_then_target_in_one_invocation() {
  let env = TestEnv::hello();

  env
    .ob()
    .args(["other_defconfig", "foo"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("Build configured for other_defconfig\n"))
    .stdout(predicate::str::ends_with("other message\n"));
}
