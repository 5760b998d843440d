//! Image lifecycle policy tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn policy_never_without_image_fails() {
  let env = TestEnv::configured();

  env
    .ob()
    .args(["OB_CONTAINER_POLICY=never", "hello"])
    .assert()
    .code(2)
    .stderr(predicate::str::contains("does not exist"));

  assert_eq!(env.image_count(), 0);
  assert!(!env.engine_calls().iter().any(|call| call.starts_with("run")));
}

#[test]
fn one_shot_zero_without_image_fails() {
  let env = TestEnv::configured();

  env
    .ob()
    .args(["B=0", "hello"])
    .assert()
    .code(2)
    .stderr(predicate::str::contains("does not exist"));

  assert!(!env.engine_calls().iter().any(|call| call.starts_with("build")));
}

#[test]
fn policy_always_rebuilds() {
  let env = TestEnv::configured();
  env.ob().arg("hello").assert().success();

  env
    .ob()
    .args(["OB_CONTAINER_POLICY=always", "hello"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("Building docker image"));
}

#[test]
fn one_shot_zero_skips_build() {
  let env = TestEnv::configured();
  env.ob().arg("hello").assert().success();

  env
    .ob()
    .args(["B=0", "OB_CONTAINER_POLICY=always", "hello"])
    .assert()
    .success()
    .stdout("Hello World\n");
}

#[test]
fn changed_dockerfile_gets_new_tag() {
  let env = TestEnv::configured();
  env.ob().arg("hello").assert().success();

  env.write_file("containers/default/Dockerfile", "FROM debian:testing\n");
  env
    .ob()
    .arg("hello")
    .assert()
    .success()
    .stdout(predicate::str::starts_with("Building docker image"));

  assert_eq!(env.image_count(), 2);
}

#[test]
fn project_tag_rebuilds_stale_image() {
  let env = TestEnv::configured();
  let tag_args = ["OB_CONTAINER_TAG=project", "OB_CONTAINER_POLICY=newer"];

  env
    .ob()
    .args(tag_args)
    .arg("hello")
    .assert()
    .success()
    .stdout(predicate::str::contains(
      "Building docker image 'openbar/project/default:latest'",
    ));

  env.ob().args(tag_args).arg("hello").assert().success().stdout("Hello World\n");

  env.write_file("containers/default/Dockerfile", "FROM debian:testing\n");
  env
    .ob()
    .args(tag_args)
    .arg("hello")
    .assert()
    .success()
    .stdout(predicate::str::starts_with("Building docker image"));

  assert_eq!(env.image_count(), 1);
  assert!(
    env
      .engine_calls()
      .iter()
      .any(|call| call.contains("--tag localhost/openbar/project/default:latest"))
  );
}

#[test]
fn explicit_image_is_pulled() {
  let env = TestEnv::configured();

  env
    .ob()
    .args(["OB_CONTAINER_IMAGE=registry.example.com/tools:1", "hello"])
    .assert()
    .success()
    .stdout("Pulling docker image 'registry.example.com/tools:1'\nHello World\n");

  env
    .ob()
    .args(["OB_CONTAINER_IMAGE=registry.example.com/tools:1", "hello"])
    .assert()
    .success()
    .stdout("Hello World\n");
}

#[test]
fn project_without_containers_pulls_default_image() {
  let env = TestEnv::empty();
  env.write_file("openbar.mk", "OB_ALL_TARGETS = hello\n\nhello:\n\techo hi\n");
  env.write_file("configs/plain_defconfig", "");
  env.ob().arg("plain_defconfig").assert().success();

  env
    .ob()
    .assert()
    .success()
    .stdout(predicate::str::contains(
      "Pulling docker image 'ghcr.io/openbar/openbar:latest'",
    ));
}

#[test]
fn image_rm_removes_selected_image() {
  let env = TestEnv::configured();
  env.ob().arg("hello").assert().success();
  assert_eq!(env.image_count(), 1);

  env
    .ob()
    .arg("image-rm")
    .assert()
    .success()
    .stdout(predicate::str::contains("Removed image"));
  assert_eq!(env.image_count(), 0);

  env
    .ob()
    .arg("image-rm")
    .assert()
    .success()
    .stdout(predicate::str::contains("No image"));
}

#[test]
fn containers_lists_profiles() {
  let env = TestEnv::configured();
  env.write_file("containers/extra/Dockerfile", "FROM alpine\n");

  env
    .ob()
    .args(["OB_CONTAINER_TAG=project", "containers"])
    .assert()
    .success()
    .stdout(predicate::str::contains("* default"))
    .stdout(predicate::str::contains("openbar/project/default:latest"))
    .stdout(predicate::str::contains("  extra"));

  let output = env.ob().args(["--format", "json", "containers"]).output().unwrap();
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json.as_array().unwrap().len(), 2);
  assert_eq!(json[0]["name"], "default");
  assert_eq!(json[0]["selected"], true);
}
