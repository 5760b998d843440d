//! Capture of the variables set by an initenv script.
//!
//! The script is sourced once per invocation by `/bin/sh` on the host. The
//! environment is dumped after sourcing and compared with the environment
//! the shell started with; every added or changed variable becomes an
//! INITENV definition.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::process::{self, Invocation, OutputMode};

use super::sources::literal_layer;
use super::types::{ConfigError, Layer, Source};

const SHELL: &str = "/bin/sh";

// $1 is the dump file, $2 the script, the rest are the script's arguments.
const CAPTURE_SCRIPT: &str = r#"__ob_dump="$1"; __ob_script="$2"; shift 2; . "$__ob_script" >&2 && env -0 > "$__ob_dump""#;

/// Variables maintained by the shell itself.
const IGNORED: &[&str] = &["PWD", "OLDPWD", "SHLVL", "_"];

/// Source `script` with `args` and return the variables it set.
///
/// `env` is added to the current process environment for the script.
pub async fn capture(
  script: &Path,
  args: &[String],
  env: &[(String, String)],
  cwd: &Path,
) -> Result<Layer, ConfigError> {
  let fail = |message: String| ConfigError::Initenv {
    script: script.to_path_buf(),
    message,
  };

  if !script.is_file() {
    return Err(fail("script not found".to_string()));
  }

  let dump = NamedTempFile::new().map_err(|e| fail(format!("failed to create dump file: {e}")))?;

  let mut invocation = Invocation::new(SHELL)
    .arg("-c")
    .arg(CAPTURE_SCRIPT)
    .arg("sh")
    .arg(dump.path().to_string_lossy())
    .arg(script.to_string_lossy())
    .args(args.iter().cloned())
    .cwd(cwd);
  for (name, value) in env {
    invocation = invocation.env(name.clone(), value.clone());
  }

  info!(script = %script.display(), "sourcing initenv script");
  process::run(&invocation, OutputMode::Capture)
    .await
    .map_err(|e| fail(e.to_string()))?;

  let bytes = fs::read(dump.path()).map_err(|e| fail(format!("failed to read environment dump: {e}")))?;
  let after = parse_dump(&bytes);

  let mut before: BTreeMap<String, String> = std::env::vars().collect();
  before.extend(env.iter().cloned());

  let changed: Vec<(String, String)> = after
    .into_iter()
    .filter(|(name, value)| !IGNORED.contains(&name.as_str()) && before.get(name) != Some(value))
    .collect();

  debug!(count = changed.len(), "captured initenv variables");
  Ok(literal_layer(Source::Initenv, changed))
}

/// Parse the NUL-separated output of `env -0`.
fn parse_dump(bytes: &[u8]) -> BTreeMap<String, String> {
  bytes
    .split(|b| *b == 0)
    .filter(|entry| !entry.is_empty())
    .filter_map(|entry| {
      let entry = String::from_utf8_lossy(entry);
      entry
        .split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
    })
    .collect()
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::config::resolve::resolve;
  use tempfile::TempDir;

  fn write_script(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("initenv");
    fs::write(&path, content).unwrap();
    path
  }

  #[test]
  fn parses_env_dump() {
    let vars = parse_dump(b"A=1\0MULTI=line one\nline two\0EQ=x=y\0\0");
    assert_eq!(vars.get("A").map(String::as_str), Some("1"));
    assert_eq!(vars.get("MULTI").map(String::as_str), Some("line one\nline two"));
    assert_eq!(vars.get("EQ").map(String::as_str), Some("x=y"));
  }

  #[tokio::test]
  async fn captures_added_and_changed_variables() {
    let temp = TempDir::new().unwrap();
    let script = write_script(
      temp.path(),
      "echo 'setting up'\nexport INITENV_ADDED=\"value with spaces\"\nexport INITENV_CHANGED=new\nexport INITENV_SAME=same\nexport INITENV_ARG=\"$1\"\n",
    );

    let env = vec![
      ("INITENV_CHANGED".to_string(), "old".to_string()),
      ("INITENV_SAME".to_string(), "same".to_string()),
    ];
    let layer = capture(&script, &["/tmp/build".to_string()], &env, temp.path())
      .await
      .unwrap();

    assert_eq!(layer.source, Source::Initenv);
    assert!(!layer.defines("INITENV_SAME"));
    assert!(!layer.defines("PWD"));

    let snapshot = resolve(&[layer]).unwrap();
    assert_eq!(snapshot.get("INITENV_ADDED"), Some("value with spaces"));
    assert_eq!(snapshot.get("INITENV_CHANGED"), Some("new"));
    assert_eq!(snapshot.get("INITENV_ARG"), Some("/tmp/build"));
    assert!(snapshot.is_exported("INITENV_ADDED"));
  }

  #[tokio::test]
  async fn missing_script_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    let err = capture(&temp.path().join("nope"), &[], &[], temp.path())
      .await
      .unwrap_err();
    assert!(matches!(err, ConfigError::Initenv { .. }));
  }

  #[tokio::test]
  async fn failing_script_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    let script = write_script(temp.path(), "echo 'cannot initialize'\nfalse\n");
    let err = capture(&script, &[], &[], temp.path()).await.unwrap_err();
    assert!(err.to_string().contains("cannot initialize"));
  }
}
