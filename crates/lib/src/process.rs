//! Structured process invocation.
//!
//! Every external command (container engine, host shell) is described by an
//! [`Invocation`]: a program, an argument list, extra environment variables
//! and a working directory. Arguments are never re-parsed by a shell; they
//! are quoted only when displayed.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// A command to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  /// Added to the inherited environment.
  pub env: Vec<(String, String)>,
  pub cwd: Option<PathBuf>,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      ..Default::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.push((name.into(), value.into()));
    self
  }

  pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  /// The command line as a user would type it.
  pub fn display(&self) -> String {
    shell_words::join(std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str)))
  }

  fn command(&self) -> Command {
    let mut command = Command::new(&self.program);
    command.args(&self.args).kill_on_drop(true);
    command.envs(self.env.iter().map(|(k, v)| (k, v)));
    if let Some(cwd) = &self.cwd {
      command.current_dir(cwd);
    }
    command
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.display())
  }
}

/// What to do with the child's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
  /// Collect lines without printing them.
  Capture,
  /// Collect lines and forward each one as it arrives.
  Stream,
  /// Hand the terminal to the child; nothing is collected.
  Inherit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
  Stdout,
  Stderr,
}

/// One line of child output, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
  pub stream: StreamKind,
  pub text: String,
}

/// Exit status and collected output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
  pub code: Option<i32>,
  pub lines: Vec<OutputLine>,
}

impl ProcessOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }

  /// Stdout lines joined with newlines.
  pub fn stdout(&self) -> String {
    self.joined(Some(StreamKind::Stdout))
  }

  /// Every line joined with newlines.
  pub fn text(&self) -> String {
    self.joined(None)
  }

  fn joined(&self, stream: Option<StreamKind>) -> String {
    self
      .lines
      .iter()
      .filter(|l| stream.is_none_or(|s| l.stream == s))
      .map(|l| l.text.as_str())
      .collect::<Vec<_>>()
      .join("\n")
  }
}

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("command not found: {program}")]
  NotFound { program: String },

  #[error("failed to run '{command}': {source}")]
  Spawn { command: String, source: io::Error },

  #[error("command failed with {}: {command}{}", exit_code(*code), with_output(output))]
  Failed {
    command: String,
    code: Option<i32>,
    output: String,
  },

  #[error("interrupted: {command}")]
  Interrupted { command: String },
}

fn exit_code(code: Option<i32>) -> String {
  match code {
    Some(code) => format!("exit code {code}"),
    None => "no exit code".to_string(),
  }
}

fn with_output(output: &str) -> String {
  if output.is_empty() {
    String::new()
  } else {
    format!("\n{output}")
  }
}

/// Run a command and return its output whatever the exit status.
///
/// Ctrl-C kills the child and returns [`ProcessError::Interrupted`].
pub async fn execute(invocation: &Invocation, mode: OutputMode) -> Result<ProcessOutput, ProcessError> {
  let command_line = invocation.display();
  debug!(command = %command_line, ?mode, "spawning process");

  let mut command = invocation.command();
  if mode == OutputMode::Inherit {
    command.stdin(Stdio::inherit()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
  } else {
    command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
  }

  let mut child = command.spawn().map_err(|e| match e.kind() {
    io::ErrorKind::NotFound => ProcessError::NotFound {
      program: invocation.program.clone(),
    },
    _ => ProcessError::Spawn {
      command: command_line.clone(),
      source: e,
    },
  })?;

  let lines = if mode == OutputMode::Inherit {
    Vec::new()
  } else {
    match collect_lines(&mut child, mode == OutputMode::Stream).await {
      Ok(Some(lines)) => lines,
      Ok(None) => return Err(interrupt(&mut child, command_line).await),
      Err(e) => {
        if let Err(kill) = child.kill().await {
          debug!(error = %kill, "failed to kill child process");
        }
        return Err(ProcessError::Spawn {
          command: command_line,
          source: e,
        });
      }
    }
  };

  let status = tokio::select! {
    status = child.wait() => Some(status),
    _ = tokio::signal::ctrl_c() => None,
  };

  let status: ExitStatus = match status {
    Some(status) => status.map_err(|e| ProcessError::Spawn {
      command: command_line.clone(),
      source: e,
    })?,
    None => return Err(interrupt(&mut child, command_line).await),
  };

  debug!(command = %command_line, code = ?status.code(), "process exited");
  Ok(ProcessOutput {
    code: status.code(),
    lines,
  })
}

/// Run a command and fail on a non-zero exit status.
pub async fn run(invocation: &Invocation, mode: OutputMode) -> Result<ProcessOutput, ProcessError> {
  let output = execute(invocation, mode).await?;
  if !output.success() {
    return Err(ProcessError::Failed {
      command: invocation.display(),
      code: output.code,
      output: output.text(),
    });
  }
  Ok(output)
}

/// Read stdout and stderr line by line until both close. Returns `None` on
/// Ctrl-C.
async fn collect_lines(child: &mut Child, forward: bool) -> io::Result<Option<Vec<OutputLine>>> {
  let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
    return Err(io::Error::other("child output is not piped"));
  };

  let mut out = BufReader::new(stdout);
  let mut err = BufReader::new(stderr);
  let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());
  let (mut out_open, mut err_open) = (true, true);
  let mut lines = Vec::new();

  while out_open || err_open {
    let (stream, line) = tokio::select! {
      line = next_line(&mut out, &mut out_buf), if out_open => (StreamKind::Stdout, line?),
      line = next_line(&mut err, &mut err_buf), if err_open => (StreamKind::Stderr, line?),
      _ = tokio::signal::ctrl_c() => return Ok(None),
    };

    let Some(text) = line else {
      match stream {
        StreamKind::Stdout => out_open = false,
        StreamKind::Stderr => err_open = false,
      }
      continue;
    };

    if forward {
      match stream {
        StreamKind::Stdout => println!("{text}"),
        StreamKind::Stderr => eprintln!("{text}"),
      }
    }
    lines.push(OutputLine { stream, text });
  }

  Ok(Some(lines))
}

/// Read one line, decoding invalid UTF-8 lossily. `buf` keeps bytes read
/// by a cancelled call, so it is only cleared once a line is complete.
async fn next_line<R: AsyncBufRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
  let read = reader.read_until(b'\n', buf).await?;
  if read == 0 && buf.is_empty() {
    return Ok(None);
  }

  let mut bytes = std::mem::take(buf);
  if bytes.last() == Some(&b'\n') {
    bytes.pop();
    if bytes.last() == Some(&b'\r') {
      bytes.pop();
    }
  }
  Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

async fn interrupt(child: &mut Child, command: String) -> ProcessError {
  warn!(command = %command, "interrupted, killing child process");
  if let Err(e) = child.kill().await {
    debug!(error = %e, "failed to kill child process");
  }
  ProcessError::Interrupted { command }
}
