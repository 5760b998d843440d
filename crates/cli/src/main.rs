use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use openbar_lib::config::CliArgs;
use openbar_lib::orchestrator::RunError;
use openbar_lib::process::ProcessError;

mod cmd;
mod output;

use output::{OutputFormat, print_error};

/// Exit status after Ctrl-C, as a shell reports it.
const EXIT_INTERRUPTED: u8 = 130;
const EXIT_FAILURE: u8 = 2;

/// openbar - run project targets inside a reproducible container
#[derive(Parser)]
#[command(name = "ob")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Run as if started in DIR
  #[arg(short = 'C', long = "directory", value_name = "DIR")]
  directory: Option<PathBuf>,

  /// Output format of the `env` and `containers` targets
  #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
  format: OutputFormat,

  /// Targets to run and KEY=value overrides (default target: all)
  #[arg(value_name = "TARGET|KEY=VALUE")]
  args: Vec<String>,
}

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let cli = Cli::parse();

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) if is_interrupted(&e) => ExitCode::from(EXIT_INTERRUPTED),
    Err(e) => {
      print_error(&format!("{e:#}"));
      ExitCode::from(EXIT_FAILURE)
    }
  }
}

fn run(cli: Cli) -> Result<()> {
  let root_dir = match cli.directory {
    Some(dir) => dir,
    None => std::env::current_dir().context("Failed to get current directory")?,
  };
  let root_dir =
    dunce::canonicalize(&root_dir).with_context(|| format!("Failed to access directory {}", root_dir.display()))?;

  let args = CliArgs::parse(cli.args);

  let runtime = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to start async runtime")?;

  runtime.block_on(cmd::dispatch(&root_dir, args, cli.format))
}

fn is_interrupted(err: &anyhow::Error) -> bool {
  err.chain().any(|cause| {
    cause.downcast_ref::<RunError>().is_some_and(RunError::is_interrupted)
      || matches!(cause.downcast_ref::<ProcessError>(), Some(ProcessError::Interrupted { .. }))
  })
}
