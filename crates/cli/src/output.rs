//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output: colored status
//! messages, section headers and JSON.

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const DEFAULT: &str = "*";
}

/// Shorten a digest for display.
pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_header(title: &str) {
  println!("{}", title.if_supports_color(Stream::Stdout, |s| s.bold()));
}

/// One entry of a target listing; `marked` entries get a `*`.
pub fn print_entry(name: &str, marked: bool, description: Option<&str>) {
  let mark = if marked { symbols::DEFAULT } else { " " };
  match description {
    Some(description) => println!(
      "  {mark} {name:<16} {}",
      description.if_supports_color(Stream::Stdout, |s| s.dimmed())
    ),
    None => println!("  {mark} {name}"),
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
