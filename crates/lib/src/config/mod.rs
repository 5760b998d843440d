//! Layered variable configuration.
//!
//! This module turns the command line, the process environment, the
//! project file, the persisted `.config` and an optional initenv script into
//! one immutable [`ConfigurationSnapshot`]:
//! - `sources`: builds one [`Layer`] per source
//! - `parse`: the config file language
//! - `resolve`: merges layers per precedence and operator
//! - `expand`: `$(NAME)` references

pub mod expand;
pub mod initenv;
pub mod parse;
pub mod resolve;
pub mod snapshot;
pub mod sources;
pub mod types;

pub use parse::{ConfigFile, Target};
pub use resolve::resolve;
pub use snapshot::ConfigurationSnapshot;
pub use sources::{CliArgs, Defconfig};
pub use types::{ConfigError, Definition, Layer, Operator, Source, Variable};
