//! openbar-lib: configuration and container engines for openbar
//!
//! This crate provides the pieces behind the `ob` command:
//! - `config`: layered variable resolution into an immutable snapshot
//! - `container`: content-derived image tags, the build/pull policy and the
//!   container runtime collaborator
//! - `orchestrator`: prepares the image and runs targets inside it
//! - `session`: loads every configuration source for one invocation

pub mod config;
pub mod consts;
pub mod container;
pub mod orchestrator;
pub mod process;
pub mod project;
pub mod session;
