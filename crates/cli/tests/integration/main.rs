//! CLI integration tests against a fake container engine.

#![cfg(unix)]

mod common;
mod config_tests;
mod image_tests;
mod run_tests;
