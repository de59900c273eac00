//! CLI module for the image-enhance library
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{exit_code_for, main, run, Cli, CliDetector, CliLogFormat};
