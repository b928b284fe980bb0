//! Command-line interface for specforge
//!
//! ## Module Structure
//!
//! - `args`: CLI argument definitions and parsing structures (clap)
//! - `run`: Main entry point and command dispatch
//! - `commands`: Command implementations and output rendering

pub mod args;
mod commands;
mod run;

pub use args::{Cli, Commands};
pub use run::run;
