//! Command-line interface for waveforge
//!
//! ## Module Structure
//!
//! - `args`: CLI argument definitions (clap)
//! - `run`: entry point, configuration and command dispatch
//! - `commands`: command implementations

pub mod args;
pub mod commands;
mod run;

pub use args::{BudgetArgs, Cli, Commands, build_cli};
pub use run::run;
