//! Crate implementing the CLI commands.

mod cli;
mod config;
mod report;
mod run;
mod symbols;

pub use self::cli::{CliAction, CliOpts};
pub use self::config::{BreakpointConfig, HitAction, RunConfig};
pub use self::run::{evaluate_run, parse_run_config};
pub use self::symbols::evaluate_symbols;
