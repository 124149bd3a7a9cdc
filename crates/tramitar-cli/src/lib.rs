//! Tramitador CLI library
//!
//! Command-line interface for the Tramitar form-automation engine:
//! real browser submissions, simulated dry runs, and catalog inspection.

mod commands;
mod config;
mod demo;
mod error;
mod inputs;
mod logging;
mod output;

pub use commands::{Cli, Commands, DryRunArgs, SubmitArgs, VariantsArgs};
pub use config::Verbosity;
pub use demo::{demo_form, demo_request};
pub use error::{CliError, CliResult};
pub use inputs::{load_catalog, load_request, load_table};
pub use logging::init_logging;
pub use output::{print_summary, write_record};
