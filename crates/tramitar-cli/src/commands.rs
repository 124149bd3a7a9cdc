//! CLI command definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tramitador: CLI for Tramitar - resilient municipal complaint form automation
#[derive(Parser, Debug)]
#[command(name = "tramitador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a report through a real browser session
    Submit(SubmitArgs),

    /// Run a request against the built-in simulated street form
    ///
    /// Exercises the full wizard (locator resolution, dispatch chain,
    /// location workflow, extraction) without touching a browser. Useful
    /// for validating request files and catalogs.
    DryRun(DryRunArgs),

    /// List the form variants a locator catalog covers
    Variants(VariantsArgs),
}

/// Arguments for the submit command
#[derive(Parser, Debug)]
pub struct SubmitArgs {
    /// Submission request JSON file
    #[arg(short, long)]
    pub request: PathBuf,

    /// Locator catalog JSON (defaults to the built-in tables)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Category option table JSON
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Write the confirmation record JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Step wait budget in milliseconds
    #[arg(long, default_value = "10000")]
    pub timeout_ms: u64,

    /// Press attempts per verified step
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// Run with a visible browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containerized environments)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Chromium executable path
    #[arg(long)]
    pub chromium: Option<PathBuf>,
}

/// Arguments for the dry-run command
#[derive(Parser, Debug)]
pub struct DryRunArgs {
    /// Submission request JSON file (defaults to a built-in street request)
    #[arg(short, long)]
    pub request: Option<PathBuf>,

    /// Write the confirmation record JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Step wait budget in milliseconds
    #[arg(long, default_value = "2000")]
    pub timeout_ms: u64,

    /// Press attempts per verified step
    #[arg(long, default_value = "3")]
    pub retries: u32,
}

/// Arguments for the variants command
#[derive(Parser, Debug)]
pub struct VariantsArgs {
    /// Locator catalog JSON (defaults to the built-in tables)
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}
