//! Tramitador: submit municipal complaint forms from the command line
//!
//! ## Usage
//!
//! ```bash
//! tramitador submit -r request.json -o record.json   # Real browser run
//! tramitador dry-run                                 # Simulated street form
//! tramitador variants                                # Catalog coverage
//! ```

use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tramitador::{
    demo_form, demo_request, init_logging, load_catalog, load_request, load_table, print_summary,
    write_record, Cli, CliResult, Commands, DryRunArgs, SubmitArgs, VariantsArgs, Verbosity,
};
use tramitar::{
    ConfirmationRecord, SequencerConfig, SessionHandle, StepSequencer, WaitOptions,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    init_logging(verbosity);

    match run(cli, verbosity).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, verbosity: Verbosity) -> CliResult<bool> {
    match cli.command {
        Commands::Submit(args) => run_submit(&args, verbosity).await,
        Commands::DryRun(args) => run_dry_run(&args, verbosity).await,
        Commands::Variants(args) => {
            run_variants(&args)?;
            Ok(true)
        }
    }
}

/// Ctrl-C cancels cooperatively: the current step finishes, the session is
/// released, and the partial record is still produced.
fn cancellation_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling at the next step boundary");
            trigger.cancel();
        }
    });
    cancel
}

fn finish(
    record: &ConfirmationRecord,
    output: Option<&std::path::Path>,
    verbosity: Verbosity,
) -> CliResult<bool> {
    if let Some(path) = output {
        write_record(record, path)?;
    }
    print_summary(record, verbosity.is_quiet());
    Ok(record.success)
}

#[cfg(feature = "browser")]
async fn run_submit(args: &SubmitArgs, verbosity: Verbosity) -> CliResult<bool> {
    use tramitar::{ChromiumConfig, ChromiumFormDriver};

    let request = load_request(&args.request)?;
    let catalog = load_catalog(args.catalog.as_deref())?;
    let table = load_table(args.options.as_deref())?;

    let mut chromium = ChromiumConfig::new();
    if args.headed {
        chromium = chromium.with_head();
    }
    if args.no_sandbox {
        chromium = chromium.no_sandbox();
    }
    if let Some(path) = &args.chromium {
        chromium = chromium.with_executable(path);
    }

    let driver = ChromiumFormDriver::launch(chromium).await?;
    let sequencer = StepSequencer::new(
        SessionHandle::acquire(Box::new(driver)),
        catalog,
        table,
        SequencerConfig {
            retry_budget: args.retries,
            wait: WaitOptions::new().with_timeout(args.timeout_ms),
        },
    )
    .with_cancellation(cancellation_on_ctrl_c());

    let record = sequencer.run(&request).await;
    finish(&record, args.output.as_deref(), verbosity)
}

#[cfg(not(feature = "browser"))]
async fn run_submit(_args: &SubmitArgs, _verbosity: Verbosity) -> CliResult<bool> {
    Err(tramitador::CliError::config(
        "browser support not enabled. Rebuild with --features browser",
    ))
}

async fn run_dry_run(args: &DryRunArgs, verbosity: Verbosity) -> CliResult<bool> {
    let request = match &args.request {
        Some(path) => load_request(path)?,
        None => demo_request(),
    };
    let sequencer = StepSequencer::new(
        SessionHandle::acquire(Box::new(demo_form())),
        load_catalog(None)?,
        load_table(None)?,
        SequencerConfig {
            retry_budget: args.retries,
            wait: WaitOptions::new()
                .with_timeout(args.timeout_ms)
                .with_poll_interval(10),
        },
    )
    .with_cancellation(cancellation_on_ctrl_c());

    let record = sequencer.run(&request).await;
    finish(&record, args.output.as_deref(), verbosity)
}

fn run_variants(args: &VariantsArgs) -> CliResult<()> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    for name in catalog.variant_names() {
        println!("{name}");
    }
    Ok(())
}
