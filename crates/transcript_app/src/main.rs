mod cli;
mod config;
mod logging;
mod output;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use engine_logging::{engine_info, engine_warn};
use transcript_engine::{ensure_output_dir, CancellationToken, JobPool, RunSummary, YtDlpTool};

use cli::Cli;
use output::EventPrinter;

/// Conventional exit status after SIGINT.
const EXIT_CANCELLED: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(destination) = cli.log_destination() {
        logging::initialize(destination);
    }
    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let mut config = config::load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    let urls = cli.collect_urls()?;

    ensure_output_dir(&config.output_dir).context("output directory is not usable")?;
    if config.work_dir() != config.output_dir {
        ensure_output_dir(config.work_dir()).context("work directory is not usable")?;
    }

    let tool = Arc::new(YtDlpTool::new(
        config.tool_program.clone(),
        config.tool_args.clone(),
    ));
    let pool = JobPool::from_config(&config, tool);
    engine_info!(
        "starting run of {} URLs with {} workers into {:?}",
        urls.len(),
        pool.concurrency(),
        config.output_dir
    );

    let handle = pool.run(&urls);
    watch_ctrl_c(handle.cancellation_token())?;

    let mut printer = EventPrinter::new(io::stdout().lock(), cli.json);
    while let Some(batch) = handle.poll_events(config.event_poll_interval()) {
        for event in &batch {
            printer.print(event).context("could not write output")?;
        }
    }

    let summary = handle.wait().map_err(|_| anyhow!("run thread panicked"))?;
    printer
        .print_summary(&summary)
        .context("could not write output")?;

    Ok(ExitCode::from(exit_status(&summary)))
}

/// A cancel that lands after every job finished still counts as success.
fn exit_status(summary: &RunSummary) -> u8 {
    if summary.is_complete() {
        0
    } else {
        EXIT_CANCELLED
    }
}

/// Cancels the run on the first Ctrl-C. The watcher thread ends with the
/// process or as soon as the run is cancelled some other way.
fn watch_ctrl_c(cancel: CancellationToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("could not start signal handler")?;
    thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => match result {
                        Ok(()) => {
                            engine_info!("interrupt received, cancelling run");
                            eprintln!("Cancelling...");
                            cancel.cancel();
                        }
                        Err(err) => engine_warn!("could not listen for Ctrl-C: {}", err),
                    },
                    _ = cancel.cancelled() => {}
                }
            });
        })
        .context("could not start signal handler")?;
    Ok(())
}
