use crate::cli::args::Cli;
use crate::config::AggregationConfig;
use crate::error::{ProcessingError, Result};
use crate::processors::{AggregationCoordinator, RunSummary};
use crate::readers::LineReader;
use crate::utils::logging::init_logging;
use crate::utils::progress::ProgressReporter;
use crate::utils::CancellationToken;
use std::future::Future;
use tokio::task::JoinError;
use tracing::{error, info, warn};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = AggregationConfig::load(cli.config.as_deref(), &cli.overrides())?;
    info!(
        workers = config.workers,
        strategy = ?config.strategy,
        "configuration loaded"
    );

    let cancel = CancellationToken::new();
    let pipeline_cancel = cancel.clone();
    let show_progress = cli.progress;

    let pipeline = tokio::task::spawn_blocking(move || {
        aggregate_stdin(&config, pipeline_cancel, show_progress)
    });

    let summary = supervise(pipeline, &cancel, tokio::signal::ctrl_c).await?;

    info!(
        stations = summary.stations,
        records = summary.records,
        malformed = summary.malformed,
        "run complete"
    );
    Ok(())
}

/// Wait for the pipeline while listening for interrupts.
///
/// The first interrupt cancels the run so it can finish with partial
/// results. A read blocked on stdin cannot observe that, so a second
/// interrupt gives up on the pipeline and returns `Interrupted`.
pub async fn supervise<P, F, S>(
    mut pipeline: P,
    cancel: &CancellationToken,
    mut interrupt: F,
) -> Result<RunSummary>
where
    P: Future<Output = std::result::Result<Result<RunSummary>, JoinError>> + Unpin,
    F: FnMut() -> S,
    S: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        joined = &mut pipeline => return joined?,
        signal = interrupt() => match signal {
            Ok(()) => {
                warn!("interrupt received, finishing with partial results");
                cancel.cancel();
            }
            Err(e) => {
                warn!(error = %e, "unable to listen for interrupts");
                return pipeline.await?;
            }
        },
    }

    tokio::select! {
        joined = &mut pipeline => joined?,
        signal = interrupt() => match signal {
            Ok(()) => {
                error!("second interrupt received, abandoning the run");
                Err(ProcessingError::Interrupted)
            }
            Err(e) => {
                warn!(error = %e, "unable to listen for interrupts");
                pipeline.await?
            }
        },
    }
}

/// Aggregate stdin into stdout with the given configuration.
pub fn aggregate_stdin(
    config: &AggregationConfig,
    cancel: CancellationToken,
    show_progress: bool,
) -> Result<RunSummary> {
    let progress = ProgressReporter::new_spinner("Reading measurements...", !show_progress);
    let mut reader = LineReader::stdin().with_batch_size(config.batch_size);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut coordinator = AggregationCoordinator::from_config(config).with_cancellation(cancel);
    let outcome = coordinator.run(&mut reader, &mut out, Some(&progress))?;

    Ok(outcome.summary)
}
