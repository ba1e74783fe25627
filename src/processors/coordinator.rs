use crate::config::AggregationConfig;
use crate::error::{ProcessingError, Result};
use crate::models::{merge_maps, StationMap};
use crate::processors::{PartitionResult, PartitionStats, PartitionWorker};
use crate::readers::{LineBatch, LineReader, RecordParser};
use crate::utils::constants::WORKER_STACK_SIZE;
use crate::utils::progress::ProgressReporter;
use crate::utils::CancellationToken;
use crate::writers::ReportWriter;
use crossbeam::channel::{self, Sender};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, Write};
use std::ops::Range;
use std::thread;
use tracing::{debug, info, warn};

/// How input lines are distributed across partition workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DistributionStrategy {
    /// Bounded queue of line batches drained by N worker threads.
    #[default]
    SharedQueue,
    /// Buffer the whole input, then split it into N contiguous partitions.
    Chunked,
    /// Single partition folded on the calling thread.
    Sequential,
}

/// What to do with lines that fail to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MalformedPolicy {
    /// Count and log the line, keep going.
    #[default]
    Skip,
    /// Finish the run, then fail instead of reporting.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Running,
    Draining,
    Merging,
    Done,
}

/// Counters describing a finished run. Never written to stdout.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub strategy: DistributionStrategy,
    pub partitions: usize,
    pub lines_read: u64,
    pub lines_processed: u64,
    pub records: u64,
    pub blank_lines: u64,
    pub malformed: u64,
    pub stations: usize,
    pub input_failed: bool,
    pub cancelled: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Aggregation Summary:\n  Strategy: {:?} ({} partitions)\n  Lines read: {}\n  Lines processed: {}\n  Records: {}\n  Blank lines: {}\n  Malformed lines: {}\n  Stations: {}",
            self.strategy,
            self.partitions,
            self.lines_read,
            self.lines_processed,
            self.records,
            self.blank_lines,
            self.malformed,
            self.stations
        )?;
        if self.input_failed {
            write!(f, "\n  Input stream failed before end-of-stream")?;
        }
        if self.cancelled {
            write!(f, "\n  Run was cancelled, report is partial")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct AggregationOutcome {
    pub stations: StationMap,
    pub summary: RunSummary,
}

/// Distributes lines to partition workers, waits for every worker to
/// publish, merges their maps and hands the result to the report writer.
///
/// Single use: a coordinator moves `Running -> Draining -> Merging -> Done`
/// exactly once.
pub struct AggregationCoordinator {
    workers: usize,
    strategy: DistributionStrategy,
    queue_capacity: usize,
    malformed_policy: MalformedPolicy,
    parser: RecordParser,
    cancel: CancellationToken,
    state: CoordinatorState,
}

impl AggregationCoordinator {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            strategy: DistributionStrategy::default(),
            queue_capacity: crate::utils::constants::DEFAULT_QUEUE_CAPACITY,
            malformed_policy: MalformedPolicy::default(),
            parser: RecordParser::new(),
            cancel: CancellationToken::new(),
            state: CoordinatorState::Running,
        }
    }

    pub fn from_config(config: &AggregationConfig) -> Self {
        Self::new(config.workers)
            .with_strategy(config.strategy)
            .with_queue_capacity(config.queue_capacity)
            .with_malformed_policy(config.malformed)
    }

    pub fn with_strategy(mut self, strategy: DistributionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity.max(1);
        self
    }

    pub fn with_malformed_policy(mut self, malformed_policy: MalformedPolicy) -> Self {
        self.malformed_policy = malformed_policy;
        self
    }

    pub fn with_parser(mut self, parser: RecordParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Consume the whole input, write the report to `out` and return the
    /// merged stations with the run counters.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        reader: &mut LineReader<R>,
        out: &mut W,
        progress: Option<&ProgressReporter>,
    ) -> Result<AggregationOutcome> {
        if self.state != CoordinatorState::Running {
            return Err(ProcessingError::InvalidStateTransition {
                from: self.state,
                to: CoordinatorState::Running,
            });
        }

        info!(
            workers = self.workers,
            strategy = ?self.strategy,
            queue_capacity = self.queue_capacity,
            batch_size = reader.batch_size(),
            "starting aggregation"
        );

        if let Some(p) = progress {
            p.set_message("Reading measurements...");
        }

        let partitions = match self.strategy {
            DistributionStrategy::SharedQueue => self.run_shared_queue(reader, progress)?,
            DistributionStrategy::Chunked => self.run_chunked(reader, progress)?,
            DistributionStrategy::Sequential => self.run_sequential(reader, progress)?,
        };

        self.advance(CoordinatorState::Merging)?;
        if let Some(p) = progress {
            p.set_message("Merging partitions...");
        }

        let partition_count = partitions.len();
        let (stations, stats) = merge_partitions(partitions);

        let summary = RunSummary {
            strategy: self.strategy,
            partitions: partition_count,
            lines_read: reader.lines_read(),
            lines_processed: stats.lines,
            records: stats.records,
            blank_lines: stats.blank_lines,
            malformed: stats.malformed,
            stations: stations.len(),
            input_failed: reader.input_failed(),
            cancelled: self.cancel.is_cancelled(),
        };

        if summary.malformed > 0 {
            warn!(
                malformed = summary.malformed,
                first_error = ?stats.first_error,
                "malformed lines were skipped"
            );
        }
        if summary.cancelled {
            warn!("run was cancelled, emitting partial results");
        }

        if self.malformed_policy == MalformedPolicy::Strict {
            if let Some(first) = stats.first_error {
                return Err(ProcessingError::MalformedInput {
                    count: summary.malformed,
                    first,
                });
            }
        }

        ReportWriter::new().write_report(out, &stations)?;
        self.advance(CoordinatorState::Done)?;

        if let Some(p) = progress {
            p.finish_with_message(&format!("Aggregated {} stations", summary.stations));
        }
        info!("{}", summary);

        Ok(AggregationOutcome { stations, summary })
    }

    fn advance(&mut self, next: CoordinatorState) -> Result<()> {
        use CoordinatorState::*;

        let allowed = matches!(
            (self.state, next),
            (Running, Draining) | (Draining, Merging) | (Merging, Done)
        );
        if !allowed {
            return Err(ProcessingError::InvalidStateTransition {
                from: self.state,
                to: next,
            });
        }

        debug!(from = ?self.state, to = ?next, "coordinator transition");
        self.state = next;
        Ok(())
    }

    fn run_shared_queue<R: BufRead>(
        &mut self,
        reader: &mut LineReader<R>,
        progress: Option<&ProgressReporter>,
    ) -> Result<Vec<PartitionResult>> {
        let (sender, intake) = channel::bounded::<LineBatch>(self.queue_capacity);
        let parser = self.parser;
        let cancel = self.cancel.clone();
        let workers = self.workers;

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for id in 0..workers {
                let intake = intake.clone();
                let cancel = cancel.clone();
                let spawned = thread::Builder::new()
                    .name(format!("partition-{}", id))
                    .stack_size(WORKER_STACK_SIZE)
                    .spawn_scoped(scope, move || {
                        PartitionWorker::new(id, parser).run(&intake, &cancel)
                    });

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) if handles.is_empty() => return Err(ProcessingError::Io(e)),
                    Err(e) => {
                        // Any live worker can drain the queue; continue with what started.
                        warn!(
                            requested = workers,
                            spawned = handles.len(),
                            error = %e,
                            "could not spawn all partition workers"
                        );
                        break;
                    }
                }
            }
            drop(intake);

            produce(reader, &sender, &cancel, progress);
            drop(sender);
            self.advance(CoordinatorState::Draining)?;

            let mut results = Vec::with_capacity(handles.len());
            for (worker_id, handle) in handles.into_iter().enumerate() {
                let result = handle
                    .join()
                    .map_err(|_| ProcessingError::WorkerPanicked { worker_id })?;
                results.push(result);
            }
            Ok(results)
        })
    }

    fn run_chunked<R: BufRead>(
        &mut self,
        reader: &mut LineReader<R>,
        progress: Option<&ProgressReporter>,
    ) -> Result<Vec<PartitionResult>> {
        let lines = if self.cancel.is_cancelled() {
            Vec::new()
        } else {
            reader.read_all()
        };
        if let Some(p) = progress {
            p.increment(lines.len() as u64);
        }
        self.advance(CoordinatorState::Draining)?;

        let workers = self.workers;
        let threads = workers.min(num_cpus::get()).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("partition-pool-{}", i))
            .build()?;

        let parser = self.parser;
        let cancel = &self.cancel;
        let lines = &lines;

        let results = pool.install(|| {
            (0..workers)
                .into_par_iter()
                .map(|id| {
                    let mut worker = PartitionWorker::new(id, parser);
                    if !cancel.is_cancelled() {
                        worker.process_batch(&lines[partition_bounds(id, lines.len(), workers)]);
                    }
                    worker.finish()
                })
                .collect::<Vec<_>>()
        });

        Ok(results)
    }

    fn run_sequential<R: BufRead>(
        &mut self,
        reader: &mut LineReader<R>,
        progress: Option<&ProgressReporter>,
    ) -> Result<Vec<PartitionResult>> {
        let mut worker = PartitionWorker::new(0, self.parser);

        while !self.cancel.is_cancelled() {
            match reader.next_batch() {
                Some(batch) => {
                    if let Some(p) = progress {
                        p.increment(batch.len() as u64);
                    }
                    worker.process_batch(&batch);
                }
                None => break,
            }
        }

        self.advance(CoordinatorState::Draining)?;
        Ok(vec![worker.finish()])
    }
}

impl Default for AggregationCoordinator {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

/// Feed batches into the intake until input ends, cancellation is
/// requested, or every worker has gone away.
fn produce<R: BufRead>(
    reader: &mut LineReader<R>,
    sender: &Sender<LineBatch>,
    cancel: &CancellationToken,
    progress: Option<&ProgressReporter>,
) {
    while !cancel.is_cancelled() {
        let Some(batch) = reader.next_batch() else {
            return;
        };

        if let Some(p) = progress {
            p.increment(batch.len() as u64);
        }

        if sender.send(batch).is_err() {
            warn!("all partition workers have stopped, closing intake");
            return;
        }
    }
    debug!("cancellation observed by producer, closing intake");
}

/// Fold every published partition into one global map.
pub fn merge_partitions(partitions: Vec<PartitionResult>) -> (StationMap, PartitionStats) {
    let mut stations = StationMap::new();
    let mut stats = PartitionStats::default();

    for partition in partitions {
        debug!(
            worker = partition.worker_id,
            stations = partition.stations.len(),
            "merging partition"
        );
        merge_maps(&mut stations, partition.stations);
        stats.absorb(partition.stats);
    }

    (stations, stats)
}

/// Contiguous slice of `total` items assigned to partition `index` of `parts`.
pub fn partition_bounds(index: usize, total: usize, parts: usize) -> Range<usize> {
    let start = (index as u128 * total as u128 / parts as u128) as usize;
    let end = ((index as u128 + 1) * total as u128 / parts as u128) as usize;
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn run_with(
        input: &str,
        strategy: DistributionStrategy,
        workers: usize,
    ) -> (String, AggregationOutcome) {
        let mut reader = LineReader::new(Cursor::new(input.to_string())).with_batch_size(2);
        let mut out = Vec::new();
        let mut coordinator = AggregationCoordinator::new(workers)
            .with_strategy(strategy)
            .with_queue_capacity(2);
        let outcome = coordinator.run(&mut reader, &mut out, None).unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Done);
        (String::from_utf8(out).unwrap(), outcome)
    }

    #[test]
    fn test_every_strategy_reports_the_same() {
        let input = "Zurich;10.0\nAbha;3.0\nAbha;-2.5\nOslo;4.25\nAbha;7.1\nZurich;-1.5\n";
        let expected = "Abha=-2.5/2.5/7.1, Oslo=4.3/4.3/4.3, Zurich=-1.5/4.3/10.0";

        for strategy in [
            DistributionStrategy::SharedQueue,
            DistributionStrategy::Chunked,
            DistributionStrategy::Sequential,
        ] {
            for workers in [1, 3, 8] {
                let (report, outcome) = run_with(input, strategy, workers);
                assert_eq!(report, expected);
                assert_eq!(outcome.summary.records, 6);
                assert_eq!(outcome.summary.stations, 3);
            }
        }
    }

    #[test]
    fn test_every_worker_publishes_once() {
        let (_, outcome) = run_with("A;1.0\n", DistributionStrategy::SharedQueue, 5);
        assert_eq!(outcome.summary.partitions, 5);

        let (_, outcome) = run_with("A;1.0\n", DistributionStrategy::Chunked, 5);
        assert_eq!(outcome.summary.partitions, 5);

        let (_, outcome) = run_with("A;1.0\n", DistributionStrategy::Sequential, 5);
        assert_eq!(outcome.summary.partitions, 1);
    }

    #[test]
    fn test_shared_queue_with_far_more_workers_than_lines() {
        let (report, outcome) = run_with(
            "B;2.0\nA;1.0\nB;4.0\n",
            DistributionStrategy::SharedQueue,
            10_000,
        );

        assert_eq!(report, "A=1.0/1.0/1.0, B=2.0/3.0/4.0");
        assert_eq!(outcome.summary.records, 3);
        assert!(outcome.summary.partitions >= 1);
        assert!(outcome.summary.partitions <= 10_000);
    }

    #[test]
    fn test_trailing_carriage_return_without_newline() {
        for strategy in [
            DistributionStrategy::SharedQueue,
            DistributionStrategy::Chunked,
            DistributionStrategy::Sequential,
        ] {
            let (report, outcome) = run_with("B;2.0\r\nA;1.0\r", strategy, 2);
            assert_eq!(report, "A=1.0/1.0/1.0, B=2.0/2.0/2.0");
            assert_eq!(outcome.summary.malformed, 0);
        }
    }

    #[test]
    fn test_malformed_lines_are_skipped_and_counted() {
        let input = "A;1.0\nno delimiter\n\nB;abc\nA;3.0\n";
        let (report, outcome) = run_with(input, DistributionStrategy::SharedQueue, 2);

        assert_eq!(report, "A=1.0/2.0/3.0");
        assert_eq!(outcome.summary.lines_read, 5);
        assert_eq!(outcome.summary.records, 2);
        assert_eq!(outcome.summary.blank_lines, 1);
        assert_eq!(outcome.summary.malformed, 2);
    }

    #[test]
    fn test_strict_policy_fails_without_output() {
        let mut reader = LineReader::new(Cursor::new("A;1.0\nbroken\n"));
        let mut out = Vec::new();
        let mut coordinator = AggregationCoordinator::new(2)
            .with_malformed_policy(MalformedPolicy::Strict);

        let err = coordinator.run(&mut reader, &mut out, None).unwrap_err();
        match err {
            ProcessingError::MalformedInput { count, first } => {
                assert_eq!(count, 1);
                assert_eq!(first, crate::readers::ParseError::MissingDelimiter);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(out.is_empty());
    }

    #[test]
    fn test_empty_input_reports_nothing() {
        for strategy in [
            DistributionStrategy::SharedQueue,
            DistributionStrategy::Chunked,
            DistributionStrategy::Sequential,
        ] {
            let (report, outcome) = run_with("", strategy, 4);
            assert_eq!(report, "");
            assert!(outcome.stations.is_empty());
        }
    }

    #[test]
    fn test_cancelled_run_still_reports() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut reader = LineReader::new(Cursor::new("A;1.0\n"));
        let mut out = Vec::new();
        let mut coordinator = AggregationCoordinator::new(2).with_cancellation(cancel);
        let outcome = coordinator.run(&mut reader, &mut out, None).unwrap();

        assert!(outcome.summary.cancelled);
        assert_eq!(outcome.summary.records, 0);
        assert_eq!(coordinator.state(), CoordinatorState::Done);
    }

    #[test]
    fn test_coordinator_is_single_use() {
        let mut coordinator = AggregationCoordinator::new(1);
        let mut out = Vec::new();
        coordinator
            .run(&mut LineReader::new(Cursor::new("A;1.0\n")), &mut out, None)
            .unwrap();

        let err = coordinator
            .run(&mut LineReader::new(Cursor::new("A;1.0\n")), &mut out, None)
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::InvalidStateTransition {
                from: CoordinatorState::Done,
                ..
            }
        ));
    }

    #[test]
    fn test_partition_bounds_cover_input_exactly() {
        for (total, parts) in [(0, 3), (1, 4), (10, 3), (7, 7), (5, 10_000)] {
            let mut covered = 0;
            for index in 0..parts {
                let range = partition_bounds(index, total, parts);
                assert_eq!(range.start, covered);
                covered = range.end;
            }
            assert_eq!(covered, total);
        }
    }
}
