use crate::models::{observe_into, StationMap};
use crate::readers::{LineBatch, ParseError, RecordParser};
use crate::utils::CancellationToken;
use crossbeam::channel::Receiver;
use tracing::debug;

/// Line counters kept by one partition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionStats {
    pub lines: u64,
    pub records: u64,
    pub blank_lines: u64,
    pub malformed: u64,
    pub first_error: Option<ParseError>,
}

impl PartitionStats {
    pub fn absorb(&mut self, other: PartitionStats) {
        self.lines += other.lines;
        self.records += other.records;
        self.blank_lines += other.blank_lines;
        self.malformed += other.malformed;
        if self.first_error.is_none() {
            self.first_error = other.first_error;
        }
    }
}

/// What a worker publishes, exactly once, when its intake is exhausted.
#[derive(Debug)]
pub struct PartitionResult {
    pub worker_id: usize,
    pub stations: StationMap,
    pub stats: PartitionStats,
}

/// Owns one private station map and folds the lines handed to it.
pub struct PartitionWorker {
    id: usize,
    parser: RecordParser,
    stations: StationMap,
    stats: PartitionStats,
}

impl PartitionWorker {
    pub fn new(id: usize, parser: RecordParser) -> Self {
        Self {
            id,
            parser,
            stations: StationMap::new(),
            stats: PartitionStats::default(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn process_line(&mut self, line: &[u8]) {
        self.stats.lines += 1;

        if line.is_empty() {
            self.stats.blank_lines += 1;
            return;
        }

        match self.parser.parse(line) {
            Ok(measurement) => {
                observe_into(&mut self.stations, measurement);
                self.stats.records += 1;
            }
            Err(e) => {
                debug!(
                    worker = self.id,
                    error = %e,
                    line = %String::from_utf8_lossy(line),
                    "skipping malformed line"
                );
                self.stats.malformed += 1;
                if self.stats.first_error.is_none() {
                    self.stats.first_error = Some(e);
                }
            }
        }
    }

    pub fn process_batch<L: AsRef<[u8]>>(&mut self, batch: &[L]) {
        for line in batch {
            self.process_line(line.as_ref());
        }
    }

    /// Drain the shared intake until it is closed (or cancellation is
    /// requested), then publish.
    pub fn run(
        mut self,
        intake: &Receiver<LineBatch>,
        cancel: &CancellationToken,
    ) -> PartitionResult {
        debug!(worker = self.id, "partition worker started");

        while let Ok(batch) = intake.recv() {
            if cancel.is_cancelled() {
                debug!(worker = self.id, "cancellation observed, stopping intake");
                break;
            }
            self.process_batch(&batch);
        }

        self.finish()
    }

    pub fn finish(self) -> PartitionResult {
        debug!(
            worker = self.id,
            stations = self.stations.len(),
            records = self.stats.records,
            malformed = self.stats.malformed,
            "partition worker publishing"
        );

        PartitionResult {
            worker_id: self.id,
            stations: self.stations,
            stats: self.stats,
        }
    }
}
