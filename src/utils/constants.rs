/// Field separator between station name and measurement.
pub const RECORD_DELIMITER: u8 = b';';

/// Separator between stations in the final report.
pub const REPORT_SEPARATOR: &str = ", ";

/// Processing defaults
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "STATION_STATS";


/// Stack size for shared-queue partition threads.
pub const WORKER_STACK_SIZE: usize = 256 * 1024;

/// Process exit status after a second interrupt (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;
