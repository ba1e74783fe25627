use crate::error::Result;
use crate::processors::{DistributionStrategy, MalformedPolicy};
use crate::utils::constants::{DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY, ENV_PREFIX};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use validator::Validate;

/// Settings fixed once at startup and passed into the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AggregationConfig {
    #[validate(range(min = 1, max = 65536))]
    pub workers: usize,

    pub strategy: DistributionStrategy,

    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    #[validate(range(min = 1))]
    pub batch_size: usize,

    pub malformed: MalformedPolicy,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            strategy: DistributionStrategy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            malformed: MalformedPolicy::default(),
        }
    }
}

/// Values given on the command line; they win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workers: Option<usize>,
    pub strategy: Option<DistributionStrategy>,
    pub queue_capacity: Option<usize>,
    pub batch_size: Option<usize>,
    pub malformed: Option<MalformedPolicy>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut AggregationConfig) {
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(queue_capacity) = self.queue_capacity {
            config.queue_capacity = queue_capacity;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(malformed) = self.malformed {
            config.malformed = malformed;
        }
    }
}

impl AggregationConfig {
    /// Layer defaults, an optional config file, `STATION_STATS_*`
    /// environment variables and command line overrides, in that order.
    pub fn load(config_file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        Self::load_from(
            config_file,
            Environment::with_prefix(ENV_PREFIX),
            overrides,
        )
    }

    pub fn load_from(
        config_file: Option<&Path>,
        environment: Environment,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        let defaults = AggregationConfig::default();

        let mut builder = Config::builder()
            .set_default("workers", defaults.workers as i64)?
            .set_default("strategy", "shared-queue")?
            .set_default("queue_capacity", defaults.queue_capacity as i64)?
            .set_default("batch_size", defaults.batch_size as i64)?
            .set_default("malformed", "skip")?;

        if let Some(path) = config_file {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(File::from(path));
        }

        let mut config: AggregationConfig =
            builder.add_source(environment).build()?.try_deserialize()?;

        overrides.apply(&mut config);
        config.validate()?;

        debug!(?config, "configuration resolved");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config =
            AggregationConfig::load_from(None, env(&[]), &ConfigOverrides::default()).unwrap();

        assert_eq!(config.workers, num_cpus::get());
        assert_eq!(config.strategy, DistributionStrategy::SharedQueue);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.malformed, MalformedPolicy::Skip);
    }

    #[test]
    fn test_environment_layer() {
        let config = AggregationConfig::load_from(
            None,
            env(&[
                ("STATION_STATS_WORKERS", "6"),
                ("STATION_STATS_STRATEGY", "chunked"),
                ("STATION_STATS_BATCH_SIZE", "250"),
            ]),
            &ConfigOverrides::default(),
        )
        .unwrap();

        assert_eq!(config.workers, 6);
        assert_eq!(config.strategy, DistributionStrategy::Chunked);
        assert_eq!(config.batch_size, 250);
    }

    #[test]
    fn test_file_then_environment_then_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "workers = 3").unwrap();
        writeln!(file, "queue_capacity = 16").unwrap();
        writeln!(file, "malformed = \"strict\"").unwrap();

        let overrides = ConfigOverrides {
            workers: Some(12),
            ..Default::default()
        };
        let config = AggregationConfig::load_from(
            Some(file.path()),
            env(&[("STATION_STATS_QUEUE_CAPACITY", "32")]),
            &overrides,
        )
        .unwrap();

        assert_eq!(config.workers, 12);
        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.malformed, MalformedPolicy::Strict);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let overrides = ConfigOverrides {
            workers: Some(0),
            ..Default::default()
        };
        let err = AggregationConfig::load_from(None, env(&[]), &overrides).unwrap_err();
        assert!(matches!(err, ProcessingError::Validation(_)));
    }
}
