use std::collections::HashMap;

use crate::models::Measurement;
use crate::utils::rounding::round_to_tenth;

/// Mapping from station name to its running aggregate.
///
/// Used both for a worker's private partition and for the merged global
/// result; ownership moves from worker to coordinator in one piece.
pub type StationMap = HashMap<String, StationAccumulator>;

/// Running `{min, max, sum, count}` summary for one station.
///
/// Only constructed from a first observation, so `count >= 1` and
/// `min <= max` hold for every live value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationAccumulator {
    min: f64,
    max: f64,
    sum: f64,
    count: u64,
}

impl StationAccumulator {
    pub fn new(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            sum: value,
            count: 1,
        }
    }

    /// Fold one more measurement into the aggregate.
    #[inline]
    pub fn observe(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    /// Combine another station aggregate into this one.
    #[inline]
    pub fn merge(&mut self, other: &StationAccumulator) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn merged(a: &StationAccumulator, b: &StationAccumulator) -> StationAccumulator {
        let mut result = *a;
        result.merge(b);
        result
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean rounded to one decimal place, half away from zero.
    pub fn mean(&self) -> f64 {
        round_to_tenth(self.sum / self.count as f64)
    }
}

/// Record a measurement in `map`, creating the station on first sight.
pub fn observe_into(map: &mut StationMap, measurement: Measurement) {
    match map.get_mut(measurement.station.as_str()) {
        Some(acc) => acc.observe(measurement.value),
        None => {
            map.insert(
                measurement.station,
                StationAccumulator::new(measurement.value),
            );
        }
    }
}

/// Merge every station of `from` into `into`, consuming `from`.
pub fn merge_maps(into: &mut StationMap, from: StationMap) {
    for (station, acc) in from {
        match into.get_mut(station.as_str()) {
            Some(existing) => existing.merge(&acc),
            None => {
                into.insert(station, acc);
            }
        }
    }
}
