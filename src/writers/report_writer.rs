use crate::error::Result;
use crate::models::{StationAccumulator, StationMap};
use crate::utils::constants::REPORT_SEPARATOR;
use crate::utils::rounding::format_tenth;
use std::io::Write;

/// Renders the merged station map as a single line.
///
/// Stations are ordered by raw byte value, each written as
/// `name=min/mean/max` with one decimal digit.
pub struct ReportWriter {
    separator: String,
}

impl ReportWriter {
    pub fn new() -> Self {
        Self {
            separator: REPORT_SEPARATOR.to_string(),
        }
    }

    pub fn with_separator(separator: &str) -> Self {
        Self {
            separator: separator.to_string(),
        }
    }

    pub fn format_station(name: &str, acc: &StationAccumulator) -> String {
        format!(
            "{}={}/{}/{}",
            name,
            format_tenth(acc.min()),
            format_tenth(acc.mean()),
            format_tenth(acc.max())
        )
    }

    pub fn format_report(&self, stations: &StationMap) -> String {
        let mut names: Vec<&String> = stations.keys().collect();
        names.sort_unstable_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

        names
            .into_iter()
            .map(|name| Self::format_station(name, &stations[name]))
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    /// Write the report without a trailing newline and flush.
    pub fn write_report<W: Write>(&self, out: &mut W, stations: &StationMap) -> Result<()> {
        out.write_all(self.format_report(stations).as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new()
    }
}
