use crate::models::Measurement;
use crate::utils::constants::RECORD_DELIMITER;
use thiserror::Error;

/// Why a line could not be turned into a [`Measurement`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing ';' delimiter")]
    MissingDelimiter,

    #[error("empty station name")]
    EmptyStation,

    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid measurement: '{text}'")]
    InvalidMeasurement { text: String },

    #[error("measurement is not finite: '{text}'")]
    NonFiniteMeasurement { text: String },
}

/// Turns one raw `<station>;<measurement>` line into a [`Measurement`].
#[derive(Debug, Clone, Copy)]
pub struct RecordParser {
    delimiter: u8,
}

impl RecordParser {
    pub fn new() -> Self {
        Self {
            delimiter: RECORD_DELIMITER,
        }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Parse a line with its terminator already stripped.
    ///
    /// The line is split at the first delimiter; anything after it must be a
    /// finite decimal number.
    pub fn parse(&self, line: &[u8]) -> Result<Measurement, ParseError> {
        let split = line
            .iter()
            .position(|&b| b == self.delimiter)
            .ok_or(ParseError::MissingDelimiter)?;

        let (station, rest) = line.split_at(split);
        let value_text = &rest[1..];

        if station.is_empty() {
            return Err(ParseError::EmptyStation);
        }

        let station = std::str::from_utf8(station).map_err(|_| ParseError::InvalidUtf8)?;
        let value_text = std::str::from_utf8(value_text).map_err(|_| ParseError::InvalidUtf8)?;

        let value = value_text
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidMeasurement {
                text: value_text.to_string(),
            })?;

        if !value.is_finite() {
            return Err(ParseError::NonFiniteMeasurement {
                text: value_text.to_string(),
            });
        }

        Ok(Measurement::new(station, value))
    }
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_line() {
        let parser = RecordParser::new();

        let record = parser.parse(b"Hamburg;12.0").unwrap();
        assert_eq!(record.station, "Hamburg");
        assert_eq!(record.value, 12.0);

        let record = parser.parse(b"St. John's;-15.2").unwrap();
        assert_eq!(record.station, "St. John's");
        assert_eq!(record.value, -15.2);

        let record = parser.parse(b"Bulawayo;+8").unwrap();
        assert_eq!(record.value, 8.0);
    }

    #[test]
    fn test_parse_keeps_utf8_station_names() {
        let parser = RecordParser::new();
        let record = parser.parse("İzmir;21.75".as_bytes()).unwrap();
        assert_eq!(record.station, "İzmir");
        assert_eq!(record.value, 21.75);
    }

    #[test]
    fn test_malformed_lines() {
        let parser = RecordParser::new();

        assert_eq!(parser.parse(b"Hamburg 12.0"), Err(ParseError::MissingDelimiter));
        assert_eq!(parser.parse(b";12.0"), Err(ParseError::EmptyStation));
        assert_eq!(
            parser.parse(b"Hamburg;warm"),
            Err(ParseError::InvalidMeasurement {
                text: "warm".to_string()
            })
        );
        assert_eq!(
            parser.parse(b"Hamburg;"),
            Err(ParseError::InvalidMeasurement {
                text: String::new()
            })
        );
        assert_eq!(
            parser.parse(b"Hamburg;1.0;2.0"),
            Err(ParseError::InvalidMeasurement {
                text: "1.0;2.0".to_string()
            })
        );
        assert_eq!(
            parser.parse(b"Hamburg;NaN"),
            Err(ParseError::NonFiniteMeasurement {
                text: "NaN".to_string()
            })
        );
        assert_eq!(parser.parse(b"Ham\xffburg;1.0"), Err(ParseError::InvalidUtf8));
    }

    #[test]
    fn test_custom_delimiter() {
        let parser = RecordParser::with_delimiter(b',');
        let record = parser.parse(b"Oslo,3.5").unwrap();
        assert_eq!(record.station, "Oslo");
        assert!(parser.parse(b"Oslo;3.5").is_err());
    }
}
