/// A single parsed `(station, value)` record.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub station: String,
    pub value: f64,
}

impl Measurement {
    pub fn new(station: impl Into<String>, value: f64) -> Self {
        Self {
            station: station.into(),
            value,
        }
    }
}
