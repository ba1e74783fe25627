pub mod accumulator;
pub mod measurement;

pub use accumulator::{merge_maps, observe_into, StationAccumulator, StationMap};
pub use measurement::Measurement;
