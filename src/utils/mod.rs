pub mod cancellation;
pub mod constants;
pub mod logging;
pub mod progress;
pub mod rounding;

pub use cancellation::CancellationToken;
pub use constants::*;
pub use logging::init_logging;
pub use progress::ProgressReporter;
pub use rounding::{format_tenth, round_to_tenth};
