pub mod line_reader;
pub mod record_parser;

pub use line_reader::{LineBatch, LineReader};
pub use record_parser::{ParseError, RecordParser};
