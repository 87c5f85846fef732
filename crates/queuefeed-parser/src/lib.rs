// crates/queuefeed-parser/src/lib.rs

pub mod clean;
pub mod errors;
pub mod export;
pub mod frame;
pub mod model;
mod records;

pub use clean::clean_frame;
pub use errors::ParseError;
pub use export::encode_csv;
pub use frame::build_frame;
pub use model::{CleanReport, CleanedTable, Record, TableSchema, DEFAULT_METRIC_COLUMNS};
pub use records::parse_records;
