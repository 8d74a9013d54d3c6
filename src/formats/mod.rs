//! Text formats that can be converted into indexed files.
//!
//! - [`bed`] - BED3 through BED12 feature files

pub mod bed;

pub use bed::{BedRecord, FormatOptions, FormatSummary, format_bed, read_bed};
