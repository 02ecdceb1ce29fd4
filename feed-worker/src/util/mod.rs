//! Small shared utilities.

pub mod date;

pub use date::{parse_feed_date, ParsedDate};
