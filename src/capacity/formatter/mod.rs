//! Output formatting for capacity reports.
//!
//! Supports multiple output formats: table, JSON, YAML, and CSV.

mod output;

pub use output::{OutputFormat, format_report, format_report_to_string};
