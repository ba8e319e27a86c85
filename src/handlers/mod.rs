// Handler modules
pub mod aggregate;
pub mod salt;

// Re-export all handler functions
pub use aggregate::{AggregateOptions, build_report, handle_aggregate};
pub use salt::handle_salt;
