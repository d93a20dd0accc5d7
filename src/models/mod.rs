//! Data models for the path quality tester

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::Config;
pub use metrics::{MetricResult, MetricValues, RunReport};
