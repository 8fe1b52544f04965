//! Data models and structures for the UDP traffic tester

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::TestConfig;
pub use metrics::{ResourceSample, RunReport, StatsSnapshot};
