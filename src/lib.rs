//! UDP Traffic Tester
//!
//! A rate-adaptive, multi-worker UDP traffic generator. Workers send
//! fixed-size datagrams to one target for a bounded duration while a
//! background monitor samples host CPU and memory and lowers the per-worker
//! send-rate ceiling when the host is under pressure.

pub mod app;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod output;
pub mod runner;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{ResourceSample, RunReport, StatsSnapshot, TestConfig};
pub use stats::StatsAggregator;
pub use monitor::{ResourceMonitor, ResourceProbe, SysinfoProbe};
pub use executor::{PacketSink, RateController, RatePolicy, SocketFactory, UdpSocketFactory, WorkerPool};
pub use runner::TestRunner;
pub use diagnostics::{ConnectivityStatus, NetworkDiagnostics, PreflightReport};
pub use output::{ColoredFormatter, OutputCoordinator, OutputFormatter, OutputFormatterFactory, PlainFormatter};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_PORT: u16 = 80;
    pub const DEFAULT_THREAD_COUNT: usize = 10;
    pub const DEFAULT_PACKET_SIZE: usize = 1024;
    pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    /// One day
    pub const MAX_DURATION_SECS: u64 = 86_400;
    pub const MAX_THREAD_COUNT: usize = 500;
    /// Largest UDP payload over IPv4
    pub const MAX_PACKET_SIZE: usize = 65_507;
}
