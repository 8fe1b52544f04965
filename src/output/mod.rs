//! Output formatting and display system
//!
//! This module turns a finished [`RunReport`] or a live [`LiveStatus`] into
//! text: plain tables, colored tables, or JSON for scripts.

mod colored;
mod formatter;

pub use colored::{ColorScheme, ColoredFormatter, PerformanceLevel};
pub use formatter::{
    Alignment, Column, FormattingOptions, JsonFormatter, OutputFormatter, PlainFormatter, RowData, TableFormat,
};

use crate::{
    error::Result,
    models::{ResourceSample, RunReport, StatsSnapshot, TestConfig},
    runner::TestRunner,
    types::OutputFormat,
};
use serde::Serialize;
use std::time::Duration;

/// Point-in-time view of a running test, polled from the runner
#[derive(Debug, Clone, Serialize)]
pub struct LiveStatus {
    pub elapsed: Duration,
    pub snapshot: StatsSnapshot,
    pub sample: Option<ResourceSample>,
    pub rate_ceiling: u64,
    pub active_workers: usize,
    pub configured_workers: usize,
}

impl LiveStatus {
    /// Poll the runner; `None` until it has started
    pub async fn capture(runner: &TestRunner, configured_workers: usize) -> Option<Self> {
        let snapshot = runner.live_stats().await?;
        Some(Self {
            elapsed: runner.elapsed().await.unwrap_or_default(),
            snapshot,
            sample: runner.latest_sample().await,
            rate_ceiling: runner.rate_ceiling().await.unwrap_or_default(),
            active_workers: runner.active_workers().await.unwrap_or_default(),
            configured_workers,
        })
    }

    /// Average send rate since start
    pub fn packets_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.snapshot.packets_sent as f64 / secs
        }
    }

    /// Uncolored single-line rendering
    pub fn describe(&self) -> String {
        let load = match self.sample {
            Some(sample) => format!("cpu {:.0}% mem {:.0}%", sample.cpu_percent, sample.memory_percent),
            None => "cpu -- mem --".to_string(),
        };
        format!(
            "[{:>5.1}s] {} sent  {:.0} pps  {:.1}% ok  {}  ceiling {}  workers {}/{}",
            self.elapsed.as_secs_f64(),
            formatter::format_count(self.snapshot.packets_sent),
            self.packets_per_second(),
            self.snapshot.success_rate(),
            load,
            formatter::format_count(self.rate_ceiling),
            self.active_workers,
            self.configured_workers
        )
    }
}

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..Default::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create the formatter a run configuration asks for
    pub fn for_config(config: &TestConfig) -> Box<dyn OutputFormatter> {
        match config.output_format {
            OutputFormat::Json => Box::new(JsonFormatter::new(true)),
            OutputFormat::Table => Self::create_formatter(config.enable_color, config.verbose || config.debug),
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, true)
    }
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
    live_updates: bool,
}

impl OutputCoordinator {
    /// Create a new output coordinator with the specified formatter
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self {
            formatter,
            live_updates: true,
        }
    }

    /// Coordinator for a run; JSON output suppresses live status lines
    pub fn for_config(config: &TestConfig) -> Self {
        Self {
            formatter: OutputFormatterFactory::for_config(config),
            live_updates: config.output_format != OutputFormat::Json,
        }
    }

    /// Whether the caller should poll and print live status lines
    pub fn live_updates(&self) -> bool {
        self.live_updates
    }

    /// Display the final report
    pub fn display_report(&self, report: &RunReport) -> Result<String> {
        self.formatter.format_report(report)
    }

    /// Display one live status line
    pub fn display_status(&self, status: &LiveStatus) -> Result<String> {
        self.formatter.format_status(status)
    }

    pub fn display_warning(&self, warning: &str) -> Result<String> {
        self.formatter.format_warning(warning)
    }

    pub fn display_header(&self, title: &str) -> Result<String> {
        self.formatter.format_header(title)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    pub(crate) fn sample_report() -> RunReport {
        RunReport {
            target: "127.0.0.1:9999".to_string(),
            resolved_target: "127.0.0.1:9999".to_string(),
            packet_size: 512,
            packets_sent: 1_000,
            bytes_sent: 950 * 512,
            successes: 950,
            failures: 50,
            success_rate: 95.0,
            avg_latency: Duration::from_micros(40),
            max_latency: Duration::from_millis(3),
            elapsed: Duration::from_secs(2),
            packets_per_second: 500.0,
            configured_workers: 4,
            active_workers_at_end: 4,
            failed_workers: 0,
            abandoned_workers: 0,
            force_stopped: false,
            cancelled: false,
            sampling_failures: 0,
            peak_cpu_percent: Some(12.5),
            peak_memory_percent: Some(48.0),
            final_rate_ceiling: 30_517,
            failure_breakdown: BTreeMap::from([("timeout".to_string(), 50)]),
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_live_status_describe() {
        let status = LiveStatus {
            elapsed: Duration::from_millis(1500),
            snapshot: StatsSnapshot {
                packets_sent: 3_000,
                successes: 3_000,
                ..Default::default()
            },
            sample: None,
            rate_ceiling: 50_000,
            active_workers: 2,
            configured_workers: 2,
        };

        assert_eq!(status.packets_per_second(), 2_000.0);
        let line = status.describe();
        assert!(line.starts_with("[  1.5s] 3,000 sent  2000 pps  100.0% ok"));
        assert!(line.contains("ceiling 50,000"));
    }

    #[test]
    fn test_factory_selects_formatter() {
        let mut config = TestConfig::for_target("127.0.0.1", 9999, 1);
        config.output_format = OutputFormat::Json;
        let coordinator = OutputCoordinator::for_config(&config);
        assert!(!coordinator.live_updates());

        let json = coordinator.display_report(&sample_report()).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&json).is_ok());

        config.output_format = OutputFormat::Table;
        config.enable_color = false;
        let coordinator = OutputCoordinator::for_config(&config);
        assert!(coordinator.live_updates());
        assert!(coordinator.display_report(&sample_report()).unwrap().contains("Packets sent"));
    }

    #[tokio::test]
    async fn test_capture_before_start_is_none() {
        let runner = TestRunner::new(crate::logging::EngineLogger::quiet());
        assert!(LiveStatus::capture(&runner, 4).await.is_none());
    }
}
