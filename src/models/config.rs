//! Test configuration data model and validation

use crate::types::{AppError, OutputFormat, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Main test configuration
///
/// Immutable once a run starts. Built from defaults, `.env`, environment
/// variables and CLI flags (in that order of precedence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    /// Target IP address or host name
    #[serde(default)]
    pub target_ip: Option<String>,

    /// Target UDP port
    #[serde(default = "default_port")]
    pub target_port: u16,

    /// Test duration in seconds
    #[serde(default)]
    pub duration_seconds: Option<u64>,

    /// Number of concurrent send workers
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,

    /// Size of every datagram in bytes
    #[serde(default = "default_packet_size")]
    pub packet_size: usize,

    /// Resource sampling interval in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// How long to wait for workers after the stop signal
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_seconds: u64,

    /// Per-send timeout in milliseconds
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Report output format
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Skip the reachability probe before the run
    #[serde(default)]
    pub skip_preflight: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,

    /// Append log entries to this file as well as the console
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            target_ip: None,
            target_port: default_port(),
            duration_seconds: None,
            thread_count: default_thread_count(),
            packet_size: default_packet_size(),
            sample_interval_ms: default_sample_interval_ms(),
            shutdown_timeout_seconds: default_shutdown_timeout_secs(),
            send_timeout_ms: default_send_timeout_ms(),
            output_format: default_output_format(),
            enable_color: default_enable_color(),
            skip_preflight: false,
            verbose: false,
            debug: false,
            log_file: None,
        }
    }
}

impl TestConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for programmatic runs
    pub fn for_target<S: Into<String>>(target: S, port: u16, duration_seconds: u64) -> Self {
        Self {
            target_ip: Some(target.into()),
            target_port: port,
            duration_seconds: Some(duration_seconds),
            ..Self::default()
        }
    }

    /// Test duration; zero when unset (rejected by `validate`)
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds.unwrap_or(0))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Target host as given, or an empty string when unset
    pub fn target_host(&self) -> &str {
        self.target_ip.as_deref().unwrap_or("")
    }

    /// "host:port" for display and resolution
    pub fn target_label(&self) -> String {
        match self.target_host().parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.target_port),
            _ => format!("{}:{}", self.target_host(), self.target_port),
        }
    }

    /// Literal socket address when the target is an IP, `None` for host names
    pub fn literal_target(&self) -> Option<SocketAddr> {
        self.target_host()
            .parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, self.target_port))
    }

    /// Validate the configuration and return the first error
    pub fn validate(&self) -> Result<()> {
        let target = self.target_host().trim();
        if target.is_empty() {
            return Err(AppError::config("Target IP is required (use --ip or TARGET_IP)"));
        }

        if target.chars().any(char::is_whitespace) {
            return Err(AppError::config(format!("Invalid target address '{}'", target)));
        }

        if self.target_port == 0 {
            return Err(AppError::config("Target port must be between 1 and 65535"));
        }

        match self.duration_seconds {
            None => return Err(AppError::config("Duration is required (use --duration or TEST_DURATION)")),
            Some(0) => return Err(AppError::config("Duration must be greater than 0")),
            Some(secs) if secs > crate::defaults::MAX_DURATION_SECS => {
                return Err(AppError::config(format!(
                    "Duration cannot exceed {} seconds",
                    crate::defaults::MAX_DURATION_SECS
                )));
            }
            Some(_) => {}
        }

        if self.thread_count == 0 {
            return Err(AppError::config("Thread count must be at least 1"));
        }

        if self.thread_count > crate::defaults::MAX_THREAD_COUNT {
            return Err(AppError::config(format!(
                "Thread count cannot exceed {}",
                crate::defaults::MAX_THREAD_COUNT
            )));
        }

        if self.packet_size == 0 {
            return Err(AppError::config("Packet size must be at least 1 byte"));
        }

        if self.packet_size > crate::defaults::MAX_PACKET_SIZE {
            return Err(AppError::config(format!(
                "Packet size cannot exceed {} bytes (maximum UDP payload)",
                crate::defaults::MAX_PACKET_SIZE
            )));
        }

        if !(100..=5000).contains(&self.sample_interval_ms) {
            return Err(AppError::config("Sample interval must be between 100 and 5000 ms"));
        }

        if self.shutdown_timeout_seconds == 0 || self.shutdown_timeout_seconds > 60 {
            return Err(AppError::config("Shutdown timeout must be between 1 and 60 seconds"));
        }

        if self.send_timeout_ms == 0 {
            return Err(AppError::config("Send timeout must be greater than 0"));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(target_ip) = std::env::var("TARGET_IP") {
            let target_ip = target_ip.trim();
            if !target_ip.is_empty() {
                self.target_ip = Some(target_ip.to_string());
            }
        }

        if let Ok(port) = std::env::var("TARGET_PORT") {
            self.target_port = port.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid TARGET_PORT value '{}': {}", port, e)))?;
        }

        if let Ok(duration) = std::env::var("TEST_DURATION") {
            self.duration_seconds = Some(duration.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid TEST_DURATION value '{}': {}", duration, e)))?);
        }

        if let Ok(threads) = std::env::var("THREAD_COUNT") {
            self.thread_count = threads.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid THREAD_COUNT value '{}': {}", threads, e)))?;
        }

        if let Ok(packet_size) = std::env::var("PACKET_SIZE") {
            self.packet_size = packet_size.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PACKET_SIZE value '{}': {}", packet_size, e)))?;
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        if let Ok(timeout) = std::env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.shutdown_timeout_seconds = timeout.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid SHUTDOWN_TIMEOUT_SECONDS value '{}': {}", timeout, e)))?;
        }

        if let Ok(interval) = std::env::var("SAMPLE_INTERVAL_MS") {
            self.sample_interval_ms = interval.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid SAMPLE_INTERVAL_MS value '{}': {}", interval, e)))?;
        }

        if let Ok(log_file) = std::env::var("LOG_FILE") {
            let log_file = log_file.trim();
            if !log_file.is_empty() {
                self.log_file = Some(PathBuf::from(log_file));
            }
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_port() -> u16 {
    crate::defaults::DEFAULT_PORT
}

fn default_thread_count() -> usize {
    crate::defaults::DEFAULT_THREAD_COUNT
}

fn default_packet_size() -> usize {
    crate::defaults::DEFAULT_PACKET_SIZE
}

fn default_sample_interval_ms() -> u64 {
    crate::defaults::DEFAULT_SAMPLE_INTERVAL.as_millis() as u64
}

fn default_shutdown_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_SHUTDOWN_TIMEOUT.as_secs()
}

fn default_send_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_SEND_TIMEOUT.as_millis() as u64
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Table
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> TestConfig {
        TestConfig::for_target("198.51.100.1", 9999, 2)
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_default_config_requires_target() {
        let config = TestConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Target IP is required"));
    }

    #[test]
    fn test_missing_duration_invalid() {
        let mut config = valid_config();
        config.duration_seconds = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_values_invalid() {
        let mut config = valid_config();
        config.duration_seconds = Some(0);
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.thread_count = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.packet_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.target_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_upper_bounds() {
        let mut config = valid_config();
        config.thread_count = crate::defaults::MAX_THREAD_COUNT;
        config.packet_size = crate::defaults::MAX_PACKET_SIZE;
        assert!(config.validate().is_ok());

        config.thread_count += 1;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.packet_size = crate::defaults::MAX_PACKET_SIZE + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_label_and_literal() {
        let config = valid_config();
        assert_eq!(config.target_label(), "198.51.100.1:9999");
        assert_eq!(config.literal_target(), Some("198.51.100.1:9999".parse().unwrap()));

        let v6 = TestConfig::for_target("::1", 53, 1);
        assert_eq!(v6.target_label(), "[::1]:53");

        let host = TestConfig::for_target("localhost", 53, 1);
        assert!(host.literal_target().is_none());
        assert_eq!(host.target_label(), "localhost:53");
    }

    #[test]
    fn test_durations() {
        let config = valid_config();
        assert_eq!(config.duration(), Duration::from_secs(2));
        assert_eq!(config.send_timeout(), crate::defaults::DEFAULT_SEND_TIMEOUT);
        assert_eq!(config.shutdown_timeout(), crate::defaults::DEFAULT_SHUTDOWN_TIMEOUT);
    }

    #[test]
    fn test_serde_defaults() {
        let config: TestConfig = serde_json::from_str(r#"{"target_ip":"10.0.0.1","duration_seconds":3}"#).unwrap();
        assert_eq!(config.target_port, crate::defaults::DEFAULT_PORT);
        assert_eq!(config.thread_count, crate::defaults::DEFAULT_THREAD_COUNT);
        assert_eq!(config.packet_size, crate::defaults::DEFAULT_PACKET_SIZE);
        assert!(config.validate().is_ok());
    }
}
