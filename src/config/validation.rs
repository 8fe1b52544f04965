//! Configuration validation utilities and rules
//!
//! `TestConfig::validate` is the hard gate; the checks here only produce
//! warnings about settings that are legal but probably not what the user wants.

use crate::{
    error::Result,
    executor::RatePolicy,
    models::TestConfig,
};
use colored::Colorize;
use std::net::IpAddr;

/// Largest UDP payload that fits a 1500-byte Ethernet frame over IPv4
pub const ETHERNET_IPV4_PAYLOAD: usize = 1472;

/// Largest UDP payload that fits a 1500-byte Ethernet frame over IPv6
pub const ETHERNET_IPV6_PAYLOAD: usize = 1452;

/// Configuration validator with advanced validation rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration and collect warnings
    pub fn validate_comprehensive(config: &TestConfig) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_target(config));
        warnings.extend(Self::validate_packet_size(config));
        warnings.extend(Self::validate_load_settings(config, num_cpus::get()));

        Ok(warnings)
    }

    /// Warn about addresses that are unusual targets for a traffic test
    fn validate_target(config: &TestConfig) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        let ip = match config.target_host().parse::<IpAddr>() {
            Ok(ip) => ip,
            Err(_) => {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Target '{}' is a host name and will be resolved before the run", config.target_host()),
                ));
                return warnings;
            }
        };

        if ip.is_unspecified() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Target {} is the unspecified address; sends will likely fail", ip),
            ));
        } else if ip.is_multicast() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Target {} is a multicast address", ip),
            ));
        } else if let IpAddr::V4(v4) = ip {
            if v4.is_broadcast() {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    "Target is the broadcast address; the socket is not broadcast-enabled".to_string(),
                ));
            }
        }

        if ip.is_loopback() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Target {} is loopback; traffic stays on this host", ip),
            ));
        } else if !Self::is_local_network(&ip) && !ip.is_unspecified() && !ip.is_multicast() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Target {} is outside private ranges; only test hosts you are authorized to load", ip),
            ));
        }

        warnings
    }

    /// Warn when datagrams will be fragmented on a standard Ethernet path
    fn validate_packet_size(config: &TestConfig) -> Vec<ValidationWarning> {
        let limit = match config.target_host().parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => ETHERNET_IPV6_PAYLOAD,
            _ => ETHERNET_IPV4_PAYLOAD,
        };

        if config.packet_size > limit {
            vec![ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Packet size {} exceeds {} bytes and will be IP-fragmented on a 1500-byte MTU path",
                    config.packet_size, limit
                ),
            )]
        } else {
            Vec::new()
        }
    }

    /// Warn about worker counts, long runs and the bandwidth-bound rate ceiling
    fn validate_load_settings(config: &TestConfig, cpu_cores: usize) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.thread_count > cpu_cores.max(1) * 50 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("{} workers on {} CPU cores will mostly contend for the same cores", config.thread_count, cpu_cores),
            ));
        }

        if let Some(secs) = config.duration_seconds {
            if secs > 3600 {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Long run of {}s; use Ctrl-C to stop early and still get a report", secs),
                ));
            }
        }

        let policy = RatePolicy::default();
        let max_rate = policy.max_rate(config.thread_count, config.packet_size);
        if max_rate < policy.default_max {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Per-worker rate capped at {} packets/sec to keep aggregate traffic under {} MB/s",
                    max_rate,
                    policy.aggregate_bytes_per_sec / 1_000_000
                ),
            ));
        }

        if config.sample_interval_ms < 250 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Sampling every {}ms adds measurable monitor overhead", config.sample_interval_ms),
            ));
        }

        warnings
    }

    fn is_local_network(ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local() || Self::is_documentation_v4(v4),
            // Unique local fc00::/7 or link local fe80::/10
            IpAddr::V6(v6) => {
                v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00 || (v6.segments()[0] & 0xffc0) == 0xfe80
            }
        }
    }

    /// TEST-NET-1/2/3 ranges
    fn is_documentation_v4(ip: &std::net::Ipv4Addr) -> bool {
        matches!(ip.octets(), [192, 0, 2, _] | [198, 51, 100, _] | [203, 0, 113, _])
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Get color for terminal display
    pub fn color(&self) -> &'static str {
        match self {
            Self::Info => "blue",
            Self::Warning => "yellow",
            Self::Error => "red",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    /// Create a new validation warning
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", tag.color(self.level.color()).bold(), self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &TestConfig) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
