//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

/// UDP Traffic Tester - sends fixed-size UDP datagrams to a target from many workers
#[derive(Parser, Debug, Clone)]
#[command(name = "udp-traffic-tester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Target IP address or host name (or TARGET_IP)
    #[arg(long, value_name = "ADDR")]
    pub ip: Option<String>,

    /// Target UDP port [default: 80] (or TARGET_PORT)
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Test duration in seconds (or TEST_DURATION)
    #[arg(long, value_name = "SECS", value_parser = parse_duration)]
    pub duration: Option<u64>,

    /// Number of concurrent send workers [default: 10] (or THREAD_COUNT)
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Datagram size in bytes [default: 1024] (or PACKET_SIZE)
    #[arg(long, value_name = "BYTES")]
    pub packet_size: Option<usize>,

    /// Seconds to wait for workers after the stop signal
    #[arg(long, value_name = "SECS")]
    pub shutdown_timeout: Option<u64>,

    /// Resource sampling interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub sample_interval: Option<u64>,

    /// Also append log entries to this file (or LOG_FILE)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Skip the reachability check before sending
    #[arg(long)]
    pub skip_preflight: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        !self.no_color && !self.json && supports_color()
    }
}

/// Parse duration from seconds string
fn parse_duration(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
