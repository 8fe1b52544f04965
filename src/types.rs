//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::io;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Lifecycle of a [`TestRunner`](crate::runner::TestRunner)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Created, not started yet
    Idle,
    /// Workers and monitor are active
    Running,
    /// Stop signal sent, waiting for workers to drain
    Stopping,
    /// Report built; terminal
    Completed,
}

impl RunState {
    /// Get a short human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Stopping => "stopping",
            RunState::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// Machine-readable JSON
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(AppError::parse(format!("Invalid output format: {}", s))),
        }
    }
}

/// Classification of a failed send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The send did not complete within the per-send timeout
    Timeout,
    /// The socket buffer was full
    WouldBlock,
    /// No route to the target network or host
    Unreachable,
    /// The target actively refused (ICMP port unreachable surfaced on the socket)
    Refused,
    /// Anything else
    Other,
}

impl FailureKind {
    /// All kinds, in counter-slot order
    pub const ALL: [FailureKind; 5] = [
        FailureKind::Timeout,
        FailureKind::WouldBlock,
        FailureKind::Unreachable,
        FailureKind::Refused,
        FailureKind::Other,
    ];

    /// Classify a transport error
    pub fn from_io_error(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::TimedOut => FailureKind::Timeout,
            io::ErrorKind::WouldBlock => FailureKind::WouldBlock,
            io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => FailureKind::Refused,
            io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::AddrNotAvailable => FailureKind::Unreachable,
            _ => FailureKind::Other,
        }
    }

    /// Counter slot index
    pub fn index(&self) -> usize {
        match self {
            FailureKind::Timeout => 0,
            FailureKind::WouldBlock => 1,
            FailureKind::Unreachable => 2,
            FailureKind::Refused => 3,
            FailureKind::Other => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::WouldBlock => "would_block",
            FailureKind::Unreachable => "unreachable",
            FailureKind::Refused => "refused",
            FailureKind::Other => "other",
        }
    }
}

/// Host load classification used for display and rate decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadLevel {
    /// Below the low-water marks; workers may ramp up
    Low,
    /// Between low-water and high thresholds; ceiling holds
    Moderate,
    /// At or above a high threshold; workers back off
    High,
}
