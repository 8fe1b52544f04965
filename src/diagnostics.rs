//! Pre-flight diagnostics
//!
//! Before a run the target is resolved and probed with a short TCP connect.
//! UDP has no handshake, so the probe is advisory only: an unreachable result
//! is reported as a warning and never stops the run.

use crate::{
    error::Result,
    models::TestConfig,
    monitor::HostInfo,
};
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Default timeout for the reachability probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of one reachability probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityStatus {
    /// Whether the target accepted a TCP connection
    pub reachable: bool,
    /// Connect time when reachable
    pub response_time: Option<Duration>,
    /// Error description when unreachable
    pub error_message: Option<String>,
    /// When the probe ran
    pub tested_at: DateTime<Utc>,
}

/// Everything learned before the run starts
#[derive(Debug, Clone)]
pub struct PreflightReport {
    pub target: String,
    pub resolved: Vec<SocketAddr>,
    pub status: ConnectivityStatus,
    pub host: HostInfo,
}

impl PreflightReport {
    /// Human-readable summary
    pub fn format_summary(&self, use_color: bool) -> String {
        let mut lines = Vec::new();

        let resolved = if self.resolved.is_empty() {
            "unresolved".to_string()
        } else {
            self.resolved.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
        };
        lines.push(format!("Target: {} ({})", self.target, resolved));

        let state = match (self.status.reachable, self.status.response_time) {
            (true, Some(rtt)) => format!("reachable, TCP connect in {:.1}ms", rtt.as_secs_f64() * 1000.0),
            (true, None) => "reachable".to_string(),
            (false, _) => format!(
                "no TCP answer ({}); UDP may still be delivered",
                self.status.error_message.as_deref().unwrap_or("unknown error")
            ),
        };
        let state = if !use_color {
            state
        } else if self.status.reachable {
            state.green().to_string()
        } else {
            state.yellow().to_string()
        };
        lines.push(format!("Probe: {}", state));

        let memory = self
            .host
            .total_memory
            .map(|bytes| format!("{:.1} GiB", bytes as f64 / 1024.0 / 1024.0 / 1024.0))
            .unwrap_or_else(|| "unknown".to_string());
        lines.push(format!("Host: {} CPU cores, {} memory", self.host.cpu_cores, memory));

        lines.join("\n")
    }
}

/// Runs the pre-flight reachability probe
pub struct NetworkDiagnostics {
    probe_timeout: Duration,
}

impl NetworkDiagnostics {
    pub fn new(probe_timeout: Duration) -> Self {
        Self { probe_timeout }
    }

    /// Resolve and probe the configured target
    ///
    /// Resolution failures are returned as errors; an unreachable target is not.
    pub async fn preflight(&self, config: &TestConfig) -> Result<PreflightReport> {
        let resolved = self.resolve(config).await?;
        let status = match resolved.first() {
            Some(addr) => self.probe(*addr).await,
            None => ConnectivityStatus {
                reachable: false,
                response_time: None,
                error_message: Some("no addresses".to_string()),
                tested_at: Utc::now(),
            },
        };

        Ok(PreflightReport {
            target: config.target_label(),
            resolved,
            status,
            host: HostInfo::detect(),
        })
    }

    async fn resolve(&self, config: &TestConfig) -> Result<Vec<SocketAddr>> {
        if let Some(addr) = config.literal_target() {
            return Ok(vec![addr]);
        }

        let addrs = tokio::net::lookup_host((config.target_host(), config.target_port))
            .await
            .map_err(|e| crate::error::AppError::dns_resolution(format!("Cannot resolve {}: {}", config.target_label(), e)))?;
        Ok(addrs.collect())
    }

    /// TCP connect with a timeout; a refusal still proves the host is up
    pub async fn probe(&self, addr: SocketAddr) -> ConnectivityStatus {
        let start_time = Instant::now();

        match tokio::time::timeout(self.probe_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => ConnectivityStatus {
                reachable: true,
                response_time: Some(start_time.elapsed()),
                error_message: None,
                tested_at: Utc::now(),
            },
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => ConnectivityStatus {
                reachable: true,
                response_time: Some(start_time.elapsed()),
                error_message: Some(format!("port {} closed for TCP", addr.port())),
                tested_at: Utc::now(),
            },
            Ok(Err(e)) => ConnectivityStatus {
                reachable: false,
                response_time: None,
                error_message: Some(e.to_string()),
                tested_at: Utc::now(),
            },
            Err(_) => ConnectivityStatus {
                reachable: false,
                response_time: None,
                error_message: Some(format!("timed out after {}s", self.probe_timeout.as_secs())),
                tested_at: Utc::now(),
            },
        }
    }
}

impl Default for NetworkDiagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_reachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let status = NetworkDiagnostics::default().probe(addr).await;
        assert!(status.reachable);
        assert!(status.response_time.is_some());
        assert!(status.error_message.is_none());
    }

    #[tokio::test]
    async fn test_refused_port_counts_as_reachable_host() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let status = NetworkDiagnostics::default().probe(addr).await;
        assert!(status.reachable);
        assert!(status.error_message.unwrap().contains("closed"));
    }

    #[tokio::test]
    async fn test_preflight_literal_target() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = TestConfig::for_target("127.0.0.1", port, 1);

        let report = NetworkDiagnostics::default().preflight(&config).await.unwrap();
        assert_eq!(report.resolved.len(), 1);
        assert!(report.status.reachable);

        let summary = report.format_summary(false);
        assert!(summary.contains(&format!("Target: 127.0.0.1:{}", port)));
        assert!(summary.contains("reachable"));
        assert!(summary.contains("CPU cores"));
    }

    #[tokio::test]
    async fn test_preflight_unresolvable_host() {
        let config = TestConfig::for_target("no-such-host.invalid", 9, 1);
        let err = NetworkDiagnostics::default().preflight(&config).await.unwrap_err();
        assert_eq!(err.category(), "DNS");
    }
}
