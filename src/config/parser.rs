//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::TestConfig,
    types::OutputFormat,
};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<TestConfig> {
        let mut config = TestConfig::default();

        self.load_env_file()?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Load .env file if it exists
    fn load_env_file(&self) -> Result<()> {
        EnvManager::load_env_file(self.cli.debug)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut TestConfig) {
        if let Some(ref ip) = self.cli.ip {
            config.target_ip = Some(ip.trim().to_string());
        }

        if let Some(duration) = self.cli.duration {
            config.duration_seconds = Some(duration);
        }

        if let Some(port) = self.cli.port {
            config.target_port = port;
        }

        if let Some(threads) = self.cli.threads {
            config.thread_count = threads;
        }

        if let Some(packet_size) = self.cli.packet_size {
            config.packet_size = packet_size;
        }

        if let Some(ref log_file) = self.cli.log_file {
            config.log_file = Some(log_file.clone());
        }

        if let Some(timeout) = self.cli.shutdown_timeout {
            config.shutdown_timeout_seconds = timeout;
        }

        if let Some(interval) = self.cli.sample_interval {
            config.sample_interval_ms = interval;
        }

        if self.cli.no_color || self.cli.json {
            config.enable_color = false;
        }

        if self.cli.json {
            config.output_format = OutputFormat::Json;
        }

        config.skip_preflight = self.cli.skip_preflight;
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!(
                "Final config: target={}, duration={:?}, threads={}, packet_size={}",
                config.target_label(),
                config.duration_seconds,
                config.thread_count,
                config.packet_size
            );
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<TestConfig> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &TestConfig) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Target: {}", config.target_label()));
    summary.push(format!("Duration: {}s", config.duration().as_secs()));
    summary.push(format!("Workers: {}", config.thread_count));
    summary.push(format!("Packet Size: {} bytes", config.packet_size));
    summary.push(format!("Sample Interval: {}ms", config.sample_interval_ms));
    summary.push(format!("Shutdown Timeout: {}s", config.shutdown_timeout_seconds));
    summary.push(format!("Send Timeout: {}ms", config.send_timeout_ms));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));
    if let Some(ref log_file) = config.log_file {
        summary.push(format!("Log File: {}", log_file.display()));
    }

    summary.join("\n")
}
