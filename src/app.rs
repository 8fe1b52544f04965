//! Main application orchestration and execution

use crate::{
    cli::Cli,
    config::{display_config_summary, load_config, validate_config},
    diagnostics::NetworkDiagnostics,
    error::Result,
    logging::LoggerFactory,
    models::{RunReport, TestConfig},
    output::{LiveStatus, OutputCoordinator},
    runner::TestRunner,
    types::OutputFormat,
};
use std::time::Duration;

/// Interval between live status lines
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the application
    pub async fn run(self) -> Result<RunReport> {
        let config = load_config(self.cli.clone())?;
        let warnings = validate_config(&config)?;
        let coordinator = OutputCoordinator::for_config(&config);

        // Keep stdout clean for the JSON document
        let json = config.output_format == OutputFormat::Json;
        let say = |line: String| {
            if json {
                eprintln!("{}", line);
            } else {
                println!("{}", line);
            }
        };

        if !json {
            say(coordinator.display_header(&format!("UDP Traffic Tester v{}", crate::VERSION))?);
        }

        if config.debug {
            say(format!("Configuration Summary:\n{}", display_config_summary(&config)));
        }

        for warning in &warnings {
            eprintln!("{}", warning.format(config.enable_color));
        }

        if !config.skip_preflight {
            self.preflight(&config, &coordinator).await?;
        }

        let factory = LoggerFactory::new(config.clone())?;
        if let Some(path) = factory.log_file() {
            say(format!("Appending log entries to {}", path.display()));
        }
        let runner = TestRunner::new(factory.create_engine_logger().await);

        say(format!(
            "Sending {}-byte datagrams to {} from {} workers for {}s (Ctrl-C to stop early)",
            config.packet_size,
            config.target_label(),
            config.thread_count,
            config.duration().as_secs()
        ));

        let report = Self::drive(&runner, &config, &coordinator).await?;

        println!("{}", coordinator.display_report(&report)?);
        Ok(report)
    }

    /// Reachability probe; only resolution failures are fatal
    async fn preflight(&self, config: &TestConfig, coordinator: &OutputCoordinator) -> Result<()> {
        let report = NetworkDiagnostics::default().preflight(config).await?;

        if config.output_format != OutputFormat::Json {
            println!("{}", report.format_summary(config.enable_color));
        }

        if !report.status.reachable {
            eprintln!(
                "{}",
                coordinator.display_warning(&format!(
                    "Target {} did not answer a TCP probe; continuing with UDP anyway",
                    report.target
                ))?
            );
        }

        Ok(())
    }

    /// Start the run, print live status lines and wait for the report
    async fn drive(runner: &TestRunner, config: &TestConfig, coordinator: &OutputCoordinator) -> Result<RunReport> {
        runner.start(config.clone()).await?;

        let mut ticker = tokio::time::interval(STATUS_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        let wait = runner.wait();
        tokio::pin!(wait);
        let mut interrupted = false;

        loop {
            tokio::select! {
                report = &mut wait => return report,
                signal = tokio::signal::ctrl_c(), if !interrupted => {
                    interrupted = true;
                    if signal.is_ok() {
                        eprintln!("{}", coordinator.display_warning("Interrupted; stopping workers")?);
                        runner.cancel().await;
                    }
                }
                _ = ticker.tick(), if coordinator.live_updates() => {
                    if let Some(status) = LiveStatus::capture(runner, config.thread_count).await {
                        println!("{}", coordinator.display_status(&status)?);
                    }
                }
            }
        }
    }
}
