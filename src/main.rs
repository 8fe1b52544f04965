//! UDP Traffic Tester - Main CLI Application
//!
//! Sends fixed-size UDP datagrams to a target from many concurrent workers
//! for a bounded duration, throttling itself when the host runs hot.

use clap::Parser;
use std::process;
use udp_traffic_tester::{app::App, cli::Cli, error::ErrorReporter, PKG_NAME, VERSION};

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    if cli.debug {
        eprintln!("{} v{}", PKG_NAME, VERSION);
    }

    if let Err(e) = App::new(cli).run().await {
        reporter.report_error(&e);
        process::exit(e.exit_code());
    }
}
