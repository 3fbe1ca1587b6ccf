//! OpenAPI route locator binary.
//!
//! Loads the configuration, wires the locator and runs the refresh loop until
//! Ctrl-C. With `--once` it runs a single cycle and prints the snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use openapi_route_locator::config::load_config;
use openapi_route_locator::lifecycle::{build_locator_with, signals, Extensions, Shutdown};
use openapi_route_locator::observability::{logging, metrics, MetricsSink, PrometheusMetrics};

#[derive(Parser)]
#[command(name = "openapi-route-locator")]
#[command(about = "Derive gateway routes from backend OpenAPI documents", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "locator.toml")]
    config: PathBuf,

    /// Run one refresh cycle, print the snapshot as JSON and exit
    #[arg(long)]
    once: bool,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init_logging(cli.log_level.as_deref().unwrap_or(&config.observability.log_level));

    tracing::info!(
        config = %cli.config.display(),
        services = config.services.len(),
        "openapi-route-locator v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let mut extensions = Extensions::default();
    if config.observability.metrics_enabled && !cli.once {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                metrics::init_metrics(addr)?;
                extensions.metrics = Some(Arc::new(PrometheusMetrics) as Arc<dyn MetricsSink>);
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let components = build_locator_with(&config, extensions)?;

    if cli.once {
        let report = components.refresher.run_cycle().await;
        let snapshot = components.locator.current_routes();
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        if report.failed() > 0 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let shutdown = Shutdown::new();
    let signal_task = tokio::spawn(signals::handle_signals(
        components.refresher.handle(),
        shutdown.clone(),
    ));

    components.refresher.run(shutdown.subscribe()).await;

    shutdown.trigger();
    if let Ok(Err(e)) = signal_task.await {
        tracing::error!(error = %e, "Signal handling failed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
