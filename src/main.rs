use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use event_generator::config::{GeneratorArgs, GeneratorConfig};
use event_generator::connection::BrokerConnector;
use event_generator::transport::config::{parse_engine, producer_options};
use event_generator::{Generator, GeneratorError, logging};
use tokio::signal;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "event-generator")]
#[command(about = "Synthetic health event producer for one or many broker clusters")]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Load the whole configuration from a YAML file instead of flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interval in seconds between production summaries (0 disables)
    #[arg(long, default_value = "60")]
    summary_interval: u64,

    #[command(flatten)]
    generator: GeneratorArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    logging::init(&cli.log_level)?;

    let config = match cli.config {
        Some(ref path) => GeneratorConfig::from_yaml_file(path)?,
        None => cli.generator.into_config(),
    };
    info!(
        tenants = config.tenants.len(),
        engine = %config.engine,
        "Loaded broker configuration"
    );

    let engine = parse_engine(&config.engine)
        .ok_or_else(|| GeneratorError::UnknownEngine(config.engine.clone()))?;
    let connector = BrokerConnector::new(engine, producer_options(&config.producer));
    let mut generator = Generator::new(config, Arc::new(connector));

    if let Err(e) = generator.start().await {
        error!("Failed to start event generator");
        return Err(e.into());
    }

    let summary = generator.subscribe().filter(|_| cli.summary_interval > 0).map(|stats| {
        let every = Duration::from_secs(cli.summary_interval);
        tokio::spawn(async move {
            let mut t = tokio::time::interval(every);
            t.tick().await;
            loop {
                t.tick().await;
                let snap = stats.borrow().clone();
                info!(
                    produced = snap.produced,
                    skipped = snap.skipped,
                    failures = snap.total_failures(),
                    "Production summary: {:.2} events/s over {:.0}s",
                    snap.throughput(),
                    snap.elapsed.as_secs_f64()
                );
            }
        })
    });

    signal::ctrl_c().await?;
    info!("Ctrl+C received, stopping generator");

    if let Some(h) = summary {
        h.abort();
    }
    generator.stop().await;
    Ok(())
}
