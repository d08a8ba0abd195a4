//! Transaction Anomaly Feed - Main Entry Point
//!
//! Listens for session commands on NATS and runs one isolated anomaly-detection
//! session per connected client, publishing its results on a per-session subject.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use transaction_anomaly_feed::{
    config::{AppConfig, LoggingConfig},
    consumer::SessionCommandConsumer,
    metrics::{FeedMetrics, MetricsReporter},
    producer::NatsResultSink,
    session::{SessionBuilder, SessionRegistry},
    types::SessionAction,
};

/// How often sessions that ended on their own are removed
const REAP_INTERVAL: Duration = Duration::from_secs(5);

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("transaction_anomaly_feed={}", logging.level).parse()?);

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Transaction Anomaly Feed");

    let engine = config.engine();
    engine.validate()?;
    info!(
        amount_threshold = engine.detection.amount_threshold,
        velocity_threshold_count = engine.detection.velocity_threshold_count,
        velocity_threshold_seconds = engine.detection.velocity_threshold_seconds,
        off_hours = %format!(
            "[{}, {})",
            engine.detection.off_hours_start, engine.detection.off_hours_end
        ),
        utc_offset_minutes = engine.detection.utc_offset_minutes,
        countries = engine.generator.countries.len(),
        tick_interval_ms = engine.session.tick_interval_ms,
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics = Arc::new(FeedMetrics::new());
    let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
    tokio::spawn(reporter.start());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = SessionCommandConsumer::new(client.clone(), &config.nats.session_subject);
    let mut commands = consumer.subscribe().await?;
    info!(
        "Publishing results to: {}.<session_id>",
        config.nats.result_subject_prefix
    );

    let builder = SessionBuilder::new(engine).with_metrics(metrics.clone());
    let mut registry = SessionRegistry::new(builder);

    let mut reap = tokio::time::interval(REAP_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            command = commands.next_command() => {
                let Some(command) = command else {
                    warn!("Session command subscription closed");
                    break;
                };

                match command.action {
                    SessionAction::Open => {
                        let sink = NatsResultSink::new(
                            client.clone(),
                            &config.nats.result_subject_prefix,
                            &command.session_id,
                        );
                        if let Err(e) = registry.on_start(&command.session_id, sink).await {
                            warn!(session_id = %command.session_id, error = %e, "Failed to start session");
                        }
                    }
                    SessionAction::Close => {
                        if !registry.on_stop(&command.session_id).await {
                            warn!(session_id = %command.session_id, "Close for unknown session");
                        }
                    }
                }
            }
            _ = reap.tick() => {
                let reaped = registry.reap_finished().await;
                if reaped > 0 {
                    info!(reaped = reaped, active = registry.len(), "Reaped finished sessions");
                }
            }
        }
    }

    // Print final summary
    info!("Feed shutting down...");
    registry.shutdown_all().await;
    if let Err(e) = client.flush().await {
        warn!(error = %e, "Failed to flush NATS client");
    }
    metrics.print_summary();

    Ok(())
}
