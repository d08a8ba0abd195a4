//! Feed Client
//!
//! Opens a session on the anomaly feed, prints the results it streams, then
//! closes the session. Runs a local in-process session when NATS is unreachable.

use futures::StreamExt;
use transaction_anomaly_feed::{
    config::AppConfig,
    producer::result_subject,
    session::{ChannelSink, SessionBuilder},
    types::{ResultMessage, SessionCommand},
};
use tracing::{info, warn};

fn report(index: u64, message: &ResultMessage) {
    if message.is_anomaly {
        warn!(
            n = index,
            transaction_id = %message.transaction_id,
            amount = format!("{:.2}", message.amount),
            route = %format!("{} -> {}", message.source_country, message.dest_country),
            reason = %message.reason,
            "ALERT"
        );
    } else {
        info!(
            n = index,
            transaction_id = %message.transaction_id,
            amount = format!("{:.2}", message.amount),
            route = %format!("{} -> {}", message.source_country, message.dest_country),
            "Transaction"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("feed_client=info".parse()?),
        )
        .init();

    info!("Starting Feed Client");

    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Using default configuration");
        AppConfig::default()
    });

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| config.nats.url.clone());
    let session_id = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(20);

    info!(
        nats_url = %nats_url,
        session_id = %session_id,
        count = count,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url.as_str()).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(config, &session_id, count).await;
        }
    };

    // Subscribe before opening so the first result is not missed
    let subject = result_subject(&config.nats.result_subject_prefix, &session_id);
    let mut results = client.subscribe(subject.clone()).await?;

    let open = serde_json::to_vec(&SessionCommand::open(&session_id))?;
    client
        .publish(config.nats.session_subject.clone(), open.into())
        .await?;
    info!(subject = %subject, "Session opened, waiting for results");

    let mut alerts = 0;
    let mut received = 0;
    while received < count {
        let Some(message) = results.next().await else {
            warn!("Result subscription closed");
            break;
        };
        match serde_json::from_slice::<ResultMessage>(&message.payload) {
            Ok(result) => {
                received += 1;
                if result.is_anomaly {
                    alerts += 1;
                }
                report(received, &result);
            }
            Err(e) => warn!(error = %e, "Failed to deserialize result"),
        }
    }

    let close = serde_json::to_vec(&SessionCommand::close(&session_id))?;
    client
        .publish(config.nats.session_subject.clone(), close.into())
        .await?;
    client.flush().await?;

    info!(
        "Completed! Received {} results ({} alerts)",
        received, alerts
    );

    Ok(())
}

async fn run_dry_mode(config: AppConfig, session_id: &str, count: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let (sink, mut rx) = ChannelSink::channel(16);
    let mut session = SessionBuilder::new(config.engine()).start(session_id, sink)?;

    let mut alerts = 0;
    for i in 0..count {
        let Some(result) = rx.recv().await else {
            break;
        };
        if result.is_anomaly {
            alerts += 1;
        }
        let message = result.to_message();
        if i == 0 {
            info!("Sample result:\n{}", serde_json::to_string_pretty(&message)?);
        }
        report(i + 1, &message);
    }

    session.stop().await;
    info!("Completed! {} of {} results were alerts", alerts, count);

    Ok(())
}
