//! Session behavior across concurrent clients.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use transaction_anomaly_feed::{
    clock::{Clock, FixedClock},
    config::EngineConfig,
    session::{ChannelSink, SessionBuilder, SessionExit},
    types::result::AnomalyReason,
    AnomalyResult, RuleEvaluator, TransactionGenerator,
};

const SEED: u64 = 2024;

fn afternoon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap()
}

/// Few routes so the velocity rule depends heavily on history
fn small_world() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.generator.countries = vec![
        "Germany".to_string(),
        "Japan".to_string(),
        "Canada".to_string(),
    ];
    config.session.tick_interval_ms = 1;
    config
}

fn builder(config: EngineConfig) -> SessionBuilder {
    SessionBuilder::new(config)
        .with_clock(Arc::new(FixedClock(afternoon())))
        .with_seed(SEED)
}

/// Results a session with a fresh window must produce
fn replay(config: &EngineConfig, n: usize) -> Vec<AnomalyResult> {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(afternoon()));
    let mut generator =
        TransactionGenerator::with_seed(&config.generator, &config.detection, clock.clone(), SEED)
            .unwrap();
    let evaluator = RuleEvaluator::new(&config.detection).unwrap();
    let mut window = evaluator.new_window();

    (0..n)
        .map(|_| {
            let tx = generator.next();
            evaluator.evaluate(&tx, &mut window, clock.now())
        })
        .collect()
}

async fn collect(builder: &SessionBuilder, id: &str, n: usize) -> Vec<AnomalyResult> {
    let (sink, mut rx) = ChannelSink::channel(n + 8);
    let mut session = builder.start(id, sink).unwrap();

    let mut results = Vec::with_capacity(n);
    while results.len() < n {
        results.push(rx.recv().await.expect("session ended early"));
    }
    session.stop().await;
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_do_not_share_history() {
    let config = small_world();
    let builder = builder(config.clone());
    let n = 60;

    let a = tokio::spawn({
        let builder = builder.clone();
        async move { collect(&builder, "a", n).await }
    });
    let b = tokio::spawn({
        let builder = builder.clone();
        async move { collect(&builder, "b", n).await }
    });

    let a = a.await.unwrap();
    let b = b.await.unwrap();
    let expected = replay(&config, n);

    assert_eq!(a, b);
    assert_eq!(a, expected);

    // The comparison only means something if history shaped the results
    assert!(a
        .iter()
        .any(|r| r.reasons.contains(&AnomalyReason::Velocity)));
    assert!(a
        .iter()
        .any(|r| !r.reasons.contains(&AnomalyReason::Velocity)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_result_upholds_invariants() {
    let mut config = EngineConfig::default();
    config.session.tick_interval_ms = 1;
    let builder = builder(config);
    let results = collect(&builder, "invariants", 200).await;

    for result in &results {
        let tx = &result.transaction;
        assert_ne!(tx.source_country, tx.dest_country);
        assert_eq!(result.is_anomaly, !result.reasons.is_empty());

        let mut sorted = result.reasons.clone();
        sorted.sort();
        assert_eq!(sorted, result.reasons);

        let message = result.to_message();
        assert_eq!(message.is_anomaly, result.is_anomaly);
        assert_eq!(message.reason.is_empty(), !result.is_anomaly);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nothing_is_delivered_after_stop() {
    let builder = builder(small_world());
    let (sink, mut rx) = ChannelSink::channel(4);
    let mut session = builder.start("stopper", sink).unwrap();

    let mut delivered = 0u64;
    for _ in 0..10 {
        rx.recv().await.unwrap();
        delivered += 1;
    }

    assert!(matches!(session.stop().await, SessionExit::Stopped));

    // Only results handed over before stop returned remain, then the channel closes
    while rx.recv().await.is_some() {
        delivered += 1;
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    let processed = builder
        .metrics()
        .transactions_processed
        .load(Ordering::Relaxed);
    assert!(processed >= delivered);
    assert!(processed <= delivered + 1, "a suppressed tick is the only gap");

    // A second stop, as from an error callback, is harmless
    assert!(matches!(session.stop().await, SessionExit::Stopped));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_during_blocked_delivery_suppresses_it() {
    let builder = builder(small_world());
    // Nobody reads, so the second result blocks in deliver
    let (sink, mut rx) = ChannelSink::channel(1);
    let mut session = builder.start("blocked", sink).unwrap();

    let processed = || {
        builder
            .metrics()
            .transactions_processed
            .load(Ordering::Relaxed)
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        while processed() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("second tick never ran");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(processed(), 2, "the loop is parked on the full channel");

    let exit = tokio::time::timeout(Duration::from_secs(5), session.stop())
        .await
        .expect("stop hung on a blocked sink");
    assert!(matches!(exit, SessionExit::Stopped));

    // The buffered first result is all that ever arrives
    let first = rx.recv().await.expect("first result was buffered");
    assert!(rx.recv().await.is_none());
    assert_eq!(processed(), 2);

    let expected = replay(&small_world(), 2);
    assert_eq!(first, expected[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_sink_tears_session_down() {
    let builder = builder(small_world());
    let (sink, mut rx) = ChannelSink::channel(1);
    let mut session = builder.start("closing", sink).unwrap();

    rx.recv().await.unwrap();
    drop(rx);

    while !session.is_finished() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert!(matches!(
        session.stop().await,
        SessionExit::DeliveryFailed(_)
    ));
    assert_eq!(builder.metrics().active_sessions(), 0);
}
