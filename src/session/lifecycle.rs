//! Session start, tick loop and cancellation

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::detection::{RuleEvaluator, VelocityWindow};
use crate::error::EngineError;
use crate::generator::TransactionGenerator;
use crate::metrics::FeedMetrics;
use crate::session::sink::ResultSink;
use crate::types::result::AnomalyResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Why a session's tick loop ended
#[derive(Debug)]
pub enum SessionExit {
    /// Stopped by its owner, or the owner went away
    Stopped,
    /// The sink rejected a result
    DeliveryFailed(EngineError),
    /// The tick task panicked or was cancelled by the runtime
    Aborted,
}

impl SessionExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionExit::Stopped => "stopped",
            SessionExit::DeliveryFailed(_) => "delivery_failed",
            SessionExit::Aborted => "aborted",
        }
    }
}

/// Validated recipe for starting sessions
#[derive(Clone)]
pub struct SessionBuilder {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    seed: Option<u64>,
    metrics: Arc<FeedMetrics>,
}

impl SessionBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            seed: None,
            metrics: Arc::new(FeedMetrics::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Every session started from this builder generates the same sequence
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<FeedMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<FeedMetrics> {
        &self.metrics
    }

    /// Start a session with an empty window, delivering to `sink` once per
    /// tick. Configuration errors are returned here, before any tick runs.
    /// Must be called from within a Tokio runtime.
    pub fn start<S>(&self, id: impl Into<String>, sink: S) -> Result<Session, EngineError>
    where
        S: ResultSink + 'static,
    {
        let id = id.into();
        self.config.validate()?;

        let evaluator = RuleEvaluator::new(&self.config.detection)?;
        let generator = match self.seed {
            Some(seed) => TransactionGenerator::with_seed(
                &self.config.generator,
                &self.config.detection,
                self.clock.clone(),
                seed,
            )?,
            None => TransactionGenerator::new(
                &self.config.generator,
                &self.config.detection,
                self.clock.clone(),
            )?,
        };

        let worker = TickWorker {
            session_id: id.clone(),
            window: evaluator.new_window(),
            evaluator,
            generator,
            clock: self.clock.clone(),
            metrics: self.metrics.clone(),
            ticks: 0,
        };

        let period = self.config.session.tick_interval();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.metrics.record_session_started();
        let handle = tokio::spawn(run(worker, sink, period, shutdown_rx));

        info!(
            session_id = %id,
            tick_interval_ms = period.as_millis() as u64,
            "Session started"
        );

        Ok(Session {
            id,
            shutdown_tx: Some(shutdown_tx),
            worker: Some(handle),
            exit: None,
        })
    }
}

/// Handle to a running session. Dropping it also ends the tick loop.
pub struct Session {
    id: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<SessionExit>>,
    exit: Option<SessionExit>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True once the tick loop has ended, whether stopped or failed
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel the schedule and wait for the tick loop to end. Once this
    /// returns, the sink sees no further results. Safe to call repeatedly.
    pub async fn stop(&mut self) -> &SessionExit {
        if let Some(tx) = self.shutdown_tx.take() {
            // The loop may already have ended on its own
            let _ = tx.send(());
        }

        if let Some(handle) = self.worker.take() {
            let exit = match handle.await {
                Ok(exit) => exit,
                Err(e) => {
                    error!(session_id = %self.id, error = %e, "Session task aborted");
                    SessionExit::Aborted
                }
            };
            self.exit = Some(exit);
        }

        self.exit.get_or_insert(SessionExit::Aborted)
    }

    /// How the loop ended, once `stop` has been awaited
    pub fn exit(&self) -> Option<&SessionExit> {
        self.exit.as_ref()
    }
}

/// State owned by one session's task
struct TickWorker {
    session_id: String,
    generator: TransactionGenerator,
    evaluator: RuleEvaluator,
    window: VelocityWindow,
    clock: Arc<dyn Clock>,
    metrics: Arc<FeedMetrics>,
    ticks: u64,
}

impl TickWorker {
    /// Generate, evaluate against this session's window, count
    fn tick(&mut self) -> AnomalyResult {
        let started = std::time::Instant::now();

        let tx = self.generator.next();
        let result = self
            .evaluator
            .evaluate(&tx, &mut self.window, self.clock.now());
        self.ticks += 1;

        self.metrics.record_result(&result, started.elapsed());

        if result.is_anomaly {
            info!(
                session_id = %self.session_id,
                tick = self.ticks,
                transaction_id = %tx.transaction_id,
                amount = tx.amount,
                route = %format!("{}->{}", tx.source_country, tx.dest_country),
                reason = %result.reason_text(),
                "Anomaly flagged"
            );
        } else {
            debug!(
                session_id = %self.session_id,
                tick = self.ticks,
                transaction_id = %tx.transaction_id,
                window_len = self.window.len(),
                "Transaction clean"
            );
        }

        result
    }
}

async fn run<S>(
    mut worker: TickWorker,
    sink: S,
    period: Duration,
    mut shutdown: oneshot::Receiver<()>,
) -> SessionExit
where
    S: ResultSink,
{
    // First tick fires one full period after start
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break SessionExit::Stopped,
            _ = interval.tick() => {
                let result = worker.tick();

                // A stop that lands mid-delivery suppresses this result
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break SessionExit::Stopped,
                    delivered = sink.deliver(&result) => {
                        if let Err(e) = delivered {
                            worker.metrics.record_delivery_failure();
                            warn!(
                                session_id = %worker.session_id,
                                tick = worker.ticks,
                                error = %e,
                                "Result delivery failed, ending session"
                            );
                            break SessionExit::DeliveryFailed(EngineError::Delivery(e));
                        }
                    }
                }
            }
        }
    };

    worker.metrics.record_session_stopped();
    info!(
        session_id = %worker.session_id,
        ticks = worker.ticks,
        exit = exit.as_str(),
        "Session ended"
    );

    exit
}
