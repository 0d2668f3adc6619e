//! Dispatch executor.
//!
//! Runs a benchmark against a `DataStore` and forwards outcomes to a
//! `SinkHandle`.
//!
//! # Modes
//!
//! ```text
//! open-loop:    RateController ─▶ Pacer ─tick─▶ spawn(op) ─▶ JoinSet ─(end)─▶ drain
//!                    ▲                │
//!                    └─── observe ────┘
//!
//! closed-loop:  worker 0 ─▶ op ─▶ think ─▶ op ─▶ ...  ┐
//!               worker 1 ─▶ op ─▶ think ─▶ op ─▶ ...  ├─(end)─▶ join
//!               worker N ─▶ op ─▶ think ─▶ op ─▶ ...  ┘
//! ```
//!
//! Every operation runs to completion, including those that start during
//! warm-up, so warm-up writes still register their keys. Only outcomes of
//! operations that *start* at or after the warm-up cutoff are reported.
//!
//! Time is read from `tokio::time`, so runs can be driven on a paused clock.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use surge_core::{NodeId, WorkerId};
use surge_flow::{Pacer, Phase, RateController};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{BenchmarkConfig, ConfigError, ExecutionMode};
use crate::generator::OperationGenerator;
use crate::operation::{OperationPayload, OperationRecord};
use crate::registry::KeyRegistry;
use crate::sink::SinkHandle;
use crate::stats::{RunCounters, RunStats};
use crate::store::{DataStore, StoreError};

/// Default time allowed for the store to become ready.
pub const READY_TIMEOUT_DEFAULT: Duration = Duration::from_secs(10);

/// Random stream reserved for the rate controller.
const CONTROLLER_STREAM: u64 = u64::MAX;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The configuration is invalid. Raised before any operation is issued.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The store was not reachable at startup. Raised before any worker launches.
    #[error("store not ready: {0}")]
    Setup(#[source] StoreError),
}

/// Runs one benchmark.
///
/// Blocks until warm-up plus duration elapse or `cancel` fires, then waits
/// for in-flight operations.
///
/// # Errors
///
/// Returns `RunError::Config` for an invalid configuration and
/// `RunError::Setup` if the store does not become ready.
pub async fn run<S>(
    config: BenchmarkConfig,
    store: Arc<S>,
    sink: SinkHandle,
    cancel: CancellationToken,
) -> Result<RunStats, RunError>
where
    S: DataStore + ?Sized + 'static,
{
    Executor::new(config, store, sink)?
        .with_cancellation(cancel)
        .run()
        .await
}

/// Benchmark executor.
///
/// Counters accumulate across calls to `run`; use one executor per run.
pub struct Executor<S: ?Sized> {
    config: Arc<BenchmarkConfig>,
    store: Arc<S>,
    sink: SinkHandle,
    generator: OperationGenerator,
    counters: Arc<RunCounters>,
    cancel: CancellationToken,
    ready_timeout: Duration,
}

impl<S> Executor<S>
where
    S: DataStore + ?Sized + 'static,
{
    /// Creates an executor with a fresh key registry.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(
        config: BenchmarkConfig,
        store: Arc<S>,
        sink: SinkHandle,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let generator = OperationGenerator::new(config.templates.clone(), KeyRegistry::new());
        Ok(Self {
            config: Arc::new(config),
            store,
            sink,
            generator,
            counters: Arc::new(RunCounters::default()),
            cancel: CancellationToken::new(),
            ready_timeout: READY_TIMEOUT_DEFAULT,
        })
    }

    /// Uses `registry` for written keys instead of a fresh one.
    #[must_use]
    pub fn with_registry(mut self, registry: KeyRegistry) -> Self {
        self.generator = OperationGenerator::new(self.config.templates.clone(), registry);
        self
    }

    /// Uses `cancel` as the external cancellation signal.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sets how long to wait for the store at startup.
    #[must_use]
    pub const fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Returns the run configuration.
    #[must_use]
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Returns the registry of written keys.
    #[must_use]
    pub const fn registry(&self) -> &KeyRegistry {
        self.generator.registry()
    }

    /// Returns the live counters.
    #[must_use]
    pub fn counters(&self) -> Arc<RunCounters> {
        Arc::clone(&self.counters)
    }

    /// Returns a clone of the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the benchmark.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Setup` if the store does not become ready, and
    /// `RunError::Config` if the rate controller rejects the configuration or
    /// the run end cannot be represented.
    pub async fn run(&self) -> Result<RunStats, RunError> {
        if let Err(e) = self.store.wait_ready(self.ready_timeout).await {
            warn!(error = %e, timeout_ms = self.ready_timeout.as_millis(), "Store not ready");
            return Err(RunError::Setup(e));
        }

        let start = Instant::now();
        let warmup_end = start.checked_add(self.config.warmup());
        let end = warmup_end.and_then(|t| t.checked_add(self.config.duration()));
        let (Some(warmup_end), Some(end)) = (warmup_end, end) else {
            return Err(
                ConfigError::invalid("duration_secs", "run end is beyond the clock's range").into(),
            );
        };
        let ctx = Arc::new(OpContext {
            store: Arc::clone(&self.store),
            generator: self.generator.clone(),
            sink: self.sink.clone(),
            counters: Arc::clone(&self.counters),
            write_ratio: self.config.write_ratio,
            node_count: self.store.node_count().max(1),
            start,
            warmup_end,
        });

        info!(
            mode = %self.config.mode,
            concurrency = self.config.concurrency,
            warmup_secs = self.config.warmup_secs,
            duration_secs = self.config.duration_secs,
            write_ratio = self.config.write_ratio,
            nodes = ctx.node_count,
            "Benchmark started"
        );

        match self.config.mode {
            ExecutionMode::OpenLoop => self.run_open_loop(&ctx, end).await?,
            ExecutionMode::ClosedLoop => self.run_closed_loop(&ctx, end).await,
        }

        let stats = self.counters.snapshot(self.config.mode, start.elapsed());
        info!(
            issued = stats.issued,
            failed = stats.failed(),
            recorded = stats.recorded,
            dropped = stats.dropped,
            elapsed_ms = stats.elapsed.as_millis(),
            cancelled = self.cancel.is_cancelled(),
            "Benchmark finished"
        );
        Ok(stats)
    }

    async fn run_open_loop(&self, ctx: &Arc<OpContext<S>>, end: Instant) -> Result<(), RunError> {
        let mut controller = RateController::new(
            self.config.requests_per_second,
            &self.config.rate_pattern,
            0,
        )
        .map_err(ConfigError::from)?;
        let mut controller_rng = stream_rng(self.config.seed, CONTROLLER_STREAM);
        let mut pacer = Pacer::new(controller.current_rate());
        let concurrency = u64::from(self.config.concurrency);

        let mut tasks = JoinSet::new();
        let mut seq = 0u64;

        loop {
            let now_us = micros(ctx.start.elapsed());
            if let Some(rate) = controller.observe(now_us, &mut controller_rng) {
                pacer.set_rate(rate);
                debug!(
                    rate,
                    phase = controller.phase().map(Phase::as_str),
                    elapsed_us = now_us,
                    "Target rate changed"
                );
            }

            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    info!(issued = seq, "Benchmark cancelled");
                    break;
                }
                () = tokio::time::sleep_until(end) => break,
                _ = pacer.tick() => {}
            }

            let worker = WorkerId::new(seq % concurrency);
            let mut rng = stream_rng(self.config.seed, seq);
            let op_ctx = Arc::clone(ctx);
            ctx.counters.operation_started();
            tasks.spawn(async move {
                op_ctx.execute(worker, &mut rng).await;
                op_ctx.counters.operation_finished();
            });
            seq += 1;

            while let Some(result) = tasks.try_join_next() {
                log_join_error(result);
            }
        }

        debug!(in_flight = ctx.counters.in_flight(), "Waiting for in-flight operations");
        drain(tasks).await;
        Ok(())
    }

    async fn run_closed_loop(&self, ctx: &Arc<OpContext<S>>, end: Instant) {
        let think_time = self.config.think_time();
        let mut tasks = JoinSet::new();

        for index in 0..u64::from(self.config.concurrency) {
            let ctx = Arc::clone(ctx);
            let cancel = self.cancel.clone();
            let worker = WorkerId::new(index);
            let mut rng = stream_rng(self.config.seed, index);

            ctx.counters.worker_started();
            tasks.spawn(async move {
                while !cancel.is_cancelled() && Instant::now() < end {
                    ctx.execute(worker, &mut rng).await;

                    if think_time.is_zero() {
                        tokio::task::yield_now().await;
                        continue;
                    }
                    let wake = (Instant::now() + think_time).min(end);
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep_until(wake) => {}
                    }
                }
                ctx.counters.worker_stopped();
            });
        }

        drain(tasks).await;
    }
}

/// State shared by every operation of a run.
struct OpContext<S: ?Sized> {
    store: Arc<S>,
    generator: OperationGenerator,
    sink: SinkHandle,
    counters: Arc<RunCounters>,
    write_ratio: f64,
    node_count: u32,
    start: Instant,
    warmup_end: Instant,
}

/// When an operation ran.
struct Timing {
    timestamp: DateTime<Utc>,
    started: Instant,
    duration: Duration,
}

async fn timed<F: Future>(call: F) -> (Timing, F::Output) {
    let timestamp = Utc::now();
    let started = Instant::now();
    let output = call.await;
    let timing = Timing {
        timestamp,
        started,
        duration: started.elapsed(),
    };
    (timing, output)
}

impl<S> OpContext<S>
where
    S: DataStore + ?Sized,
{
    async fn execute(&self, worker: WorkerId, rng: &mut ChaCha8Rng) {
        let is_write = rng.gen::<f64>() < self.write_ratio;
        let node = NodeId::new(u64::from(rng.gen_range(0..self.node_count)));

        if is_write {
            self.execute_write(worker, node, rng).await;
        } else {
            self.execute_read(worker, node, rng).await;
        }
    }

    async fn execute_write(&self, worker: WorkerId, node: NodeId, rng: &mut ChaCha8Rng) {
        let record = self.generator.generate_write(rng);
        self.counters.operation_issued();

        let (timing, result) = timed(self.store.write(node, &record)).await;
        if result.is_ok() {
            self.generator.registry().record(record.key());
        }
        self.counters.write_finished(result.is_ok());

        self.report(worker, node, &timing, result.err(), OperationPayload::Write { record });
    }

    async fn execute_read(&self, worker: WorkerId, node: NodeId, rng: &mut ChaCha8Rng) {
        let Some(key) = self.generator.pick_read_key(rng) else {
            self.counters.read_skipped();
            return;
        };
        self.counters.operation_issued();

        let (timing, result) = timed(self.store.read_by_key(node, &key)).await;
        let (error, returned) = match result {
            Ok(record) => (None, Some(record)),
            Err(e) => (Some(e), None),
        };
        self.counters.read_finished(error.is_none());

        self.report(worker, node, &timing, error, OperationPayload::Read { key, returned });
    }

    /// Forwards an outcome to the sink, or discards it if the operation
    /// started before the warm-up cutoff.
    ///
    /// The cutoff is compared with the start instant, the same instant the
    /// log's `elapsed_us` records. An operation that starts inside warm-up and
    /// completes after the cutoff is therefore discarded, so every logged entry
    /// has `elapsed_us >= warmup`.
    fn report(
        &self,
        worker: WorkerId,
        node: NodeId,
        timing: &Timing,
        error: Option<StoreError>,
        payload: OperationPayload,
    ) {
        if timing.started < self.warmup_end {
            self.counters.warmup_discarded();
            return;
        }

        let record = OperationRecord {
            worker_id: worker,
            node_id: node,
            timestamp: timing.timestamp,
            elapsed_us: micros(timing.started.duration_since(self.start)),
            duration_us: micros(timing.duration),
            success: error.is_none(),
            error: error.map(|e| e.to_string()),
            payload,
        };

        match self.sink.submit(record) {
            Ok(()) => self.counters.recorded(),
            Err(e) => {
                let dropped = self.counters.dropped();
                // First drop, then every thousandth.
                if dropped == 1 || dropped % 1_000 == 0 {
                    warn!(error = %e, dropped, %worker, "Result sink rejected outcome");
                }
            }
        }
    }
}

/// Returns the random stream `stream` of the run seed.
///
/// Without a seed every stream is independently seeded from entropy.
fn stream_rng(seed: Option<u64>, stream: u64) -> ChaCha8Rng {
    let mut rng = seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
    rng.set_stream(stream);
    rng
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

fn log_join_error(result: Result<(), JoinError>) {
    if let Err(e) = result {
        warn!(error = %e, "Benchmark task failed");
    }
}

async fn drain(mut tasks: JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        log_join_error(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_rng_is_deterministic_per_stream() {
        let a: u64 = stream_rng(Some(42), 3).gen();
        let b: u64 = stream_rng(Some(42), 3).gen();
        let c: u64 = stream_rng(Some(42), 4).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_micros_saturates() {
        assert_eq!(micros(Duration::from_millis(3)), 3_000);
        assert_eq!(micros(Duration::MAX), u64::MAX);
    }
}
