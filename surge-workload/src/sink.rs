//! Batched result log writer.
//!
//! Operations hand their outcomes to a `SinkHandle`, which enqueues without
//! blocking. A background task drains the queue and appends entries to a
//! JSON array document.
//!
//! # Design
//!
//! ```text
//! worker ──┐
//! worker ──┼── try_send ──> bounded queue ──> drain task ──> "[\n" e1 ",\n" e2 ... "\n]"
//! worker ──┘   (Full => dropped)                (batch_size | flush_interval | shutdown)
//! ```
//!
//! The closing `]` is only written by `ResultSink::shutdown`. A process killed
//! before shutdown leaves an unterminated array.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::operation::OperationRecord;

/// Errors raised by the result sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The queue is full; the entry was not accepted.
    #[error("result queue full (capacity {capacity})")]
    Full {
        /// Queue capacity.
        capacity: usize,
    },

    /// The drain task has stopped.
    #[error("result sink closed")]
    Closed,

    /// Writing the result log failed.
    #[error("result log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The drain task panicked or was aborted.
    #[error("result sink task failed: {message}")]
    TaskFailed {
        /// Join error description.
        message: String,
    },
}

/// Result sink configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Result log path.
    pub path: PathBuf,
    /// Maximum number of queued entries.
    pub capacity: usize,
    /// Entries that trigger a flush.
    pub batch_size: usize,
    /// Maximum time buffered entries wait before a flush, in milliseconds.
    pub flush_interval_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("result.json"),
            capacity: 10_000,
            batch_size: 500,
            flush_interval_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FlushReason {
    Size,
    Interval,
    Shutdown,
}

impl FlushReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Interval => "interval",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Totals reported when the sink shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkSummary {
    /// Entries written to the log.
    pub entries: u64,
    /// Flushes performed.
    pub batches: u64,
}

/// Cloneable, non-blocking submission handle.
#[derive(Debug, Clone)]
pub struct SinkHandle {
    tx: mpsc::Sender<OperationRecord>,
    capacity: usize,
}

impl SinkHandle {
    /// Enqueues an outcome without blocking.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Full` if the queue is at capacity and
    /// `SinkError::Closed` if the drain task has stopped. The entry is
    /// dropped in both cases.
    pub fn submit(&self, record: OperationRecord) -> Result<(), SinkError> {
        self.tx.try_send(record).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    /// Returns the queue capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Owner of the drain task.
#[derive(Debug)]
pub struct ResultSink<W> {
    handle: SinkHandle,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<(W, SinkSummary)>>,
}

impl ResultSink<BufWriter<File>> {
    /// Creates (or truncates) the log file at `config.path` and starts the sink.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Io` if the file cannot be created or written.
    pub async fn create(config: &SinkConfig) -> Result<Self, SinkError> {
        let file = File::create(&config.path).await?;
        info!(path = %config.path.display(), "Writing results");
        Self::start(BufWriter::new(file), config).await
    }
}

impl<W> ResultSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Writes the opening delimiter to `writer` and spawns the drain task.
    ///
    /// A zero `capacity` or `batch_size` is treated as 1.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Io` if the opening delimiter cannot be written.
    pub async fn start(mut writer: W, config: &SinkConfig) -> Result<Self, SinkError> {
        let capacity = config.capacity.max(1);
        let batch_size = config.batch_size.max(1);
        let flush_interval = Duration::from_millis(config.flush_interval_ms.max(1));

        writer.write_all(b"[\n").await?;
        writer.flush().await?;

        let (tx, rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(drain_task(writer, rx, shutdown_rx, batch_size, flush_interval));

        info!(
            capacity,
            batch_size,
            flush_interval_ms = config.flush_interval_ms,
            "Result sink started"
        );

        Ok(Self {
            handle: SinkHandle { tx, capacity },
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    /// Returns a submission handle.
    #[must_use]
    pub fn handle(&self) -> SinkHandle {
        self.handle.clone()
    }

    /// Flushes queued entries, closes the array and returns the writer.
    ///
    /// Entries submitted through surviving handles after this call are rejected.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Io` if a write failed at any point, or
    /// `SinkError::TaskFailed` if the drain task did not complete.
    pub async fn shutdown(mut self) -> Result<(W, SinkSummary), SinkError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // The task may already have exited on an I/O error.
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => Ok(result?),
            Err(e) => Err(SinkError::TaskFailed {
                message: e.to_string(),
            }),
        }
    }
}

async fn drain_task<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<OperationRecord>,
    mut shutdown_rx: oneshot::Receiver<()>,
    batch_size: usize,
    flush_interval: Duration,
) -> std::io::Result<(W, SinkSummary)>
where
    W: AsyncWrite + Unpin,
{
    let mut pending = Vec::with_capacity(batch_size);
    let mut summary = SinkSummary::default();
    let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            msg = rx.recv() => {
                let Some(record) = msg else { break };
                pending.push(record);
                if pending.len() >= batch_size {
                    write_batch(&mut writer, &mut pending, &mut summary, FlushReason::Size).await?;
                }
            }
            _ = ticker.tick() => {
                if !pending.is_empty() {
                    write_batch(&mut writer, &mut pending, &mut summary, FlushReason::Interval)
                        .await?;
                }
            }
            _ = &mut shutdown_rx => break,
        }
    }

    rx.close();
    while let Ok(record) = rx.try_recv() {
        pending.push(record);
    }
    if !pending.is_empty() {
        write_batch(&mut writer, &mut pending, &mut summary, FlushReason::Shutdown).await?;
    }

    writer.write_all(b"\n]").await?;
    writer.flush().await?;

    info!(
        entries = summary.entries,
        batches = summary.batches,
        "Result sink shut down"
    );
    Ok((writer, summary))
}

async fn write_batch<W>(
    writer: &mut W,
    pending: &mut Vec<OperationRecord>,
    summary: &mut SinkSummary,
    reason: FlushReason,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(pending.len() * 256);
    let mut written = 0u64;
    for record in pending.drain(..) {
        match serde_json::to_vec(&record) {
            Ok(json) => {
                if summary.entries + written > 0 {
                    buf.extend_from_slice(b",\n");
                }
                buf.extend_from_slice(&json);
                written += 1;
            }
            Err(e) => {
                warn!(error = %e, worker = %record.worker_id, "Skipping unserializable result");
            }
        }
    }

    writer.write_all(&buf).await?;
    writer.flush().await?;
    summary.entries += written;
    summary.batches += 1;

    debug!(reason = reason.as_str(), entries = written, "Flushed results");
    Ok(())
}
