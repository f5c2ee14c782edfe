use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

use crate::config::{BatcherConfig, ConfigError};
use crate::record::MetricRecord;

// ─── Transport tuning ────────────────────────────────────────────

/// Upper bound for one delivery attempt; a hung collector turns into an
/// ordinary transport failure instead of a flush that never returns.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Public types ────────────────────────────────────────────────

/// Batching shipper for request telemetry.
///
/// Owns the pending queue and a recurring flush timer. Handles are cheap to
/// clone and all share one queue; a multi-tenant process runs one `Batcher`
/// per tenant, each with its own queue and timer.
///
/// Delivery is fire-and-forget: a failed batch is logged and goes back to
/// the front of the queue for the next cycle. There is no cap and no drop
/// policy, so a destination that stays down grows the queue without bound.
#[derive(Clone)]
pub struct Batcher {
    inner: Arc<Inner>,
}

/// What a single flush cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Queue was empty; no network call was made.
    Idle,
    /// Batch of `n` records accepted by the collector.
    Delivered(usize),
    /// Delivery failed; `n` records went back to the front of the queue.
    Requeued(usize),
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    endpoint: Url,
    api_token: String,
    user_id: String,
    client: reqwest::Client,

    /// Single source of truth for undelivered records. Locked only for
    /// append / drain / requeue, never across an await.
    queue: Mutex<VecDeque<MetricRecord>>,

    /// Present while the flush timer is running; taken by `shutdown`.
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

/// Borrowed counterpart of [`crate::record::LogBatch`] for the send path.
#[derive(Serialize)]
struct Payload<'a> {
    logs: &'a [MetricRecord],
}

#[derive(Debug, Error)]
enum TransmitError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("collector answered {0}")]
    RejectedStatus(StatusCode),
}

// ─── Batcher impl ────────────────────────────────────────────────

impl Batcher {
    /// Validates the configuration, builds the HTTP client and starts the
    /// recurring flush timer. Must be called from within a Tokio runtime.
    pub fn start(config: BatcherConfig) -> Result<Self, ConfigError> {
        let endpoint = config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let inner = Arc::new(Inner {
            endpoint,
            api_token: config.api_token,
            user_id: config.user_id,
            client,
            queue: Mutex::new(VecDeque::new()),
            stop: Mutex::new(Some(stop_tx)),
        });

        spawn_flush_timer(
            &inner,
            Duration::from_millis(config.flush_interval_ms),
            stop_rx,
        );

        Ok(Self { inner })
    }

    /// Appends a fully built record to the tail of the pending queue.
    /// Synchronous and O(1); never fails, never blocks the request path.
    pub fn enqueue(&self, record: MetricRecord) {
        self.inner.queue.lock().push_back(record);
    }

    /// Builds the record for one completed request, stamped with the
    /// configured credential pair, and enqueues it.
    pub fn record(&self, method: &str, route: &str, status_code: u16, response_time_ms: u64) {
        self.enqueue(MetricRecord {
            api_token: self.inner.api_token.clone(),
            user_id: self.inner.user_id.clone(),
            route: route.to_owned(),
            method: method.to_owned(),
            response_time: response_time_ms,
            status_code,
        });
    }

    /// Number of records currently waiting for delivery.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Drains the queue and posts the batch to the collector.
    ///
    /// Runs automatically on the flush timer and may also be called by hand.
    /// Concurrent flushes each drain a disjoint snapshot, so no record is
    /// ever lost or duplicated, but the order in which their batches reach
    /// the collector is unspecified.
    pub async fn flush(&self) -> FlushOutcome {
        flush_queue(&self.inner).await
    }

    /// Stops the recurring timer. Does not force a final flush: anything
    /// still queued is lost unless [`Batcher::flush`] is called first.
    /// Records can still be enqueued afterwards, but nothing will drain
    /// them. An in-flight transmission finishes (or fails and requeues) on
    /// its own schedule. Idempotent.
    pub fn shutdown(&self) {
        if let Some(stop) = self.inner.stop.lock().take() {
            let _ = stop.send(());
            debug!("flush timer stopped");
        }
    }
}

// ─── Flush cycle ─────────────────────────────────────────────────

fn spawn_flush_timer(inner: &Arc<Inner>, period: Duration, mut stop_rx: oneshot::Receiver<()>) {
    // The task holds only a weak handle, so dropping every Batcher clone
    // without calling shutdown() still lets the timer exit: the stop sender
    // inside Inner is dropped with it, which resolves `stop_rx` immediately.
    let weak = Arc::downgrade(inner);

    tokio::spawn(async move {
        // First fire comes one full period after start; catch-up ticks
        // after a slow transmission are skipped rather than bursted.
        let start = tokio::time::Instant::now() + period;
        let mut timer = tokio::time::interval_at(start, period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                // Stop is polled first: a tick that became due in the same
                // poll can never start one more flush after shutdown().
                biased;

                _ = &mut stop_rx => break,
                _ = timer.tick() => {
                    let Some(inner) = weak.upgrade() else { break };
                    flush_queue(&inner).await;
                }
            }
        }
    });
}

async fn flush_queue(inner: &Inner) -> FlushOutcome {
    // Snapshot-and-clear is one critical section: records enqueued while
    // the transmission is in flight land in the fresh queue and belong to
    // the next cycle.
    let batch: Vec<MetricRecord> = {
        let mut queue = inner.queue.lock();
        if queue.is_empty() {
            return FlushOutcome::Idle;
        }
        queue.drain(..).collect()
    };

    match transmit(inner, &batch).await {
        Ok(()) => {
            debug!(records = batch.len(), "telemetry batch delivered");
            FlushOutcome::Delivered(batch.len())
        }
        Err(err) => {
            warn!(
                records = batch.len(),
                error = %err,
                "telemetry delivery failed, requeueing batch"
            );
            let requeued = batch.len();
            let mut queue = inner.queue.lock();
            requeue_front(&mut queue, batch);
            FlushOutcome::Requeued(requeued)
        }
    }
}

/// Puts a failed batch back at the head of the live queue: the failed
/// records are older than anything enqueued since the snapshot was taken,
/// so they keep their place in line.
fn requeue_front(queue: &mut VecDeque<MetricRecord>, batch: Vec<MetricRecord>) {
    let mut restored = VecDeque::from(batch);
    restored.append(queue);
    *queue = restored;
}

async fn transmit(inner: &Inner, batch: &[MetricRecord]) -> Result<(), TransmitError> {
    let response = inner
        .client
        .post(inner.endpoint.clone())
        .json(&Payload { logs: batch })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransmitError::RejectedStatus(status));
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────
