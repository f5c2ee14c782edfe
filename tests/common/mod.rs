//! Shared in-process stub collector for the integration tests.
//!
//! Bound to an ephemeral local port; every POST is timestamped on arrival,
//! success or not, while only accepted batches are stored. Tests flip
//! `set_failing` to simulate an outage and `set_delay` to keep a
//! transmission in flight.

#![allow(dead_code)] // each test binary uses a different slice of the helpers

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use parking_lot::Mutex;

use apipulse::{LogBatch, MetricRecord};

#[derive(Clone)]
pub struct StubCollector {
    addr: SocketAddr,
    state: Arc<CollectorState>,
}

struct CollectorState {
    batches: Mutex<Vec<Vec<MetricRecord>>>,
    arrivals: Mutex<Vec<Instant>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

pub async fn spawn_collector() -> StubCollector {
    let state = Arc::new(CollectorState {
        batches: Mutex::new(Vec::new()),
        arrivals: Mutex::new(Vec::new()),
        failing: AtomicBool::new(false),
        delay_ms: AtomicU64::new(0),
    });

    let router = Router::new()
        .route("/logs", post(ingest))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub collector");
    let addr = listener.local_addr().expect("stub collector addr");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("stub collector exited");
    });

    StubCollector { addr, state }
}

async fn ingest(
    State(state): State<Arc<CollectorState>>,
    Json(batch): Json<LogBatch>,
) -> StatusCode {
    // Stamped before any stall so the instant reflects batch departure.
    state.arrivals.lock().push(Instant::now());

    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if state.failing.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    state.batches.lock().push(batch.logs);
    StatusCode::OK
}

impl StubCollector {
    /// Full URL of the ingest endpoint.
    pub fn url(&self) -> String {
        format!("http://{}/logs", self.addr)
    }

    /// Accepted batches so far, in arrival order.
    pub fn batches(&self) -> Vec<Vec<MetricRecord>> {
        self.state.batches.lock().clone()
    }

    /// Routes of every record in the `n`-th accepted batch.
    pub fn batch_routes(&self, n: usize) -> Vec<String> {
        self.batches()[n].iter().map(|r| r.route.clone()).collect()
    }

    /// Total POSTs seen, including rejected ones.
    pub fn hits(&self) -> usize {
        self.state.arrivals.lock().len()
    }

    /// Arrival instant of every POST, in order, including rejected ones.
    pub fn arrivals(&self) -> Vec<Instant> {
        self.state.arrivals.lock().clone()
    }

    /// When set, every subsequent POST is answered with 500.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// When set, every subsequent POST stalls before being processed.
    pub fn set_delay(&self, delay: Duration) {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}
