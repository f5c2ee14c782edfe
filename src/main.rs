use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware as axum_mw,
    routing::{get, post},
    Json, Router,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use apipulse::{track_requests, Batcher, BatcherConfig, FlushOutcome, LogBatch};

// ─── Demo wiring ─────────────────────────────────────────────────

const APP_ADDR: &str = "127.0.0.1:3000";
const SINK_ADDR: &str = "127.0.0.1:4100";

/// Ingest route of the bundled sink, matching the hosted collector's path.
const SINK_ROUTE: &str = "/api/v1/telemetry/logs";

/// Short demo interval so batches visibly flow.
const DEMO_FLUSH_MS: u64 = 2_000;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("apipulse=debug")),
        )
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════╗");
    println!("║   📡  APIPULSE TELEMETRY OBSERVATORY             ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!();

    // ── 1. Local collector sink ──────────────────────────────────
    let sink = Arc::new(SinkState {
        received: AtomicU64::new(0),
    });
    let sink_router = Router::new()
        .route(SINK_ROUTE, post(ingest_logs))
        .with_state(sink);

    let sink_listener = tokio::net::TcpListener::bind(SINK_ADDR)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind sink to {SINK_ADDR}: {e}"));
    tokio::spawn(async move {
        axum::serve(sink_listener, sink_router)
            .await
            .expect("Sink server exited with error");
    });

    // ── 2. Batcher pointed at the sink ───────────────────────────
    let mut config = BatcherConfig::new(
        format!("http://{SINK_ADDR}{SINK_ROUTE}"),
        "demo-token",
        "acct-demo",
    );
    config.flush_interval_ms = DEMO_FLUSH_MS;
    let batcher = Batcher::start(config).expect("Batcher configuration is invalid");

    // ── 3. Demo app wearing the tracking middleware ──────────────
    let app = Router::new()
        .route("/api/hello", get(hello))
        .route("/api/users/:id", get(get_user))
        .route("/api/work", get(do_work))
        .layer(axum_mw::from_fn_with_state(
            batcher.clone(),
            track_requests,
        ));

    let app_listener = tokio::net::TcpListener::bind(APP_ADDR)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind app to {APP_ADDR}: {e}"));
    tokio::spawn(async move {
        axum::serve(app_listener, app)
            .await
            .expect("Demo app exited with error");
    });

    // ── 4. Background traffic so batches visibly flow ────────────
    tokio::spawn(traffic_loop());

    println!("Demo app    → http://{APP_ADDR}/api/hello");
    println!("Sink        → http://{SINK_ADDR}{SINK_ROUTE}");
    println!("Flushing every {DEMO_FLUSH_MS}ms, Ctrl-C to stop");
    println!();

    // ── 5. Run until ctrl-c, then drain and stop the timer ───────
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install ctrl-c handler");

    println!();
    println!("⏹  Shutting down: {} record(s) pending", batcher.pending());
    match batcher.flush().await {
        FlushOutcome::Idle => println!("   ✓ queue already empty"),
        FlushOutcome::Delivered(n) => println!("   ✓ delivered final batch of {n}"),
        FlushOutcome::Requeued(n) => println!("   ✗ sink unreachable, {n} record(s) abandoned"),
    }
    batcher.shutdown();
}

// ─── Collector sink ──────────────────────────────────────────────

struct SinkState {
    received: AtomicU64,
}

/// Prints every received batch, one coloured line per record.
async fn ingest_logs(
    State(sink): State<Arc<SinkState>>,
    Json(batch): Json<LogBatch>,
) -> StatusCode {
    let count = batch.logs.len() as u64;
    let total = sink.received.fetch_add(count, Ordering::SeqCst) + count;
    let stamp = chrono::Local::now().format("%H:%M:%S");

    println!("  {stamp}  ▼ batch of {count} record(s), {total} total");
    for rec in &batch.logs {
        let colour = match rec.status_code {
            200..=299 => "\x1b[32m", // green
            400..=499 => "\x1b[33m", // yellow
            _ => "\x1b[31m",         // red
        };
        println!(
            "           {colour}{}\x1b[0m  {:<5} {:<24} {:>5}ms  [{}]",
            rec.status_code, rec.method, rec.route, rec.response_time, rec.user_id
        );
    }

    StatusCode::NO_CONTENT
}

// ─── Demo routes ─────────────────────────────────────────────────

async fn hello() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "hi" }))
}

async fn get_user(Path(id): Path<String>) -> Result<Json<serde_json::Value>, StatusCode> {
    // Simulated lookup cost
    tokio::time::sleep(Duration::from_millis(2)).await;

    match id.parse::<u32>() {
        Ok(n) if n < 10_000 => Ok(Json(serde_json::json!({
            "id":   format!("usr_{n:08}"),
            "name": "Demo User",
        }))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn do_work() -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_millis(15)).await;
    Json(serde_json::json!({ "status": "done" }))
}

// ─── Traffic generator ───────────────────────────────────────────

/// Hits the demo routes forever with a deterministic mix: mostly user
/// lookups (some of them misses), a few greetings, the odd slow call and
/// an unrouted path now and then.
async fn traffic_loop() {
    let client = reqwest::Client::new();
    let mut rng = StdRng::seed_from_u64(42);

    loop {
        let roll = rng.gen_range(0u8..100);
        let url = if roll < 55 {
            format!("http://{APP_ADDR}/api/users/{}", rng.gen_range(1..12_000u32))
        } else if roll < 80 {
            format!("http://{APP_ADDR}/api/hello")
        } else if roll < 92 {
            format!("http://{APP_ADDR}/api/work")
        } else {
            format!("http://{APP_ADDR}/api/missing")
        };

        let _ = client.get(&url).send().await;

        tokio::time::sleep(Duration::from_millis(rng.gen_range(150..650))).await;
    }
}
