//! Request-telemetry batching for axum services.
//!
//! A [`track_requests`] middleware measures every request and hands one
//! [`MetricRecord`] per completed response to a [`Batcher`]. The batcher
//! queues records in memory and ships them to a remote collector in
//! periodic batches. Delivery is fire-and-forget: a failed batch is logged
//! and requeued ahead of newer records for the next cycle, and nothing
//! ever propagates back into the request path.
//!
//! ```rust,no_run
//! use apipulse::{Batcher, BatcherConfig};
//!
//! # async fn wire() -> Result<(), apipulse::ConfigError> {
//! let batcher = Batcher::start(BatcherConfig::new(
//!     "https://collector.example.com/api/v1/telemetry/logs",
//!     "tenant-token",
//!     "account-1",
//! ))?;
//!
//! let app: axum::Router = axum::Router::new()
//!     // ...routes...
//!     .layer(axum::middleware::from_fn_with_state(
//!         batcher.clone(),
//!         apipulse::track_requests,
//!     ));
//! # Ok(()) }
//! ```

pub mod batcher;
pub mod config;
pub mod middleware;
pub mod record;

pub use batcher::{Batcher, FlushOutcome};
pub use config::{BatcherConfig, ConfigError, DEFAULT_FLUSH_INTERVAL_MS};
pub use middleware::track_requests;
pub use record::{LogBatch, MetricRecord};
