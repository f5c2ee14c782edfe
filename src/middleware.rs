use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::batcher::Batcher;

/// Interceptor bridging the host router to the batcher: one record per
/// completed request, carrying the final status and the wall-clock time
/// from arrival to response.
///
/// Install with `axum::middleware::from_fn_with_state`:
///
/// ```rust,no_run
/// # use apipulse::Batcher;
/// # fn wire(batcher: Batcher) {
/// let app: axum::Router = axum::Router::new()
///     // ...routes...
///     .layer(axum::middleware::from_fn_with_state(
///         batcher.clone(),
///         apipulse::track_requests,
///     ));
/// # }
/// ```
///
/// The response passes through untouched: no header is added and no status
/// is rewritten, and a growing queue can never stall a request. Connections
/// that drop before the handler finishes produce no record.
pub async fn track_requests(
    State(batcher): State<Batcher>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();

    // Prefer the matched route template ("/api/users/:id") so one route maps
    // to one label; raw path for anything the router did not match.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    // Status is read only now, after the handler chain finished, so
    // rewrites by inner layers are captured.
    batcher.record(
        method.as_str(),
        &route,
        response.status().as_u16(),
        elapsed_ms,
    );

    response
}
