use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::Metrics;
use crate::middleware::ip::client_ip;

/// Logs every request (method, URI, protocol, client address) and counts it.
pub async fn log_request(State(metrics): State<Metrics>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req);
    let method = req.method().clone();
    let uri = req.uri().clone();
    let proto = req.version();

    tracing::info!(%ip, ?proto, %method, %uri, "received request");
    metrics.inc_requests();

    let started = Instant::now();
    let res = next.run(req).await;
    tracing::debug!(
        %method,
        %uri,
        status = res.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "request finished"
    );
    res
}
